//! HTTP gateway backed by reqwest.
//!
//! Routes:
//! - `POST  /listings`
//! - `PATCH /listings/{listing_id}`
//! - `POST  /conversations/{conversation_id}/messages`
//! - `PATCH /profiles/{user_id}`
//! - `POST  /payments`
//!
//! Path ids are percent-encoded as single segments. The action id travels
//! in the `Idempotency-Key` header.

use super::{GatewayError, GatewayReceipt, RemoteGateway};
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use sync_core::AuthorizationOutcome;
use sync_types::{
    ActionId, ListingDraft, ListingPatch, OutgoingMessage, PaymentSubmission, ProfilePatch,
};
use tracing::debug;

/// Header carrying the action id.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Gateway speaking JSON over HTTP to the marketplace backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    /// Create a gateway for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Unreachable(format!("invalid base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Unreachable(format!(
                "base URL {} cannot carry a path",
                base_url
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    /// Append `segments` to the base path, encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::Unreachable(format!("base URL {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<B, R>(
        &self,
        method: Method,
        segments: &[&str],
        key: &ActionId,
        body: &B,
    ) -> Result<R, GatewayError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, key = %key, "gateway request");

        let response = self
            .client
            .request(method, url)
            .header(IDEMPOTENCY_HEADER, key.to_string())
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: text,
            });
        }

        let text = if text.trim().is_empty() { "{}" } else { &text };
        serde_json::from_str(text).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else if err.is_decode() {
        GatewayError::InvalidResponse(err.to_string())
    } else {
        GatewayError::Unreachable(err.to_string())
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn create_listing(
        &self,
        key: &ActionId,
        draft: &ListingDraft,
    ) -> Result<GatewayReceipt, GatewayError> {
        self.send(Method::POST, &["listings"], key, draft).await
    }

    async fn update_listing(
        &self,
        key: &ActionId,
        patch: &ListingPatch,
    ) -> Result<GatewayReceipt, GatewayError> {
        let segments = ["listings", patch.listing_id.as_str()];
        self.send(Method::PATCH, &segments, key, patch).await
    }

    async fn send_message(
        &self,
        key: &ActionId,
        message: &OutgoingMessage,
    ) -> Result<GatewayReceipt, GatewayError> {
        let segments = ["conversations", message.conversation_id.as_str(), "messages"];
        self.send(Method::POST, &segments, key, message).await
    }

    async fn update_profile(
        &self,
        key: &ActionId,
        patch: &ProfilePatch,
    ) -> Result<GatewayReceipt, GatewayError> {
        let segments = ["profiles", patch.user_id.as_str()];
        self.send(Method::PATCH, &segments, key, patch).await
    }

    async fn submit_payment(
        &self,
        key: &ActionId,
        submission: &PaymentSubmission,
    ) -> Result<AuthorizationOutcome, GatewayError> {
        self.send(Method::POST, &["payments"], key, submission).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            // Read headers and the small JSON body.
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if n == 0 || request_complete(&text) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{}", addr), handle)
    }

    fn request_complete(text: &str) -> bool {
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        body.len() >= length
    }

    fn submission() -> PaymentSubmission {
        PaymentSubmission {
            transaction_id: sync_types::TransactionId::new(),
            user_id: "buyer-1".into(),
            provider: "mpesa".into(),
            amount: 5_000,
            fee: 75,
            total: 5_075,
            currency: "KES".into(),
            phone: "+254712345678".into(),
            escrow_enabled: true,
        }
    }

    #[test]
    fn endpoint_joins_paths() {
        let gateway = HttpGateway::new("http://api.soko.test/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            gateway.endpoint(&["listings"]).unwrap().as_str(),
            "http://api.soko.test/v1/listings"
        );

        let bare = HttpGateway::new("http://api.soko.test", Duration::from_secs(5)).unwrap();
        assert_eq!(
            bare.endpoint(&["payments"]).unwrap().as_str(),
            "http://api.soko.test/payments"
        );
    }

    #[test]
    fn endpoint_encodes_each_segment() {
        let gateway = HttpGateway::new("http://api.soko.test/v1", Duration::from_secs(5)).unwrap();
        let url = gateway
            .endpoint(&["conversations", "c 1/x?y#z", "messages"])
            .unwrap();
        assert_eq!(url.path(), "/v1/conversations/c%201%2Fx%3Fy%23z/messages");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn unusable_base_url_is_refused() {
        assert!(HttpGateway::new("not a url", Duration::from_secs(5)).is_err());
        assert!(HttpGateway::new("mailto:ops@soko.test", Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn listing_id_stays_in_one_segment() {
        let (url, server) = serve_once("200 OK", r#"{"remote_id":"L-9"}"#).await;
        let gateway = HttpGateway::new(&url, Duration::from_secs(5)).unwrap();
        let patch = ListingPatch {
            listing_id: "../payments?x=1".into(),
            quantity: Some(40),
            price_per_unit: None,
            status: None,
            description: None,
        };

        gateway.update_listing(&ActionId::new(), &patch).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("PATCH /listings/..%2Fpayments%3Fx=1 "));
    }

    #[tokio::test]
    async fn payment_sends_idempotency_key() {
        let (url, server) = serve_once("200 OK", r#"{"status":"approved","reference":"MP-1"}"#).await;
        let gateway = HttpGateway::new(&url, Duration::from_secs(5)).unwrap();
        let key = ActionId::new();

        let outcome = gateway.submit_payment(&key, &submission()).await.unwrap();
        assert_eq!(outcome, AuthorizationOutcome::approved(Some("MP-1")));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /payments"));
        assert!(request
            .to_ascii_lowercase()
            .contains(&format!("idempotency-key: {}", key)));
    }

    #[tokio::test]
    async fn declined_payment_is_not_an_error() {
        let (url, _server) =
            serve_once("200 OK", r#"{"status":"declined","reason":"insufficient funds"}"#).await;
        let gateway = HttpGateway::new(&url, Duration::from_secs(5)).unwrap();

        let outcome = gateway
            .submit_payment(&ActionId::new(), &submission())
            .await
            .unwrap();
        assert_eq!(outcome, AuthorizationOutcome::declined("insufficient funds"));
    }

    #[tokio::test]
    async fn error_status_is_rejected() {
        let (url, _server) = serve_once("503 Service Unavailable", "maintenance").await;
        let gateway = HttpGateway::new(&url, Duration::from_secs(5)).unwrap();
        let message = OutgoingMessage {
            conversation_id: "c-1".into(),
            sender_id: "a".into(),
            recipient_id: "b".into(),
            body: "hi".into(),
        };

        let result = gateway.send_message(&ActionId::new(), &message).await;
        assert_eq!(
            result,
            Err(GatewayError::Rejected {
                status: 503,
                message: "maintenance".into()
            })
        );
    }

    #[tokio::test]
    async fn empty_body_is_a_bare_receipt() {
        let (url, _server) = serve_once("200 OK", "").await;
        let gateway = HttpGateway::new(&url, Duration::from_secs(5)).unwrap();
        let patch = ProfilePatch {
            user_id: "farmer-1".into(),
            display_name: None,
            phone: None,
            location: Some("Eldoret".into()),
            language: None,
        };

        let receipt = gateway.update_profile(&ActionId::new(), &patch).await.unwrap();
        assert_eq!(receipt, GatewayReceipt::default());
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gateway =
            HttpGateway::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        let result = gateway.submit_payment(&ActionId::new(), &submission()).await;
        assert!(matches!(result, Err(GatewayError::Unreachable(_))));
    }
}
