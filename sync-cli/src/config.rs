//! Configuration management for soko-sync.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use sync_client::ClientConfig;

/// Config file looked up in the data directory when `--config` is absent.
pub const CONFIG_FILE: &str = "soko-sync.toml";

/// Load the client configuration.
///
/// An explicit path must exist. Otherwise `CONFIG_FILE` in `data_dir` is used
/// if present, else defaults. A relative database path is resolved against
/// `data_dir`.
pub fn load(data_dir: &Path, explicit: Option<&Path>) -> Result<ClientConfig> {
    let mut config = match explicit {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => {
            let path = data_dir.join(CONFIG_FILE);
            if path.exists() {
                ClientConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?
            } else {
                ClientConfig::default()
            }
        }
    };

    config.storage.database = resolve_database(data_dir, &config.storage.database);
    Ok(config)
}

fn resolve_database(data_dir: &Path, database: &Path) -> PathBuf {
    if database.is_absolute() {
        database.to_path_buf()
    } else {
        data_dir.join(database)
    }
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
