use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

pub const DOWNLOAD_DIR_ENV: &str = "WEBSHELL_DOWNLOAD_DIR";

/// What happens when a second request arrives while a slot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPolicy {
    /// The newer request replaces the one waiting.
    #[default]
    ReplaceLast,
    /// The waiting request is kept and the newer one dropped.
    KeepFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub downloads_root: Option<PathBuf>,
    pub download_subdir: String,
    pub bridge_object: String,
    pub bridge_timeout_secs: u64,
    pub pending_policy: PendingPolicy,
    pub notification_channel: String,
    pub assume_storage_permission: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            downloads_root: None,
            download_subdir: "DBGID-XLXS".to_string(),
            bridge_object: "AndroidBlobDownloader".to_string(),
            bridge_timeout_secs: 60,
            pending_policy: PendingPolicy::ReplaceLast,
            notification_channel: "download_channel".to_string(),
            assume_storage_permission: true,
        }
    }
}

impl ShellConfig {
    /// Loads the config file if one is given, then applies the environment override.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };

        if let Some(dir) = std::env::var_os(DOWNLOAD_DIR_ENV).filter(|v| !v.is_empty()) {
            config.downloads_root = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// The public downloads area the application folder lives under.
    pub fn downloads_root(&self) -> PathBuf {
        self.downloads_root
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("downloads"))
    }

    pub fn download_dir(&self) -> PathBuf {
        self.downloads_root().join(&self.download_subdir)
    }

    /// `None` when the deadline is disabled.
    pub fn bridge_timeout(&self) -> Option<Duration> {
        (self.bridge_timeout_secs > 0).then(|| Duration::from_secs(self.bridge_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"downloads_root": "/tmp/shell", "pending_policy": "keep_first"}}"#
        )
        .unwrap();

        let config = ShellConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.pending_policy, PendingPolicy::KeepFirst);
        assert_eq!(config.download_subdir, "DBGID-XLXS");
        assert_eq!(config.bridge_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_download_dir_joins_subdir() {
        let config = ShellConfig {
            downloads_root: Some(PathBuf::from("/data/Download")),
            ..ShellConfig::default()
        };
        assert_eq!(
            config.download_dir(),
            PathBuf::from("/data/Download/DBGID-XLXS")
        );
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = ShellConfig {
            bridge_timeout_secs: 0,
            ..ShellConfig::default()
        };
        assert_eq!(config.bridge_timeout(), None);
    }

    #[test]
    fn test_malformed_config_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = ShellConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
