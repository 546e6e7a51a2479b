use bundlesync_utils::error::{FileSystemError, PathError, UtilsError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(bundlesync_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(bundlesync_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(bundlesync_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists,

    #[error("No manifest URL configured")]
    #[diagnostic(
        code(bundlesync_config::missing_manifest_url),
        help("Set `manifest_url` in config.toml, export BUNDLESYNC_MANIFEST_URL or pass --manifest")
    )]
    MissingManifestUrl,

    #[error("Invalid manifest URL `{url}`: {reason}")]
    #[diagnostic(
        code(bundlesync_config::invalid_manifest_url),
        help("Use an absolute http://, https:// or file:// URL")
    )]
    InvalidManifestUrl { url: String, reason: String },

    #[error("Invalid slot name `{0}`")]
    #[diagnostic(
        code(bundlesync_config::invalid_slot),
        help("Slot names may contain letters, digits, `-`, `_` and `.`")
    )]
    InvalidSlot(String),

    #[error("Invalid duration `{value}` for `{field}`")]
    #[diagnostic(
        code(bundlesync_config::invalid_duration),
        help("Durations look like `30s`, `5m` or `1h30m`")
    )]
    InvalidDuration { field: &'static str, value: String },

    #[error("IO error: {0}")]
    #[diagnostic(code(bundlesync_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(bundlesync_config::utils))]
    Utils(#[from] UtilsError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(bundlesync_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(bundlesync_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<FileSystemError> for ConfigError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ConfigError::InvalidSlot("a/b".into()).to_string(),
            "Invalid slot name `a/b`"
        );
        assert_eq!(
            ConfigError::InvalidDuration {
                field: "watch_interval",
                value: "soon".into()
            }
            .to_string(),
            "Invalid duration `soon` for `watch_interval`"
        );
    }

    #[test]
    fn test_from_path_error() {
        let err = ConfigError::from(PathError::Empty);
        assert!(matches!(err, ConfigError::Utils(UtilsError::Path(_))));
        assert_eq!(err.to_string(), "Path is empty");
    }
}
