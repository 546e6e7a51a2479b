use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, PoisonError, RwLock},
    time::Duration,
};

use bundlesync_utils::{
    hash::DigestAlgorithm,
    path::{resolve_path, xdg_cache_home, xdg_config_home},
    time::parse_duration,
};
use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::info;
use url::Url;

use crate::{
    annotations::annotate_toml_table,
    error::{ConfigError, Result},
};

pub const DEFAULT_SLOT: &str = "agent";
pub const DEFAULT_REQUEST_TIMEOUT: &str = "30s";
pub const DEFAULT_WATCH_INTERVAL: &str = "5m";
const DEFAULT_MANIFEST_URL: &str = "http://localhost/models/manifest.json";

/// Application's configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// URL of the manifest describing the current package.
    /// Accepts http://, https:// and file:// URLs.
    /// Env: BUNDLESYNC_MANIFEST_URL
    pub manifest_url: Option<String>,

    /// Name of the resource to select from the package.
    /// Overrides the name published in the manifest when set.
    pub resource_name: Option<String>,

    /// Directory holding cached payloads and their records.
    /// Default: $XDG_CACHE_HOME/bundlesync
    /// Env: BUNDLESYNC_CACHE
    pub cache_path: Option<String>,

    /// Name of the cache slot. The payload is stored as `<slot>.bundle`.
    /// Default: "agent"
    pub slot: Option<String>,

    /// Digest algorithm the manifest digest is computed with: "md5" or "blake3".
    /// Default: "md5"
    pub checksum: Option<DigestAlgorithm>,

    /// Re-hash the cached payload before trusting it on a cache hit.
    /// Default: false
    pub verify_on_load: Option<bool>,

    /// Timeout applied to each HTTP request.
    /// Default: "30s"
    pub request_timeout: Option<String>,

    /// Interval between syncs in watch mode.
    /// Default: "5m"
    pub watch_interval: Option<String>,

    /// User agent sent with HTTP requests.
    /// Default: "bundlesync/<version>"
    pub user_agent: Option<String>,
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("BUNDLESYNC_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("bundlesync").join("config.toml"),
    })
});

/// Overrides the location the configuration is read from.
pub fn set_config_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let resolved = resolve_path(&path.as_ref().to_string_lossy())?;
    let mut config_path = CONFIG_PATH.write().unwrap_or_else(PoisonError::into_inner);
    *config_path = resolved;
    Ok(())
}

pub fn config_path() -> PathBuf {
    CONFIG_PATH
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .to_path_buf()
}

/// Loads the configuration file into the global slot.
pub fn init() -> Result<()> {
    let config = Config::new()?;
    let mut global_config = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    *global_config = Some(config);
    Ok(())
}

/// Returns the global configuration, falling back to defaults when
/// [`init`] has not been called.
pub fn get_config() -> Config {
    CONFIG
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_insert_with(Config::default_config)
        .clone()
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            manifest_url: Some(DEFAULT_MANIFEST_URL.to_string()),
            resource_name: None,
            cache_path: Some(format!("{}/bundlesync", xdg_cache_home().display())),
            slot: Some(DEFAULT_SLOT.to_string()),
            checksum: Some(DigestAlgorithm::default()),
            verify_on_load: Some(false),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT.to_string()),
            watch_interval: Some(DEFAULT_WATCH_INTERVAL.to_string()),
            user_agent: None,
        }
    }

    /// Loads the configuration file. A missing file yields the defaults.
    pub fn new() -> Result<Self> {
        let path = config_path();

        let mut config = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default_config(),
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;

        Ok(config)
    }

    /// Validates the configuration and fills in defaults for unset fields.
    pub fn resolve(&mut self) -> Result<()> {
        let slot = self.slot.get_or_insert_with(|| DEFAULT_SLOT.to_string());
        validate_slot(slot)?;

        if let Some(url) = &self.manifest_url {
            validate_manifest_url(url)?;
        }

        if self
            .resource_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            self.resource_name = None;
        }

        self.checksum.get_or_insert_with(DigestAlgorithm::default);
        self.verify_on_load.get_or_insert(false);

        let timeout = self
            .request_timeout
            .get_or_insert_with(|| DEFAULT_REQUEST_TIMEOUT.to_string());
        check_duration("request_timeout", timeout)?;

        let interval = self
            .watch_interval
            .get_or_insert_with(|| DEFAULT_WATCH_INTERVAL.to_string());
        check_duration("watch_interval", interval)?;

        Ok(())
    }

    /// The manifest URL, with `BUNDLESYNC_MANIFEST_URL` taking precedence.
    pub fn get_manifest_url(&self) -> Result<String> {
        self.manifest_url_or(None)
    }

    /// The manifest URL, preferring `url_override` (from `--manifest`), then
    /// `BUNDLESYNC_MANIFEST_URL`, then the configured value.
    pub fn manifest_url_or(&self, url_override: Option<&str>) -> Result<String> {
        let url = match url_override.filter(|url| !url.trim().is_empty()) {
            Some(url) => url.to_string(),
            None => {
                match std::env::var("BUNDLESYNC_MANIFEST_URL") {
                    Ok(url) if !url.trim().is_empty() => url,
                    _ => self.manifest_url.clone().ok_or(ConfigError::MissingManifestUrl)?,
                }
            }
        };
        validate_manifest_url(&url)?;
        Ok(url.trim().to_string())
    }

    /// The cache directory, with `BUNDLESYNC_CACHE` taking precedence.
    pub fn get_cache_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("BUNDLESYNC_CACHE") {
            return Ok(resolve_path(&env_path)?);
        }
        if let Some(cache_path) = &self.cache_path {
            return Ok(resolve_path(cache_path)?);
        }
        Ok(xdg_cache_home().join("bundlesync"))
    }

    pub fn slot(&self) -> &str {
        self.slot.as_deref().unwrap_or(DEFAULT_SLOT)
    }

    pub fn checksum(&self) -> DigestAlgorithm {
        self.checksum.unwrap_or_default()
    }

    pub fn verify_on_load(&self) -> bool {
        self.verify_on_load.unwrap_or(false)
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        duration_or_default(
            "request_timeout",
            self.request_timeout.as_deref(),
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    pub fn watch_interval(&self) -> Result<Duration> {
        duration_or_default(
            "watch_interval",
            self.watch_interval.as_deref(),
            DEFAULT_WATCH_INTERVAL,
        )
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;

        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;

        Ok(doc)
    }
}

fn validate_slot(slot: &str) -> Result<()> {
    let valid = !slot.is_empty()
        && slot != "."
        && slot != ".."
        && slot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidSlot(slot.to_string()))
    }
}

fn validate_manifest_url(url: &str) -> Result<()> {
    let invalid = |reason: String| {
        ConfigError::InvalidManifestUrl {
            url: url.to_string(),
            reason,
        }
    };

    let parsed = Url::parse(url.trim()).map_err(|err| invalid(err.to_string()))?;
    match parsed.scheme() {
        "http" | "https" | "file" => Ok(()),
        scheme => Err(invalid(format!("unsupported scheme `{scheme}`"))),
    }
}

fn check_duration(field: &'static str, value: &str) -> Result<Duration> {
    match parse_duration(value) {
        Some(duration) if !duration.is_zero() => Ok(duration),
        _ => {
            Err(ConfigError::InvalidDuration {
                field,
                value: value.to_string(),
            })
        }
    }
}

fn duration_or_default(field: &'static str, value: Option<&str>, default: &str) -> Result<Duration> {
    check_duration(field, value.unwrap_or(default))
}

/// Writes the annotated default configuration to the configured path.
///
/// Refuses to overwrite an existing file.
pub fn generate_default_config() -> Result<PathBuf> {
    let config_path = config_path();

    if config_path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    let annotated_doc = Config::default_config().to_annotated_document()?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, annotated_doc.to_string())?;
    info!(
        "Default configuration file generated with documentation at: {}",
        config_path.display()
    );
    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;
    use crate::test_utils::{with_env, without_env};

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.slot(), "agent");
        assert_eq!(config.checksum(), DigestAlgorithm::Md5);
        assert!(!config.verify_on_load());
        assert_eq!(config.request_timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(config.watch_interval().unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let mut config = Config::default();
        config.resolve().unwrap();

        assert_eq!(config.slot.as_deref(), Some("agent"));
        assert_eq!(config.checksum, Some(DigestAlgorithm::Md5));
        assert_eq!(config.verify_on_load, Some(false));
        assert_eq!(config.request_timeout.as_deref(), Some("30s"));
        assert_eq!(config.watch_interval.as_deref(), Some("5m"));
    }

    #[test]
    fn test_resolve_rejects_bad_slot() {
        for slot in ["", "..", "a/b", "agent bundle"] {
            let mut config = Config::default_config();
            config.slot = Some(slot.to_string());
            assert!(
                matches!(config.resolve(), Err(ConfigError::InvalidSlot(_))),
                "slot {slot:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_rejects_bad_manifest_url() {
        let mut config = Config::default_config();
        config.manifest_url = Some("models/manifest.json".into());
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidManifestUrl { .. })
        ));

        config.manifest_url = Some("ftp://host/manifest.json".into());
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidManifestUrl { .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_bad_durations() {
        let mut config = Config::default_config();
        config.watch_interval = Some("soon".into());
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidDuration {
                field: "watch_interval",
                ..
            })
        ));

        let mut config = Config::default_config();
        config.request_timeout = Some("0s".into());
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_resolve_clears_blank_resource_name() {
        let mut config = Config::default_config();
        config.resource_name = Some("  ".into());
        config.resolve().unwrap();
        assert!(config.resource_name.is_none());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let mut config: Config = toml::from_str(
            r#"
            manifest_url = "https://cdn.example.com/models/manifest.json"
            checksum = "blake3"
            "#,
        )
        .unwrap();
        config.resolve().unwrap();

        assert_eq!(config.checksum(), DigestAlgorithm::Blake3);
        assert_eq!(config.slot(), "agent");
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = Config::default_config();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.manifest_url, config.manifest_url);
    }

    #[test]
    #[serial]
    fn test_manifest_url_env_override() {
        let config = Config::default_config();
        with_env(
            vec![("BUNDLESYNC_MANIFEST_URL", "file:///srv/models/manifest.json")],
            || {
                assert_eq!(
                    config.get_manifest_url().unwrap(),
                    "file:///srv/models/manifest.json"
                );
            },
        );
    }

    #[test]
    #[serial]
    fn test_missing_manifest_url() {
        without_env(&["BUNDLESYNC_MANIFEST_URL"], || {
            let config = Config::default();
            assert!(matches!(
                config.get_manifest_url(),
                Err(ConfigError::MissingManifestUrl)
            ));
        });
    }

    #[test]
    #[serial]
    fn test_manifest_url_override_wins() {
        with_env(
            vec![("BUNDLESYNC_MANIFEST_URL", "file:///srv/models/manifest.json")],
            || {
                let config = Config::default();
                assert_eq!(
                    config
                        .manifest_url_or(Some("https://cdn.example.com/manifest.json"))
                        .unwrap(),
                    "https://cdn.example.com/manifest.json"
                );
                assert_eq!(
                    config.manifest_url_or(Some("  ")).unwrap(),
                    "file:///srv/models/manifest.json"
                );
            },
        );
    }

    #[test]
    #[serial]
    fn test_manifest_url_override_is_validated() {
        without_env(&["BUNDLESYNC_MANIFEST_URL"], || {
            let config = Config::default_config();
            assert!(matches!(
                config.manifest_url_or(Some("models/manifest.json")),
                Err(ConfigError::InvalidManifestUrl { .. })
            ));
            assert!(matches!(
                config.manifest_url_or(Some("ftp://host/manifest.json")),
                Err(ConfigError::InvalidManifestUrl { .. })
            ));
        });
    }

    #[test]
    #[serial]
    fn test_cache_path_env_override() {
        with_env(vec![("BUNDLESYNC_CACHE", "/custom/cache")], || {
            let config = Config::default_config();
            assert_eq!(
                config.get_cache_path().unwrap(),
                PathBuf::from("/custom/cache")
            );
        });
    }

    #[test]
    #[serial]
    fn test_load_and_generate_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundlesync/config.toml");
        let previous = config_path();
        set_config_path(&path).unwrap();

        // Missing file means defaults.
        let config = Config::new().unwrap();
        assert_eq!(config.slot(), DEFAULT_SLOT);

        let written = generate_default_config().unwrap();
        assert_eq!(written, path);
        assert!(matches!(
            generate_default_config(),
            Err(ConfigError::ConfigAlreadyExists)
        ));

        fs::write(&path, "slot = \"scenery\"\nverify_on_load = true\n").unwrap();
        init().unwrap();
        let config = get_config();
        assert_eq!(config.slot(), "scenery");
        assert!(config.verify_on_load());

        fs::write(&path, "slot = [").unwrap();
        assert!(matches!(Config::new(), Err(ConfigError::TomlDeError(_))));

        set_config_path(previous).unwrap();
    }
}
