use bundlesync_dl::http::Http;
use tracing::debug;

use crate::{
    error::{ManifestError, Result},
    manifest::Manifest,
    parse::parse_manifest,
};

/// Fetches the manifest at `url` and returns it as text.
///
/// HTTP requests carry a unique cache-busting query parameter and no-cache
/// headers so that the newest manifest is always seen. There is no retry.
///
/// # Errors
///
/// [`ManifestError::Fetch`] on transport failure, timeout or a non-2xx status.
pub fn fetch_manifest_text(url: &str) -> Result<String> {
    debug!("fetching manifest from {}", url);

    Http::fetch_text(url, true).map_err(|source| {
        ManifestError::Fetch {
            url: url.to_string(),
            source,
        }
    })
}

/// Fetches and parses the manifest at `url`.
pub fn fetch_manifest(url: &str) -> Result<Manifest> {
    let raw = fetch_manifest_text(url)?;
    parse_manifest(&raw, url)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;
    use url::Url;

    use super::*;
    use crate::manifest::ManifestOrigin;

    #[test]
    fn test_fetch_manifest_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(
            &path,
            r#"{"version":"5","prefabName":"Bar","bundleUrl":"agent_v5","md5":"00FF"}"#,
        )
        .unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let manifest = fetch_manifest(url.as_str()).unwrap();
        assert_eq!(manifest.resource_name, "Bar");
        assert_eq!(manifest.origin, ManifestOrigin::Descriptor);
        assert_eq!(
            manifest.package_url,
            Url::from_file_path(dir.path().join("agent_v5"))
                .unwrap()
                .to_string()
        );
    }

    #[test]
    fn test_fetch_missing_manifest() {
        let dir = tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("manifest.json")).unwrap();

        let err = fetch_manifest_text(url.as_str()).unwrap_err();
        assert!(matches!(err, ManifestError::Fetch { .. }));
    }
}
