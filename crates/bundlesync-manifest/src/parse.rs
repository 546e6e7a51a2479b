use chrono::{DateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{ManifestError, Result},
    manifest::{Manifest, ManifestOrigin, DEFAULT_PACKAGE_NAME, DEFAULT_RESOURCE_NAME},
};

/// Number of characters of the raw payload kept for diagnostics.
pub const PREVIEW_CHARS: usize = 200;

const INVISIBLE_CHARS: [char; 4] = ['\u{FEFF}', '\u{200B}', '\u{200C}', '\u{200D}'];
const LEGACY_TOKENS: [&str; 2] = ["manifestfileversion", "assetbundlemanifest"];
const LEGACY_SUFFIX: &str = ".manifest";

/// The JSON descriptor as it appears on the wire.
#[derive(Debug, Default, Deserialize)]
struct Descriptor {
    #[serde(default, deserialize_with = "lenient_string")]
    version: Option<String>,
    #[serde(rename = "prefabName", default, deserialize_with = "lenient_string")]
    prefab_name: Option<String>,
    #[serde(rename = "bundleUrl", default, deserialize_with = "lenient_string")]
    bundle_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    md5: Option<String>,
}

/// Accepts strings, numbers and booleans; `null` reads as absent.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected a string, found {other}"))),
    }
}

/// Removes byte-order marks and zero-width characters, then trims whitespace.
///
/// # Examples
///
/// ```
/// use bundlesync_manifest::sanitize;
///
/// assert_eq!(sanitize("\u{FEFF}  {\"a\":1}\u{200B}\n"), "{\"a\":1}");
/// ```
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !INVISIBLE_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// The first [`PREVIEW_CHARS`] characters of `raw`.
pub fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}

/// Parses manifest text fetched from `manifest_url`.
///
/// See [`parse_manifest_at`]; legacy manifests are stamped with the current time.
pub fn parse_manifest(raw: &str, manifest_url: &str) -> Result<Manifest> {
    parse_manifest_at(raw, manifest_url, Utc::now())
}

/// Parses manifest text fetched from `manifest_url`, using `now` as the
/// version of manifests that carry none.
///
/// The text is classified in this order:
///
/// 1. Text starting with `{` is a JSON descriptor.
/// 2. Text containing a build-tool manifest token, or any text fetched from
///    a URL ending in `.manifest`, is a legacy manifest.
/// 3. Text starting with `<` is an HTML page.
/// 4. Anything else is unrecognized.
///
/// Both accepted forms are then normalized so that `package_url` is absolute
/// and `resource_name` is non-empty.
pub fn parse_manifest_at(raw: &str, manifest_url: &str, now: DateTime<Utc>) -> Result<Manifest> {
    let text = sanitize(raw);
    let manifest_url = manifest_url.trim();

    let manifest = if text.starts_with('{') {
        let descriptor: Descriptor = serde_json::from_str(&text).map_err(|err| {
            ManifestError::MalformedJson {
                reason: err.to_string(),
                preview: preview(raw),
            }
        })?;

        Manifest {
            version: descriptor.version.unwrap_or_default(),
            resource_name: descriptor.prefab_name.unwrap_or_default().trim().to_string(),
            package_url: descriptor.bundle_url.unwrap_or_default().trim().to_string(),
            digest: descriptor.md5.unwrap_or_default().trim().to_string(),
            origin: ManifestOrigin::Descriptor,
            package_url_inferred: false,
        }
    } else if let Some(manifest) = parse_legacy(&text, manifest_url, now)? {
        manifest
    } else if text.starts_with('<') {
        return Err(ManifestError::LooksLikeHtml {
            preview: preview(raw),
        });
    } else {
        return Err(ManifestError::UnknownFormat {
            preview: preview(raw),
        });
    };

    normalize(manifest, manifest_url)
}

fn parse_legacy(text: &str, manifest_url: &str, now: DateTime<Utc>) -> Result<Option<Manifest>> {
    let lower = text.to_lowercase();
    let has_token = LEGACY_TOKENS.iter().any(|token| lower.contains(token));
    let url_is_legacy = manifest_url
        .to_ascii_lowercase()
        .ends_with(LEGACY_SUFFIX);

    if !has_token && !url_is_legacy {
        return Ok(None);
    }

    let package_url = if url_is_legacy {
        manifest_url[..manifest_url.len() - LEGACY_SUFFIX.len()].to_string()
    } else {
        derive_package_url(manifest_url)?
    };

    warn!(
        "build-tool manifest received; inferred package URL {}",
        package_url
    );

    Ok(Some(Manifest {
        version: now.format("%Y%m%d%H%M%S").to_string(),
        resource_name: DEFAULT_RESOURCE_NAME.to_string(),
        package_url,
        digest: String::new(),
        origin: ManifestOrigin::Legacy,
        package_url_inferred: true,
    }))
}

fn parse_base(manifest_url: &str) -> Result<Url> {
    Url::parse(manifest_url).map_err(|source| {
        ManifestError::InvalidUrl {
            url: manifest_url.to_string(),
            source,
        }
    })
}

fn derive_package_url(manifest_url: &str) -> Result<String> {
    let base = parse_base(manifest_url)?;
    base.join(DEFAULT_PACKAGE_NAME)
        .map(String::from)
        .map_err(|source| {
            ManifestError::InvalidUrl {
                url: manifest_url.to_string(),
                source,
            }
        })
}

fn normalize(mut manifest: Manifest, manifest_url: &str) -> Result<Manifest> {
    if manifest.package_url.is_empty() || manifest.package_url.starts_with('<') {
        manifest.package_url = derive_package_url(manifest_url)?;
        manifest.package_url_inferred = true;
        warn!(
            "manifest names no package URL; inferred {}",
            manifest.package_url
        );
    } else if Url::parse(&manifest.package_url).is_err() {
        let resolved = parse_base(manifest_url)?
            .join(&manifest.package_url)
            .map_err(|source| {
                ManifestError::InvalidUrl {
                    url: manifest_url.to_string(),
                    source,
                }
            })?;
        debug!(
            "resolved relative package URL {} to {}",
            manifest.package_url, resolved
        );
        manifest.package_url = resolved.into();
    }

    if manifest.resource_name.is_empty() {
        manifest.resource_name = DEFAULT_RESOURCE_NAME.to_string();
    }

    debug!(
        "manifest version={} resource={} package={} digest={}",
        manifest.version,
        manifest.resource_name,
        manifest.package_url,
        if manifest.digest.is_empty() {
            "<none>"
        } else {
            manifest.digest.as_str()
        }
    );

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const URL: &str = "https://cdn.example.com/models/manifest.json";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn test_full_descriptor() {
        let raw = r#"{"version":"3","prefabName":"Foo","bundleUrl":"http://h/b","md5":"ABC"}"#;
        let m = parse_manifest(raw, URL).unwrap();

        assert_eq!(m.version, "3");
        assert_eq!(m.resource_name, "Foo");
        assert_eq!(m.package_url, "http://h/b");
        assert_eq!(m.digest, "ABC");
        assert_eq!(m.origin, ManifestOrigin::Descriptor);
        assert!(!m.package_url_inferred);
    }

    #[test]
    fn test_descriptor_with_bom_and_zero_width() {
        let raw = "\u{FEFF}\u{200B}  {\"prefabName\":\"Foo\",\"bundleUrl\":\"http://h/b\"}\u{200D}\r\n";
        let m = parse_manifest(raw, URL).unwrap();
        assert_eq!(m.resource_name, "Foo");
        assert_eq!(m.digest, "");
    }

    #[test]
    fn test_descriptor_defaults() {
        let m = parse_manifest(r#"{"md5":null,"extra":[1,2]}"#, URL).unwrap();

        assert_eq!(m.resource_name, DEFAULT_RESOURCE_NAME);
        assert_eq!(m.package_url, "https://cdn.example.com/models/agent_current");
        assert!(m.package_url_inferred);
        assert_eq!(m.version, "");
        assert!(!m.has_digest());
    }

    #[test]
    fn test_descriptor_numeric_version() {
        let m = parse_manifest(r#"{"version":7,"bundleUrl":"http://h/b"}"#, URL).unwrap();
        assert_eq!(m.version, "7");
    }

    #[test]
    fn test_descriptor_markup_package_url_is_rederived() {
        let raw = r#"{"bundleUrl":"<fill me in>","prefabName":""}"#;
        let m = parse_manifest(raw, URL).unwrap();

        assert_eq!(m.package_url, "https://cdn.example.com/models/agent_current");
        assert!(m.package_url_inferred);
        assert_eq!(m.resource_name, DEFAULT_RESOURCE_NAME);
    }

    #[test]
    fn test_descriptor_relative_package_url() {
        let m = parse_manifest(r#"{"bundleUrl":"bundles/agent_v2"}"#, URL).unwrap();
        assert_eq!(
            m.package_url,
            "https://cdn.example.com/models/bundles/agent_v2"
        );
        assert!(!m.package_url_inferred);
    }

    #[test]
    fn test_relative_package_url_needs_absolute_manifest_url() {
        let err = parse_manifest(r#"{"bundleUrl":"agent_v2"}"#, "manifest.json").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidUrl { .. }));
    }

    #[test]
    fn test_absolute_package_url_ignores_bad_manifest_url() {
        let m = parse_manifest(r#"{"bundleUrl":"http://h/b"}"#, "not a url").unwrap();
        assert_eq!(m.package_url, "http://h/b");
    }

    #[test]
    fn test_malformed_json() {
        let raw = r#"{"version": "3", "#;
        let err = parse_manifest(raw, URL).unwrap_err();
        match err {
            ManifestError::MalformedJson { preview, .. } => assert_eq!(preview, raw),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_field_type_is_malformed() {
        let err = parse_manifest(r#"{"bundleUrl":["a"]}"#, URL).unwrap_err();
        assert!(matches!(err, ManifestError::MalformedJson { .. }));
    }

    #[test]
    fn test_legacy_by_url_suffix() {
        let m = parse_manifest_at("anything", "http://h/x.manifest", fixed_now()).unwrap();

        assert_eq!(m.package_url, "http://h/x");
        assert_eq!(m.resource_name, DEFAULT_RESOURCE_NAME);
        assert_eq!(m.digest, "");
        assert_eq!(m.version, "20240309070501");
        assert_eq!(m.origin, ManifestOrigin::Legacy);
        assert!(m.package_url_inferred);
    }

    #[test]
    fn test_legacy_suffix_is_case_insensitive() {
        let m = parse_manifest("", "http://h/Agent.MANIFEST").unwrap();
        assert_eq!(m.package_url, "http://h/Agent");
    }

    #[test]
    fn test_legacy_by_token() {
        let raw = "ManifestFileVersion: 0\nCRC: 2362540411\nAssetBundleManifest:\n";
        let m = parse_manifest_at(raw, URL, fixed_now()).unwrap();

        assert_eq!(m.package_url, "https://cdn.example.com/models/agent_current");
        assert_eq!(m.origin, ManifestOrigin::Legacy);
        assert!(!m.has_digest());
    }

    #[test]
    fn test_legacy_token_with_bad_manifest_url() {
        let err = parse_manifest("ManifestFileVersion: 0", "nowhere").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidUrl { .. }));
    }

    #[test]
    fn test_html_rejected() {
        let err = parse_manifest("<html>404</html>", URL).unwrap_err();
        match err {
            ManifestError::LooksLikeHtml { preview } => assert_eq!(preview, "<html>404</html>"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_format() {
        let err = parse_manifest("version=3", URL).unwrap_err();
        assert!(matches!(err, ManifestError::UnknownFormat { .. }));

        let err = parse_manifest("   \u{FEFF}  ", URL).unwrap_err();
        assert!(matches!(err, ManifestError::UnknownFormat { .. }));
    }

    #[test]
    fn test_preview_is_truncated_to_chars() {
        let raw = format!("<{}", "é".repeat(500));
        let err = parse_manifest(&raw, URL).unwrap_err();
        let preview = err.preview().unwrap();

        assert_eq!(preview.chars().count(), PREVIEW_CHARS);
        assert!(preview.starts_with('<'));
    }
}
