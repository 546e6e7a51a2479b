//! On-disk package format.
//!
//! A package is a JSON index, optionally compressed with zstd. The index
//! carries a format version, an optional target platform and the list of
//! resources.

use std::path::Path;

use bundlesync_utils::system::{is_current_platform, platform};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PackageError, Result};

pub const ZST_MAGIC_BYTES: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// The only index format this client understands.
pub const PACKAGE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageIndex {
    pub format: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResourceEntry>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl ResourceEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            components: Vec::new(),
            children: Vec::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components.extend(components.into_iter().map(Into::into));
        self
    }

    pub fn with_child(mut self, child: ResourceEntry) -> Self {
        self.children.push(child);
        self
    }
}

impl PackageIndex {
    pub fn new(resources: Vec<ResourceEntry>) -> Self {
        Self {
            format: PACKAGE_FORMAT_VERSION,
            platform: None,
            resources,
        }
    }

    /// Serializes the index, compressing it when `compress` is set.
    pub fn encode(&self, compress: bool) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self).map_err(|err| {
            PackageError::IoError {
                action: "serializing package index".to_string(),
                source: std::io::Error::other(err),
            }
        })?;

        if !compress {
            return Ok(json);
        }

        zstd::encode_all(json.as_slice(), 0).map_err(|source| {
            PackageError::IoError {
                action: "compressing package index".to_string(),
                source,
            }
        })
    }
}

#[derive(Deserialize)]
struct Header {
    format: Option<Value>,
    platform: Option<String>,
}

/// Returns true if `bytes` begin with the zstd frame magic.
pub fn is_compressed(bytes: &[u8]) -> bool {
    bytes.starts_with(&ZST_MAGIC_BYTES)
}

/// Decodes a package read from `path`.
///
/// The header is checked before the resource list so that a newer format
/// is reported as incompatible rather than corrupt.
pub fn decode(bytes: &[u8], path: &Path) -> Result<PackageIndex> {
    let corrupt = |reason: String| {
        PackageError::Corrupt {
            path: path.to_path_buf(),
            reason,
        }
    };

    if bytes.is_empty() {
        return Err(corrupt("file is empty".into()));
    }

    let decompressed;
    let body = if is_compressed(bytes) {
        decompressed =
            zstd::decode_all(bytes).map_err(|err| corrupt(format!("invalid zstd frame: {err}")))?;
        decompressed.as_slice()
    } else {
        bytes
    };

    let header: Header =
        serde_json::from_slice(body).map_err(|err| corrupt(format!("invalid index: {err}")))?;

    let format = header.format.as_ref().and_then(Value::as_u64);
    if format != Some(u64::from(PACKAGE_FORMAT_VERSION)) {
        let found = header
            .format
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".into());
        return Err(PackageError::Incompatible {
            path: path.to_path_buf(),
            reason: format!(
                "unsupported format version {found}, expected {PACKAGE_FORMAT_VERSION}"
            ),
        });
    }

    if let Some(target) = header.platform.as_deref() {
        if !is_current_platform(target) {
            return Err(PackageError::Incompatible {
                path: path.to_path_buf(),
                reason: format!("built for {target}, running on {}", platform()),
            });
        }
    }

    serde_json::from_slice(body).map_err(|err| corrupt(format!("invalid resource list: {err}")))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn path() -> PathBuf {
        PathBuf::from("/cache/agent.bundle")
    }

    fn index() -> PackageIndex {
        PackageIndex::new(vec![
            ResourceEntry::new("Foo"),
            ResourceEntry::new("Bar").with_components(["animator"]),
        ])
    }

    #[test]
    fn test_decode_plain_and_compressed() {
        let plain = index().encode(false).unwrap();
        let packed = index().encode(true).unwrap();

        assert!(!is_compressed(&plain));
        assert!(is_compressed(&packed));
        assert_eq!(decode(&plain, &path()).unwrap(), index());
        assert_eq!(decode(&packed, &path()).unwrap(), index());
    }

    #[test]
    fn test_decode_garbage_is_corrupt() {
        let err = decode(b"\x00\x01not a package", &path()).unwrap_err();
        assert!(matches!(err, PackageError::Corrupt { .. }));

        let err = decode(b"", &path()).unwrap_err();
        assert!(matches!(err, PackageError::Corrupt { .. }));
    }

    #[test]
    fn test_truncated_zstd_is_corrupt() {
        let packed = index().encode(true).unwrap();
        let err = decode(&packed[..packed.len() / 2], &path()).unwrap_err();
        assert!(matches!(err, PackageError::Corrupt { .. }));
    }

    #[test]
    fn test_newer_format_is_incompatible() {
        let body = br#"{"format":2,"assets":{"Foo":{}}}"#;
        let err = decode(body, &path()).unwrap_err();
        assert!(matches!(err, PackageError::Incompatible { .. }));
        assert!(err.to_string().contains("unsupported format version 2"));
    }

    #[test]
    fn test_foreign_platform_is_incompatible() {
        let mut index = index();
        index.platform = Some("riscv64-Plan9".into());
        let bytes = index.encode(false).unwrap();

        let err = decode(&bytes, &path()).unwrap_err();
        assert!(matches!(err, PackageError::Incompatible { .. }));
    }

    #[test]
    fn test_matching_platform_is_accepted() {
        let mut index = index();
        index.platform = Some(platform());
        let bytes = index.encode(false).unwrap();

        assert_eq!(decode(&bytes, &path()).unwrap().platform, Some(platform()));
    }
}
