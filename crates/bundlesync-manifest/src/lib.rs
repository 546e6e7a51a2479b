//! Server-published manifests describing the current content package.
//!
//! A manifest is fetched as text with [`fetch_manifest_text`], then
//! classified and normalized by [`parse_manifest`]. Two wire formats are
//! understood: a JSON descriptor and the legacy build-tool manifest, from
//! which a best-effort descriptor is inferred.

pub mod error;
pub mod fetch;
pub mod manifest;
pub mod parse;

pub use error::{ManifestError, Result};
pub use fetch::{fetch_manifest, fetch_manifest_text};
pub use manifest::{Manifest, ManifestOrigin, DEFAULT_PACKAGE_NAME, DEFAULT_RESOURCE_NAME};
pub use parse::{parse_manifest, parse_manifest_at, preview, sanitize};
