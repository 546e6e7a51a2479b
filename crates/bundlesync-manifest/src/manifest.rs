use serde::Serialize;

/// Resource name assumed when the manifest does not name one.
pub const DEFAULT_RESOURCE_NAME: &str = "AIAgentModel";

/// File name, relative to the manifest URL, of the package when the
/// manifest does not say where it lives.
pub const DEFAULT_PACKAGE_NAME: &str = "agent_current";

/// Where a [`Manifest`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestOrigin {
    /// A structured JSON descriptor.
    Descriptor,
    /// Inferred from a build-tool manifest. Carries no digest.
    Legacy,
}

/// The server's description of the current package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// Opaque version label. Never used for staleness decisions.
    pub version: String,
    pub resource_name: String,
    /// Absolute URL of the package.
    pub package_url: String,
    /// Hex digest of the package. Empty when the server requests no verification.
    pub digest: String,
    pub origin: ManifestOrigin,
    /// Set when `package_url` was derived rather than read from the manifest.
    pub package_url_inferred: bool,
}

impl Manifest {
    pub fn has_digest(&self) -> bool {
        !self.digest.is_empty()
    }

    /// True when `other` names the same digest, ignoring ASCII case.
    ///
    /// An empty digest never matches.
    pub fn digest_matches(&self, other: &str) -> bool {
        self.has_digest() && self.digest.eq_ignore_ascii_case(other.trim())
    }
}
