use bundlesync_dl::error::DownloadError;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while obtaining or interpreting a manifest.
///
/// Variants describing unexpected payloads carry a preview of the raw text
/// as received, truncated to 200 characters.
#[derive(Error, Diagnostic, Debug)]
pub enum ManifestError {
    #[error("Failed to fetch manifest from {url}")]
    #[diagnostic(
        code(bundlesync_manifest::fetch),
        help("Check that the manifest URL is reachable")
    )]
    Fetch {
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error("Manifest is not valid JSON: {reason}")]
    #[diagnostic(
        code(bundlesync_manifest::malformed_json),
        help("Received:\n{}", .preview)
    )]
    MalformedJson { reason: String, preview: String },

    #[error("Manifest URL returned an HTML page")]
    #[diagnostic(
        code(bundlesync_manifest::looks_like_html),
        help("This is usually a 404 or a directory listing. Point the manifest URL at manifest.json.\nReceived:\n{}", .preview)
    )]
    LooksLikeHtml { preview: String },

    #[error("Manifest format not recognized")]
    #[diagnostic(
        code(bundlesync_manifest::unknown_format),
        help("Expected a JSON descriptor or a build-tool manifest.\nReceived:\n{}", .preview)
    )]
    UnknownFormat { preview: String },

    #[error("Invalid manifest URL `{url}`")]
    #[diagnostic(
        code(bundlesync_manifest::invalid_url),
        help("The manifest URL must be absolute to derive the package location")
    )]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl ManifestError {
    /// The preview of the offending payload, if this error carries one.
    pub fn preview(&self) -> Option<&str> {
        match self {
            ManifestError::MalformedJson { preview, .. }
            | ManifestError::LooksLikeHtml { preview }
            | ManifestError::UnknownFormat { preview } => Some(preview),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ManifestError>;
