use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {url}")]
    #[diagnostic(
        code(bundlesync_dl::invalid_url),
        help("Use an absolute http(s):// or file:// URL")
    )]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported URL scheme `{scheme}`: {url}")]
    #[diagnostic(
        code(bundlesync_dl::unsupported_scheme),
        help("Only http, https and file URLs can be fetched")
    )]
    UnsupportedScheme { scheme: String, url: String },

    #[error(transparent)]
    #[diagnostic(
        code(bundlesync_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(bundlesync_dl::http_error))]
    HttpError { status: u16, url: String },

    #[error("Transfer from {url} was interrupted")]
    #[diagnostic(
        code(bundlesync_dl::interrupted),
        help("The connection dropped mid-transfer; try again later")
    )]
    Interrupted {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read {url}")]
    #[diagnostic(code(bundlesync_dl::source_unavailable))]
    SourceUnavailable {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}", path.display())]
    #[diagnostic(
        code(bundlesync_dl::write),
        help("Check free disk space and permissions of the cache directory")
    )]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid response from server: {0}")]
    #[diagnostic(code(bundlesync_dl::invalid_response))]
    InvalidResponse(String),
}

impl DownloadError {
    /// Returns true when the failure happened on the remote side of the
    /// transfer, before or while receiving bytes.
    pub fn is_network(&self) -> bool {
        !matches!(
            self,
            DownloadError::Write { .. }
                | DownloadError::InvalidUrl { .. }
                | DownloadError::UnsupportedScheme { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl From<ureq::Error> for DownloadError {
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}
