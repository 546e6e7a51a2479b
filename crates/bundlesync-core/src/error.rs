//! Error types for bundlesync-core.

use std::{fmt, path::PathBuf};

use bundlesync_config::error::ConfigError;
use bundlesync_dl::error::DownloadError;
use bundlesync_manifest::ManifestError;
use bundlesync_package::PackageError;
use bundlesync_utils::error::{FileSystemError, HashError, LockError};
use miette::Diagnostic;
use thiserror::Error;

/// Coarse classification of a failed sync, stable across error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    NetworkFailure,
    MalformedJson,
    LooksLikeHtml,
    UnknownFormat,
    ChecksumMismatch,
    FileWriteFailure,
    CorruptOrIncompatible,
    NotFound,
    Configuration,
    Busy,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NetworkFailure => "network_failure",
            FailureKind::MalformedJson => "malformed_json",
            FailureKind::LooksLikeHtml => "looks_like_html",
            FailureKind::UnknownFormat => "unknown_format",
            FailureKind::ChecksumMismatch => "checksum_mismatch",
            FailureKind::FileWriteFailure => "file_write_failure",
            FailureKind::CorruptOrIncompatible => "corrupt_or_incompatible",
            FailureKind::NotFound => "not_found",
            FailureKind::Configuration => "configuration",
            FailureKind::Busy => "busy",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors ending a sync pass.
#[derive(Error, Diagnostic, Debug)]
pub enum SyncError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Failed to download {url}")]
    #[diagnostic(
        code(bundlesync::download),
        help("Check that the package URL named by the manifest is reachable")
    )]
    Download {
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(bundlesync::checksum),
        help("The download may be truncated or the manifest stale. The cached payload was kept.")
    )]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Error while {action}")]
    #[diagnostic(code(bundlesync::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(bundlesync::fs), help("Check file permissions and disk space"))]
    FileSystem(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(code(bundlesync::hash))]
    Hash(#[from] HashError),

    #[error(transparent)]
    #[diagnostic(code(bundlesync::lock))]
    Lock(#[from] LockError),

    #[error("Failed to encode cache record {}", path.display())]
    #[diagnostic(code(bundlesync::record))]
    Record {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Package(#[from] PackageError),

    #[error("Slot `{slot}` is already being synchronized")]
    #[diagnostic(
        code(bundlesync::busy),
        help("Another sync holds the slot lock. Wait for it to finish.")
    )]
    Busy { slot: String },

    #[error("{0}")]
    #[diagnostic(code(bundlesync::error))]
    Custom(String),
}

impl SyncError {
    /// Maps this error onto the failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::Config(_) | SyncError::Custom(_) => FailureKind::Configuration,
            SyncError::Manifest(err) => {
                match err {
                    ManifestError::Fetch { .. } => FailureKind::NetworkFailure,
                    ManifestError::MalformedJson { .. } => FailureKind::MalformedJson,
                    ManifestError::LooksLikeHtml { .. } => FailureKind::LooksLikeHtml,
                    ManifestError::UnknownFormat { .. } => FailureKind::UnknownFormat,
                    ManifestError::InvalidUrl { .. } => FailureKind::Configuration,
                }
            }
            SyncError::Download { source, .. } if source.is_network() => {
                FailureKind::NetworkFailure
            }
            SyncError::Download { source, .. } => {
                match source {
                    DownloadError::InvalidUrl { .. } | DownloadError::UnsupportedScheme { .. } => {
                        FailureKind::Configuration
                    }
                    _ => FailureKind::FileWriteFailure,
                }
            }
            SyncError::ChecksumMismatch { .. } => FailureKind::ChecksumMismatch,
            SyncError::IoError { .. }
            | SyncError::FileSystem(_)
            | SyncError::Hash(_)
            | SyncError::Lock(_)
            | SyncError::Record { .. } => FailureKind::FileWriteFailure,
            SyncError::Package(err) if err.is_corrupt_or_incompatible() => {
                FailureKind::CorruptOrIncompatible
            }
            SyncError::Package(_) => FailureKind::NotFound,
            SyncError::Busy { .. } => FailureKind::Busy,
        }
    }
}

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, SyncError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, SyncError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            SyncError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
