//! Error types for the package crate.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur while opening a package or selecting from it.
#[derive(Error, Diagnostic, Debug)]
pub enum PackageError {
    #[error("Error while {action}")]
    #[diagnostic(code(bundlesync_package::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("Package {} is corrupt: {reason}", path.display())]
    #[diagnostic(
        code(bundlesync_package::corrupt),
        help("Remove the cached payload with `bundlesync clean` and sync again")
    )]
    Corrupt { path: PathBuf, reason: String },

    #[error("Package {} is incompatible: {reason}", path.display())]
    #[diagnostic(
        code(bundlesync_package::incompatible),
        help("The server published a package built for another platform or format version")
    )]
    Incompatible { path: PathBuf, reason: String },

    #[error("No resource matching `{requested}` in package")]
    #[diagnostic(
        code(bundlesync_package::not_found),
        help("The package contains no resources")
    )]
    NotFound { requested: String },
}

impl PackageError {
    /// True for every failure to open a package, as opposed to failures to
    /// find a resource inside an open one.
    pub fn is_corrupt_or_incompatible(&self) -> bool {
        !matches!(self, PackageError::NotFound { .. })
    }
}

/// A specialized Result type for package operations.
pub type Result<T> = std::result::Result<T, PackageError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Adds context to an error, describing what action was being performed.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            PackageError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
