//! Content packages and resource selection for bundlesync.
//!
//! A package is a single file holding an index of named resources. The
//! [`PackageLoader`] keeps at most one package open at a time, and
//! [`select`] picks the resource a consumer should use.
//!
//! # Example
//!
//! ```no_run
//! use bundlesync_package::{select, PackageLoader, Result};
//!
//! fn pick(path: &str) -> Result<String> {
//!     let mut loader = PackageLoader::new();
//!     let package = loader.load(path)?;
//!     let selection = select(package, "AIAgentModel")?;
//!     Ok(selection.resource.name.clone())
//! }
//! ```

pub mod error;
pub mod format;
pub mod loader;
pub mod package;
pub mod selector;

pub use error::{ErrorContext, PackageError, Result};
pub use format::{PackageIndex, ResourceEntry, PACKAGE_FORMAT_VERSION, ZST_MAGIC_BYTES};
pub use loader::PackageLoader;
pub use package::{Package, Resource, ANIMATOR_COMPONENT, SKINNED_SURFACE_COMPONENT};
pub use selector::{rank, score, select, Selection, SelectionMethod};
