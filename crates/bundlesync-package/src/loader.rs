use std::path::Path;

use tracing::debug;

use crate::{error::Result, package::Package};

/// Holds the single live package.
///
/// Loading always releases the previous package first, so a failed load
/// leaves nothing loaded.
#[derive(Debug, Default)]
pub struct PackageLoader {
    current: Option<Package>,
}

impl PackageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases the current package and opens the one at `path`.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<&Package> {
        self.release();
        let package = Package::open(path)?;
        Ok(self.current.insert(package))
    }

    /// Drops the current package, if any.
    pub fn release(&mut self) {
        if let Some(package) = self.current.take() {
            debug!("released package {}", package.path().display());
        }
    }

    pub fn current(&self) -> Option<&Package> {
        self.current.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::{
        format::{PackageIndex, ResourceEntry},
        selector::select,
    };

    #[test]
    fn test_load_replaces_previous() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.bundle");
        let second = dir.path().join("second.bundle");
        fs::write(
            &first,
            PackageIndex::new(vec![ResourceEntry::new("Old")])
                .encode(false)
                .unwrap(),
        )
        .unwrap();
        fs::write(
            &second,
            PackageIndex::new(vec![ResourceEntry::new("New")])
                .encode(true)
                .unwrap(),
        )
        .unwrap();

        let mut loader = PackageLoader::new();
        loader.load(&first).unwrap();
        let package = loader.load(&second).unwrap();
        assert_eq!(package.resource_names().collect::<Vec<_>>(), vec!["New"]);
    }

    #[test]
    fn test_failed_load_releases_previous() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.bundle");
        let bad = dir.path().join("bad.bundle");
        fs::write(&good, PackageIndex::new(vec![]).encode(false).unwrap()).unwrap();
        fs::write(&bad, b"garbage").unwrap();

        let mut loader = PackageLoader::new();
        loader.load(&good).unwrap();
        assert!(loader.is_loaded());

        assert!(loader.load(&bad).is_err());
        assert!(loader.current().is_none());
    }

    #[test]
    fn test_selected_resource_outlives_release() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.bundle");
        let second = dir.path().join("second.bundle");
        fs::write(
            &first,
            PackageIndex::new(vec![
                ResourceEntry::new("Foo"),
                ResourceEntry::new("Bar").with_components(["animator"]),
            ])
            .encode(true)
            .unwrap(),
        )
        .unwrap();
        fs::write(
            &second,
            PackageIndex::new(vec![ResourceEntry::new("Other")])
                .encode(false)
                .unwrap(),
        )
        .unwrap();

        let mut loader = PackageLoader::new();
        let held = select(loader.load(&first).unwrap(), "Missing")
            .unwrap()
            .resource;

        loader.load(&second).unwrap();
        assert_eq!(held.name, "Bar");

        loader.release();
        assert!(!loader.is_loaded());
        assert_eq!(held.name, "Bar");
        assert!(held.has_component("animator"));
    }
}
