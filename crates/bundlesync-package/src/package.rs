use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    error::{ErrorContext, Result},
    format::{decode, ResourceEntry},
};

/// Component that animates a rig.
pub const ANIMATOR_COMPONENT: &str = "animator";

/// Component that renders a deformable surface.
pub const SKINNED_SURFACE_COMPONENT: &str = "skinned_mesh_renderer";

/// A named resource inside a package, together with its sub-hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub kind: Option<String>,
    pub components: Vec<String>,
    pub children: Vec<Resource>,
    pub attributes: Map<String, Value>,
}

impl Resource {
    /// Returns true if this resource or any descendant carries `component`.
    pub fn has_component(&self, component: &str) -> bool {
        self.components
            .iter()
            .any(|c| c.eq_ignore_ascii_case(component))
            || self.children.iter().any(|c| c.has_component(component))
    }

    /// The last path segment of the name without its extension.
    ///
    /// `assets/agents/Bar.prefab` yields `Bar`.
    pub fn stem(&self) -> &str {
        let file = self.name.rsplit('/').next().unwrap_or(&self.name);
        match file.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => file,
        }
    }

    /// Number of resources in this hierarchy, including itself.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Resource::node_count).sum::<usize>()
    }
}

impl From<ResourceEntry> for Resource {
    fn from(entry: ResourceEntry) -> Self {
        Self {
            name: entry.name,
            kind: entry.kind,
            components: entry.components,
            children: entry.children.into_iter().map(Resource::from).collect(),
            attributes: entry.attributes,
        }
    }
}

/// An opened package.
#[derive(Debug)]
pub struct Package {
    path: PathBuf,
    platform: Option<String>,
    resources: Vec<Arc<Resource>>,
}

impl Package {
    /// Reads and decodes the package at `path`.
    ///
    /// # Errors
    ///
    /// [`PackageError::IoError`](crate::PackageError::IoError) if the file
    /// cannot be read, otherwise the decode errors of [`decode`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let index = decode(&bytes, path)?;

        debug!(
            "opened package {} with {} resources",
            path.display(),
            index.resources.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            platform: index.platform,
            resources: index
                .resources
                .into_iter()
                .map(|entry| Arc::new(Resource::from(entry)))
                .collect(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// Top-level resources in index order.
    pub fn resources(&self) -> &[Arc<Resource>] {
        &self.resources
    }

    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.name.as_str())
    }

    /// Looks up a top-level resource by its exact name.
    pub fn get(&self, name: &str) -> Option<Arc<Resource>> {
        self.resources.iter().find(|r| r.name == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
