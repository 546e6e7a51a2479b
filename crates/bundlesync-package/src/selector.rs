use std::{fmt, sync::Arc};

use tracing::debug;

use crate::{
    error::{PackageError, Result},
    package::{Package, Resource, ANIMATOR_COMPONENT, SKINNED_SURFACE_COMPONENT},
};

const ANIMATOR_WEIGHT: i32 = 10;
const SKINNED_SURFACE_WEIGHT: i32 = 5;
const NAME_HINT_WEIGHT: i32 = 2;
const NAME_HINTS: [&str; 2] = ["agent", "model"];

/// How a resource was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMethod {
    /// The requested name matched a resource.
    Direct,
    /// No name matched and the highest scoring resource was taken.
    Heuristic { score: i32 },
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMethod::Direct => write!(f, "direct"),
            SelectionMethod::Heuristic { score } => write!(f, "heuristic (score {score})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub resource: Arc<Resource>,
    pub method: SelectionMethod,
}

impl Selection {
    pub fn score(&self) -> Option<i32> {
        match self.method {
            SelectionMethod::Direct => None,
            SelectionMethod::Heuristic { score } => Some(score),
        }
    }
}

/// Scores a resource by how much it looks like an animated agent.
pub fn score(resource: &Resource) -> i32 {
    let mut score = 0;
    if resource.has_component(ANIMATOR_COMPONENT) {
        score += ANIMATOR_WEIGHT;
    }
    if resource.has_component(SKINNED_SURFACE_COMPONENT) {
        score += SKINNED_SURFACE_WEIGHT;
    }

    let name = resource.name.to_lowercase();
    if NAME_HINTS.iter().any(|hint| name.contains(hint)) {
        score += NAME_HINT_WEIGHT;
    }
    score
}

/// Every top-level resource with its score, in index order.
pub fn rank(package: &Package) -> Vec<(Arc<Resource>, i32)> {
    package
        .resources()
        .iter()
        .map(|r| (r.clone(), score(r)))
        .collect()
}

fn find_direct(package: &Package, requested: &str) -> Option<Arc<Resource>> {
    if requested.is_empty() {
        return None;
    }
    package.get(requested).or_else(|| {
        package
            .resources()
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(requested) || r.stem().eq_ignore_ascii_case(requested))
            .cloned()
    })
}

/// Picks the resource to use from `package`.
///
/// `requested` is looked up by exact name first, then case-insensitively
/// against names and their stems. Without a match the highest scoring
/// resource wins; on a tie the first one in index order is kept.
///
/// # Errors
///
/// [`PackageError::NotFound`] if the package has no resources.
pub fn select(package: &Package, requested: &str) -> Result<Selection> {
    if let Some(resource) = find_direct(package, requested) {
        debug!("selected {} by name", resource.name);
        return Ok(Selection {
            resource,
            method: SelectionMethod::Direct,
        });
    }

    let mut best: Option<Arc<Resource>> = None;
    let mut best_score = -1;
    for (resource, score) in rank(package) {
        if score > best_score {
            best_score = score;
            best = Some(resource);
        }
    }

    let resource = best.ok_or_else(|| {
        PackageError::NotFound {
            requested: requested.to_string(),
        }
    })?;
    debug!(
        "`{}` not found, selected {} with score {}",
        requested, resource.name, best_score
    );

    Ok(Selection {
        resource,
        method: SelectionMethod::Heuristic { score: best_score },
    })
}
