/// All event types emitted while synchronizing a cache slot.
///
/// Every event names the slot it concerns so one sink can serve several
/// synchronizers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Manifest text was received.
    ManifestFetched { slot: String, url: String, bytes: usize },
    /// Manifest was parsed and normalized.
    ManifestParsed {
        slot: String,
        version: String,
        resource_name: String,
        /// True when the manifest was inferred from a build-tool manifest.
        legacy: bool,
    },
    /// The cached payload matches the manifest; no download needed.
    CacheHit { slot: String, digest: String },
    /// Download is starting. `total` is 0 when unknown.
    DownloadStarting { slot: String, url: String, total: u64 },
    DownloadProgress { slot: String, current: u64, total: u64 },
    DownloadComplete { slot: String, total: u64 },
    /// Verification stage.
    Verifying { slot: String, stage: VerifyStage },
    /// The payload was opened as a package.
    PackageLoaded { slot: String, resources: usize },
    /// A resource was chosen. `score` is `None` for a direct match.
    ResourceSelected {
        slot: String,
        name: String,
        score: Option<i32>,
    },
    /// A trigger was ignored because a sync was already running.
    SyncSkipped { slot: String },
    /// The pipeline stopped with an error.
    SyncFailed {
        slot: String,
        kind: String,
        message: String,
    },
}

impl SyncEvent {
    /// The slot this event concerns.
    pub fn slot(&self) -> &str {
        match self {
            SyncEvent::ManifestFetched { slot, .. }
            | SyncEvent::ManifestParsed { slot, .. }
            | SyncEvent::CacheHit { slot, .. }
            | SyncEvent::DownloadStarting { slot, .. }
            | SyncEvent::DownloadProgress { slot, .. }
            | SyncEvent::DownloadComplete { slot, .. }
            | SyncEvent::Verifying { slot, .. }
            | SyncEvent::PackageLoaded { slot, .. }
            | SyncEvent::ResourceSelected { slot, .. }
            | SyncEvent::SyncSkipped { slot }
            | SyncEvent::SyncFailed { slot, .. } => slot,
        }
    }
}

/// Stages of payload verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStage {
    Checksum,
    Passed,
    Failed,
    /// The manifest carried no digest.
    Skipped,
}
