use std::{path::PathBuf, sync::Arc};

use bundlesync_config::config::Config;
use bundlesync_events::{EventSinkHandle, NullSink, SyncEvent};
use bundlesync_manifest::{fetch_manifest_text, parse_manifest, Manifest, ManifestOrigin};
use bundlesync_package::{select, PackageLoader, Selection};
use bundlesync_utils::hash::{verify_file, DigestAlgorithm};
use tracing::{debug, info, warn};

use crate::{
    cache::CacheStore, downloader::download_payload, error::SyncError,
    validator::should_download, SyncResult,
};

/// Settings for one slot's synchronizer.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub manifest_url: String,
    /// Resource to select instead of the one the manifest names.
    pub resource_name: Option<String>,
    pub algorithm: DigestAlgorithm,
    /// Re-hash a cached payload before trusting it.
    pub verify_on_load: bool,
    /// Wait for the slot lock instead of failing with [`SyncError::Busy`].
    pub wait_for_lock: bool,
}

impl SyncOptions {
    pub fn new(manifest_url: impl Into<String>) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            resource_name: None,
            algorithm: DigestAlgorithm::default(),
            verify_on_load: false,
            wait_for_lock: true,
        }
    }
}

/// Result of a successful pass.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub manifest: Manifest,
    /// False when the cached payload was reused.
    pub downloaded: bool,
    pub payload_path: PathBuf,
    pub selection: Selection,
}

/// Runs the fetch → validate → download → load → select pass for one slot.
///
/// The synchronizer owns the slot's [`PackageLoader`], so the package
/// loaded by the last successful pass stays open until the next one.
pub struct Synchronizer {
    store: CacheStore,
    options: SyncOptions,
    loader: PackageLoader,
    events: EventSinkHandle,
}

impl Synchronizer {
    pub fn new(store: CacheStore, options: SyncOptions) -> Self {
        Self {
            store,
            options,
            loader: PackageLoader::new(),
            events: Arc::new(NullSink),
        }
    }

    /// Builds a synchronizer for the slot configured in `config`.
    ///
    /// `manifest_url` overrides the configured manifest URL.
    pub fn from_config(config: &Config, manifest_url: Option<&str>) -> SyncResult<Self> {
        let store = CacheStore::new(config.get_cache_path()?, config.slot());
        let options = SyncOptions {
            manifest_url: config.manifest_url_or(manifest_url)?,
            resource_name: config.resource_name.clone(),
            algorithm: config.checksum(),
            verify_on_load: config.verify_on_load(),
            wait_for_lock: true,
        };
        Ok(Self::new(store, options))
    }

    pub fn with_events(mut self, events: EventSinkHandle) -> Self {
        self.events = events;
        self
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut SyncOptions {
        &mut self.options
    }

    pub fn loader(&self) -> &PackageLoader {
        &self.loader
    }

    /// Runs one pass. Failures are also reported as [`SyncEvent::SyncFailed`].
    pub fn sync(&mut self) -> SyncResult<SyncOutcome> {
        let result = self.run();
        if let Err(err) = &result {
            self.events.emit(SyncEvent::SyncFailed {
                slot: self.store.slot().to_string(),
                kind: err.kind().to_string(),
                message: err.to_string(),
            });
        }
        result
    }

    fn emit(&self, event: SyncEvent) {
        self.events.emit(event);
    }

    fn run(&mut self) -> SyncResult<SyncOutcome> {
        let slot = self.store.slot().to_string();
        let url = self.options.manifest_url.clone();

        let raw = fetch_manifest_text(&url)?;
        self.emit(SyncEvent::ManifestFetched {
            slot: slot.clone(),
            url: url.clone(),
            bytes: raw.len(),
        });

        let manifest = parse_manifest(&raw, &url)?;
        debug!(
            "manifest version {} names {} at {}",
            manifest.version, manifest.resource_name, manifest.package_url
        );
        self.emit(SyncEvent::ManifestParsed {
            slot: slot.clone(),
            version: manifest.version.clone(),
            resource_name: manifest.resource_name.clone(),
            legacy: manifest.origin == ManifestOrigin::Legacy,
        });

        let (downloaded, payload_path) = self.refresh(&manifest)?;

        let package = self.loader.load(&payload_path)?;
        self.events.emit(SyncEvent::PackageLoaded {
            slot: slot.clone(),
            resources: package.len(),
        });

        let requested = self
            .options
            .resource_name
            .as_deref()
            .unwrap_or(&manifest.resource_name);
        let selection = select(package, requested)?;
        if let Some(score) = selection.score() {
            warn!(
                "resource `{}` not in package; using {} (score {})",
                requested, selection.resource.name, score
            );
        }
        self.events.emit(SyncEvent::ResourceSelected {
            slot,
            name: selection.resource.name.clone(),
            score: selection.score(),
        });

        Ok(SyncOutcome {
            manifest,
            downloaded,
            payload_path,
            selection,
        })
    }

    /// Brings the slot payload in line with `manifest` under the slot lock.
    fn refresh(&self, manifest: &Manifest) -> SyncResult<(bool, PathBuf)> {
        let slot = self.store.slot();
        let _lock = if self.options.wait_for_lock {
            self.store.lock()?
        } else {
            self.store.try_lock()?.ok_or_else(|| {
                SyncError::Busy {
                    slot: slot.to_string(),
                }
            })?
        };

        let record = self.store.load_record()?;
        let payload = self.store.payload_path();
        let mut needed = should_download(manifest, &record, payload.is_file());

        if !needed && self.options.verify_on_load {
            if verify_file(self.options.algorithm, &payload, &record.last_digest) {
                debug!("cached payload {} verified", payload.display());
            } else {
                warn!(
                    "cached payload {} no longer matches {}; downloading again",
                    payload.display(),
                    record.last_digest
                );
                needed = true;
            }
        }

        if !needed {
            info!("{} is up to date ({})", slot, manifest.version);
            self.emit(SyncEvent::CacheHit {
                slot: slot.to_string(),
                digest: record.last_digest,
            });
            return Ok((false, payload));
        }

        let path = download_payload(&self.store, manifest, self.options.algorithm, &self.events)?;
        Ok((true, path))
    }
}
