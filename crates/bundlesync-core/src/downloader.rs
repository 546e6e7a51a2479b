use std::{fs, path::PathBuf};

use bundlesync_dl::{download::Download, types::Progress};
use bundlesync_events::{EventSinkHandle, SyncEvent, VerifyStage};
use bundlesync_manifest::Manifest;
use bundlesync_utils::{
    fs::safe_remove,
    hash::{calculate_checksum, DigestAlgorithm},
};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheRecord, CacheStore},
    error::{ErrorContext, SyncError},
    SyncResult,
};

fn discard(path: &std::path::Path) {
    if let Err(err) = safe_remove(path) {
        debug!("failed to remove staging file {}: {}", path.display(), err);
    }
}

/// Downloads the package named by `manifest` into the slot.
///
/// The bytes are staged next to the payload and only moved into place
/// after they match the manifest digest, so any failure leaves the
/// previously cached payload and record as they were. On success the
/// record is updated with the manifest digest, which may be empty.
///
/// Returns the path of the new payload.
pub fn download_payload(
    store: &CacheStore,
    manifest: &Manifest,
    algorithm: DigestAlgorithm,
    events: &EventSinkHandle,
) -> SyncResult<PathBuf> {
    store.ensure_dir()?;

    let slot = store.slot().to_string();
    let url = manifest.package_url.clone();
    let staging = store.staging_path();
    let payload = store.payload_path();

    let sink = events.clone();
    let progress_slot = slot.clone();
    let progress_url = url.clone();
    let result = Download::new(&url, &staging)
        .cache_bust(true)
        .progress(move |progress| {
            let slot = progress_slot.clone();
            let event = match progress {
                Progress::Starting { total } => {
                    SyncEvent::DownloadStarting {
                        slot,
                        url: progress_url.clone(),
                        total,
                    }
                }
                Progress::Chunk { current, total } => {
                    SyncEvent::DownloadProgress {
                        slot,
                        current,
                        total,
                    }
                }
                Progress::Complete { total } => SyncEvent::DownloadComplete { slot, total },
            };
            sink.emit(event);
        })
        .execute();

    let written = match result {
        Ok(written) => written,
        Err(source) => {
            discard(&staging);
            return Err(SyncError::Download { url, source });
        }
    };
    debug!("received {} bytes from {}", written, url);

    if manifest.has_digest() {
        events.emit(SyncEvent::Verifying {
            slot: slot.clone(),
            stage: VerifyStage::Checksum,
        });

        let actual = match calculate_checksum(algorithm, &staging) {
            Ok(actual) => actual,
            Err(err) => {
                discard(&staging);
                return Err(err.into());
            }
        };

        if !manifest.digest_matches(&actual) {
            discard(&staging);
            events.emit(SyncEvent::Verifying {
                slot,
                stage: VerifyStage::Failed,
            });
            warn!(
                "checksum mismatch for {}: expected {}, got {}",
                url, manifest.digest, actual
            );
            return Err(SyncError::ChecksumMismatch {
                url,
                expected: manifest.digest.clone(),
                actual,
            });
        }

        events.emit(SyncEvent::Verifying {
            slot: slot.clone(),
            stage: VerifyStage::Passed,
        });
    } else {
        events.emit(SyncEvent::Verifying {
            slot: slot.clone(),
            stage: VerifyStage::Skipped,
        });
    }

    if let Err(err) = fs::rename(&staging, &payload) {
        discard(&staging);
        return Err(err).with_context(|| format!("replacing {}", payload.display()));
    }

    store.save_record(&CacheRecord {
        last_digest: manifest.digest.clone(),
        version: Some(manifest.version.clone()),
        resource_name: Some(manifest.resource_name.clone()),
        updated_at: Some(Utc::now()),
    })?;

    info!(
        "cached {} ({} bytes) as {}",
        manifest.version,
        written,
        payload.display()
    );

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bundlesync_events::CollectorSink;
    use bundlesync_manifest::{ManifestOrigin, DEFAULT_RESOURCE_NAME};
    use bundlesync_utils::hash::digest_bytes;
    use tempfile::tempdir;
    use url::Url;

    use super::*;
    use crate::error::FailureKind;

    fn manifest_for(source: &std::path::Path, digest: &str) -> Manifest {
        Manifest {
            version: "9".into(),
            resource_name: DEFAULT_RESOURCE_NAME.into(),
            package_url: Url::from_file_path(source).unwrap().to_string(),
            digest: digest.into(),
            origin: ManifestOrigin::Descriptor,
            package_url_inferred: false,
        }
    }

    #[test]
    fn test_download_verifies_and_records() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("agent_v9");
        fs::write(&source, b"payload v9").unwrap();
        let digest = digest_bytes(DigestAlgorithm::Md5, b"payload v9").to_uppercase();

        let store = CacheStore::new(dir.path().join("cache"), "agent");
        let collector = Arc::new(CollectorSink::default());
        let events: EventSinkHandle = collector.clone();

        let path =
            download_payload(&store, &manifest_for(&source, &digest), DigestAlgorithm::Md5, &events)
                .unwrap();

        assert_eq!(path, store.payload_path());
        assert_eq!(fs::read(&path).unwrap(), b"payload v9");
        assert!(!store.staging_path().exists());

        let record = store.load_record().unwrap();
        assert_eq!(record.last_digest, digest);
        assert_eq!(record.version.as_deref(), Some("9"));
        assert_eq!(record.resource_name.as_deref(), Some(DEFAULT_RESOURCE_NAME));
        assert!(record.updated_at.is_some());

        let events = collector.events();
        assert!(events.contains(&SyncEvent::Verifying {
            slot: "agent".into(),
            stage: VerifyStage::Passed,
        }));
        assert!(events
            .iter()
            .any(|e| matches!(e, SyncEvent::DownloadComplete { total: 10, .. })));
    }

    #[test]
    fn test_checksum_mismatch_keeps_previous_payload() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("agent_v9");
        fs::write(&source, b"tampered").unwrap();

        let store = CacheStore::new(dir.path().join("cache"), "agent");
        store.ensure_dir().unwrap();
        fs::write(store.payload_path(), b"known good").unwrap();
        let previous = CacheRecord {
            last_digest: "0123456789abcdef0123456789abcdef".into(),
            version: Some("8".into()),
            resource_name: Some("Bar".into()),
            updated_at: None,
        };
        store.save_record(&previous).unwrap();

        let events: EventSinkHandle = Arc::new(CollectorSink::default());
        let err = download_payload(
            &store,
            &manifest_for(&source, "ffffffffffffffffffffffffffffffff"),
            DigestAlgorithm::Md5,
            &events,
        )
        .unwrap_err();

        assert_eq!(err.kind(), FailureKind::ChecksumMismatch);
        assert_eq!(fs::read(store.payload_path()).unwrap(), b"known good");
        assert_eq!(store.load_record().unwrap(), previous);
        assert!(!store.staging_path().exists());
    }

    #[test]
    fn test_write_failure_keeps_previous_payload() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("agent_v9");
        fs::write(&source, b"payload v9").unwrap();
        let digest = digest_bytes(DigestAlgorithm::Md5, b"payload v9");

        let store = CacheStore::new(dir.path().join("cache"), "agent");
        store.ensure_dir().unwrap();
        fs::write(store.payload_path(), b"known good").unwrap();
        let previous = CacheRecord {
            last_digest: "0123456789abcdef0123456789abcdef".into(),
            version: Some("8".into()),
            resource_name: None,
            updated_at: None,
        };
        store.save_record(&previous).unwrap();
        // The staging file cannot be created over a directory.
        fs::create_dir(store.staging_path()).unwrap();

        let events: EventSinkHandle = Arc::new(CollectorSink::default());
        let err = download_payload(
            &store,
            &manifest_for(&source, &digest),
            DigestAlgorithm::Md5,
            &events,
        )
        .unwrap_err();

        assert_eq!(err.kind(), FailureKind::FileWriteFailure);
        assert_eq!(fs::read(store.payload_path()).unwrap(), b"known good");
        assert_eq!(store.load_record().unwrap(), previous);
    }

    #[test]
    fn test_empty_digest_skips_verification() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("agent_current");
        fs::write(&source, b"unverified").unwrap();

        let store = CacheStore::new(dir.path().join("cache"), "agent");
        let collector = Arc::new(CollectorSink::default());
        let events: EventSinkHandle = collector.clone();

        download_payload(&store, &manifest_for(&source, ""), DigestAlgorithm::Md5, &events)
            .unwrap();

        assert_eq!(store.load_record().unwrap().last_digest, "");
        assert!(collector.events().contains(&SyncEvent::Verifying {
            slot: "agent".into(),
            stage: VerifyStage::Skipped,
        }));
    }

    #[test]
    fn test_network_failure_touches_nothing() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache"), "agent");
        store.ensure_dir().unwrap();
        fs::write(store.payload_path(), b"known good").unwrap();

        let events: EventSinkHandle = Arc::new(CollectorSink::default());
        let err = download_payload(
            &store,
            &manifest_for(&dir.path().join("missing"), "abcd"),
            DigestAlgorithm::Md5,
            &events,
        )
        .unwrap_err();

        assert_eq!(err.kind(), FailureKind::NetworkFailure);
        assert_eq!(fs::read(store.payload_path()).unwrap(), b"known good");
        assert!(!store.record_path().exists());
    }

    #[test]
    fn test_blake3_digest() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("agent_current");
        fs::write(&source, b"blake3 payload").unwrap();
        let digest = digest_bytes(DigestAlgorithm::Blake3, b"blake3 payload");

        let store = CacheStore::new(dir.path().join("cache"), "agent");
        let events: EventSinkHandle = Arc::new(CollectorSink::default());

        download_payload(
            &store,
            &manifest_for(&source, &digest),
            DigestAlgorithm::Blake3,
            &events,
        )
        .unwrap();
        assert_eq!(store.load_record().unwrap().last_digest, digest);
    }
}
