use bundlesync_manifest::Manifest;

use crate::cache::CacheRecord;

/// Decides whether the slot payload has to be fetched again.
///
/// The cached bytes are trusted only when the payload file exists and the
/// recorded digest is non-empty and equal to the manifest's, ignoring case.
/// A manifest without a digest therefore always triggers a download.
pub fn should_download(manifest: &Manifest, record: &CacheRecord, file_exists: bool) -> bool {
    if !file_exists || record.last_digest.is_empty() {
        return true;
    }
    !manifest.digest_matches(&record.last_digest)
}
