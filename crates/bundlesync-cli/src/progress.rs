use std::{
    collections::HashMap,
    sync::{mpsc::Receiver, Arc, LazyLock},
    thread::JoinHandle,
    time::Duration,
};

use bundlesync_events::{SyncEvent, VerifyStage};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use nu_ansi_term::Color::Cyan;

use crate::utils::{progress_enabled, Colored};

/// Shared MultiProgress instance for suspend/stop from other modules.
static MULTI: LazyLock<Arc<MultiProgress>> = LazyLock::new(|| Arc::new(MultiProgress::new()));

/// Pause progress display, run the closure, then resume.
pub fn suspend<F: FnOnce()>(f: F) {
    MULTI.suspend(f);
}

/// Stop and clear all progress bars.
pub fn stop() {
    MULTI.clear().ok();
}

/// Owns the background thread started by [`spawn_event_handler`].
///
/// Every sender of the channel must be dropped before calling
/// [`finish`](ProgressGuard::finish), or it blocks forever.
pub struct ProgressGuard {
    handle: Option<JoinHandle<()>>,
}

impl ProgressGuard {
    /// Wait for the handler thread to drain remaining events.
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

fn download_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.cyan} {prefix}  {wide_bar:.cyan/dim}  {bytes}/{total_bytes}  {bytes_per_sec}  {eta}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("━━─")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn new_bar(total: u64) -> ProgressBar {
    if progress_enabled() {
        MULTI.add(ProgressBar::new(total))
    } else {
        MULTI.add(ProgressBar::hidden())
    }
}

/// Spawn a background thread that maps [`SyncEvent`]s to progress bars.
///
/// Each slot gets one bar that shows the download and then turns into a
/// spinner while the payload is verified.
pub fn spawn_event_handler(receiver: Receiver<SyncEvent>) -> ProgressGuard {
    let handle = std::thread::spawn(move || {
        let mut jobs: HashMap<String, ProgressBar> = HashMap::new();

        while let Ok(event) = receiver.recv() {
            match event {
                SyncEvent::DownloadStarting {
                    slot,
                    total,
                    ..
                } => {
                    let pb = new_bar(total);
                    pb.set_style(download_style());
                    pb.set_prefix(Colored(Cyan, &slot).to_string());
                    pb.enable_steady_tick(Duration::from_millis(100));
                    if let Some(old) = jobs.insert(slot, pb) {
                        old.finish_and_clear();
                    }
                }
                SyncEvent::DownloadProgress {
                    slot,
                    current,
                    total,
                } => {
                    if let Some(pb) = jobs.get(&slot) {
                        if total != 0 && pb.length() != Some(total) {
                            pb.set_length(total);
                        }
                        pb.set_position(current);
                    }
                }
                SyncEvent::Verifying {
                    slot,
                    stage: VerifyStage::Failed,
                } => {
                    if let Some(pb) = jobs.remove(&slot) {
                        pb.abandon_with_message(format!("Verification failed: {slot}"));
                    }
                }
                SyncEvent::Verifying {
                    slot,
                    stage: VerifyStage::Checksum,
                } => {
                    if let Some(pb) = jobs.get(&slot) {
                        pb.set_style(spinner_style());
                        pb.set_message(format!("Verifying {slot}"));
                    }
                }
                SyncEvent::PackageLoaded {
                    slot, ..
                }
                | SyncEvent::SyncFailed {
                    slot, ..
                } => {
                    if let Some(pb) = jobs.remove(&slot) {
                        pb.finish_and_clear();
                    }
                }
                _ => {}
            }
        }

        for (_, pb) in jobs.drain() {
            pb.finish_and_clear();
        }
    });

    ProgressGuard {
        handle: Some(handle),
    }
}
