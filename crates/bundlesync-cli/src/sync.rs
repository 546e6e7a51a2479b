use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use bundlesync_core::{
    error::{FailureKind, SyncError},
    pipeline::{SyncOutcome, Synchronizer},
    session::SyncSession,
    SyncResult,
};
use bundlesync_events::{EventSinkHandle, SyncEvent};
use bundlesync_package::SelectionMethod;
use bundlesync_utils::time::format_duration;
use nu_ansi_term::Color::{Blue, Cyan, Green, Yellow};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::utils::{short_digest, Colored, Icons};

pub fn report_outcome(outcome: &SyncOutcome) {
    let manifest = &outcome.manifest;
    if outcome.downloaded {
        info!(
            version = %manifest.version,
            "{} Downloaded version {} ({})",
            Colored(Green, Icons::CHECK),
            Colored(Cyan, &manifest.version),
            short_digest(&manifest.digest)
        );
    } else {
        info!(
            "{} Version {} is up to date",
            Colored(Green, Icons::CHECK),
            Colored(Cyan, &manifest.version)
        );
    }

    let resource = &outcome.selection.resource;
    match outcome.selection.method {
        SelectionMethod::Direct => {
            info!(
                resource = %resource.name,
                "{} Selected {}",
                Icons::ARROW,
                Colored(Blue, &resource.name)
            );
        }
        SelectionMethod::Heuristic {
            score,
        } => {
            info!(
                resource = %resource.name,
                score,
                "{} Selected {} (best match, score {})",
                Colored(Yellow, Icons::WARNING),
                Colored(Blue, &resource.name),
                score
            );
        }
    }
    debug!("payload at {}", outcome.payload_path.display());
}

async fn run_blocking(sync: Synchronizer) -> SyncResult<(Synchronizer, SyncResult<SyncOutcome>)> {
    tokio::task::spawn_blocking(move || {
        let mut sync = sync;
        let result = sync.sync();
        (sync, result)
    })
    .await
    .map_err(|err| SyncError::Custom(format!("sync task failed: {err}")))
}

/// Runs a single sync pass.
pub async fn sync_once(sync: Synchronizer) -> SyncResult<()> {
    let (_sync, result) = run_blocking(sync).await?;
    report_outcome(&result?);
    Ok(())
}

/// Syncs every `interval` until interrupted.
///
/// Ticks that arrive while a sync is still running are skipped. A slot
/// locked by another process is skipped as well instead of waited on.
pub async fn watch(
    mut sync: Synchronizer,
    events: EventSinkHandle,
    interval: Duration,
) -> SyncResult<()> {
    sync.options_mut().wait_for_lock = false;
    let slot = sync.store().slot().to_string();
    let sync = Arc::new(Mutex::new(sync));
    let session = SyncSession::new();

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Watching slot {} every {}",
        Colored(Cyan, &slot),
        format_duration(interval)
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ticket = match session.trigger() {
                    Ok(ticket) => ticket,
                    Err(err) => {
                        debug!("{}; skipping tick", err);
                        events.emit(SyncEvent::SyncSkipped { slot: slot.clone() });
                        continue;
                    }
                };

                let sync = sync.clone();
                tokio::task::spawn_blocking(move || {
                    let mut sync = sync.lock().unwrap_or_else(PoisonError::into_inner);
                    match sync.sync() {
                        Ok(outcome) => {
                            ticket.resume();
                            report_outcome(&outcome);
                        }
                        Err(err) if err.kind() == FailureKind::Busy => warn!("{}", err),
                        Err(err) => error!("[{}] {}", err.kind(), err),
                    }
                    drop(ticket);
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                break;
            }
        }
    }

    Ok(())
}
