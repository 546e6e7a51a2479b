use std::fs;

use bundlesync_config::config::Config;
use bundlesync_core::{cache::CacheStore, SyncResult};
use bundlesync_utils::bytes::format_bytes;
use nu_ansi_term::Color::{Blue, Cyan, Green, Red, Yellow};
use tabled::{
    builder::Builder,
    settings::{peaker::PriorityMax, themes::BorderCorrection, Panel, Style, Width},
};
use tracing::info;

use crate::utils::{term_width, Colored, Icons};

pub fn store_from_config(config: &Config) -> SyncResult<CacheStore> {
    Ok(CacheStore::new(config.get_cache_path()?, config.slot()))
}

pub fn display_status(config: &Config) -> SyncResult<()> {
    let store = store_from_config(config)?;
    let record = store.load_record()?;

    let manifest_url = config
        .get_manifest_url()
        .unwrap_or_else(|err| format!("{} {err}", Colored(Red, Icons::CROSS)));

    let payload_path = store.payload_path();
    let payload = match fs::metadata(&payload_path) {
        Ok(meta) if meta.is_file() => {
            format!(
                "{} {} ({})",
                Colored(Green, Icons::CHECK),
                Colored(Blue, payload_path.display()),
                format_bytes(meta.len(), 2)
            )
        }
        _ => {
            format!(
                "{} {} missing",
                Colored(Yellow, Icons::WARNING),
                Colored(Blue, payload_path.display())
            )
        }
    };

    let digest = if record.last_digest.is_empty() {
        "-".to_string()
    } else {
        format!("{} ({})", record.last_digest, config.checksum())
    };

    let mut builder = Builder::new();
    builder.push_record(["Slot".to_string(), Colored(Cyan, store.slot()).to_string()]);
    builder.push_record(["Manifest".to_string(), manifest_url]);
    builder.push_record(["Payload".to_string(), payload]);
    builder.push_record(["Digest".to_string(), digest]);
    builder.push_record([
        "Version".to_string(),
        record.version.unwrap_or_else(|| "-".to_string()),
    ]);
    builder.push_record([
        "Resource".to_string(),
        record.resource_name.unwrap_or_else(|| "-".to_string()),
    ]);
    builder.push_record([
        "Updated".to_string(),
        record
            .updated_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string()),
    ]);
    builder.push_record([
        "Record".to_string(),
        store.record_path().display().to_string(),
    ]);

    let table = builder
        .build()
        .with(Panel::header("Cache Status"))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .with(Width::wrap(term_width()).priority(PriorityMax::default()))
        .to_string();

    info!("\n{table}");

    Ok(())
}

pub fn clean_slot(config: &Config) -> SyncResult<()> {
    let store = store_from_config(config)?;
    let _lock = store.lock()?;

    if store.clean()? {
        info!(
            "{} Removed cached package for slot {}",
            Colored(Green, Icons::CHECK),
            Colored(Cyan, store.slot())
        );
    } else {
        info!("Nothing to clean for slot {}", store.slot());
    }

    Ok(())
}
