use bundlesync_config::config::Config;
use bundlesync_core::{cache::CacheRecord, SyncResult};
use bundlesync_manifest::DEFAULT_RESOURCE_NAME;
use bundlesync_package::{rank, select, PackageLoader, Resource};
use nu_ansi_term::Color::{Blue, Cyan, Green};
use tabled::{
    builder::Builder,
    settings::{peaker::PriorityMax, themes::BorderCorrection, Panel, Style, Width},
};
use tracing::{info, warn};

use crate::{
    status::store_from_config,
    utils::{term_width, Colored, Icons},
};

fn components(resource: &Resource) -> String {
    let mut names = Vec::new();
    collect_components(resource, &mut names);
    names.sort();
    names.dedup();
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

fn collect_components<'a>(resource: &'a Resource, names: &mut Vec<&'a str>) {
    names.extend(resource.components.iter().map(String::as_str));
    for child in &resource.children {
        collect_components(child, names);
    }
}

/// Resource the last sync would have selected: the command line, then the
/// configured override, then the name the manifest published.
fn requested_resource(
    resource: Option<String>,
    config: &Config,
    record: &CacheRecord,
) -> String {
    resource
        .or_else(|| config.resource_name.clone())
        .or_else(|| record.resource_name.clone())
        .unwrap_or_else(|| DEFAULT_RESOURCE_NAME.to_string())
}

/// Lists the resources of the cached package with their selection scores.
pub fn inspect_package(config: &Config, resource: Option<String>) -> SyncResult<()> {
    let store = store_from_config(config)?;
    if !store.has_payload() {
        warn!(
            "No cached package for slot {}. Run {} first.",
            store.slot(),
            Colored(Green, "bundlesync sync")
        );
        return Ok(());
    }

    let mut loader = PackageLoader::new();
    let package = loader.load(store.payload_path())?;

    let requested = requested_resource(resource, config, &store.load_record()?);
    let selected = select(package, &requested)
        .ok()
        .map(|selection| selection.resource.name.clone());

    let mut builder = Builder::new();
    builder.push_record(["", "Name", "Kind", "Components", "Nodes", "Score"]);
    for (resource, score) in rank(package) {
        let marker = if selected.as_deref() == Some(resource.name.as_str()) {
            Colored(Green, Icons::CHECK).to_string()
        } else {
            String::new()
        };
        builder.push_record([
            marker,
            Colored(Blue, &resource.name).to_string(),
            resource.kind.clone().unwrap_or_else(|| "-".to_string()),
            components(&resource),
            resource.node_count().to_string(),
            score.to_string(),
        ]);
    }

    let header = format!(
        "{} {} [{}]",
        Icons::PACKAGE,
        package.path().display(),
        package.platform().unwrap_or("any")
    );
    let table = builder
        .build()
        .with(Panel::header(header))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .with(Width::wrap(term_width()).priority(PriorityMax::default()))
        .to_string();

    info!("\n{table}");
    info!(
        "{} resources, selecting `{}` picks {}",
        Colored(Cyan, package.len()),
        requested,
        selected.as_deref().unwrap_or("nothing")
    );

    Ok(())
}
