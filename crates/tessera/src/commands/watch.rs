//! Build, then rebuild affected pages on every change.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use tessera_static::Site;

use crate::config::{site_config, Overrides};
use crate::watcher::FileWatcher;

const DEBOUNCE: Duration = Duration::from_millis(100);

/// Run the watch command.
pub async fn run(config_path: &Path, overrides: Overrides) -> Result<()> {
    let config = site_config(config_path, overrides)?;
    let output_dir = config.output_dir.clone();
    let watched = vec![config.pages_dir.clone(), config.templates_dir.clone()];

    let mut site = Site::new(config);
    let result = site.build().await?;
    tracing::info!(
        "Built {} pages with {} templates in {}ms",
        result.pages,
        result.templates,
        result.duration_ms
    );

    let (_watcher, mut changes) = FileWatcher::new(&watched, DEBOUNCE)?;
    tracing::info!("Watching for changes (Ctrl+C to stop)");

    loop {
        tokio::select! {
            batch = changes.recv() => {
                let Some(paths) = batch else { break };
                if let Err(e) = rebuild(&mut site, &paths, &output_dir).await {
                    tracing::error!("Rebuild failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping watcher");
                break;
            }
        }
    }

    Ok(())
}

/// Apply a batch of changed paths and recompile the pages they affect.
async fn rebuild(site: &mut Site, paths: &[PathBuf], output_dir: &Path) -> Result<()> {
    let start = Instant::now();
    let mut recompile: Vec<String> = Vec::new();
    let mut removed: Vec<String> = Vec::new();

    for path in paths {
        let change = match site.apply_change(path) {
            Ok(change) => change,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        for page in change.recompile {
            if !recompile.contains(&page) {
                recompile.push(page);
            }
        }
        removed.extend(change.removed);
    }
    recompile.retain(|page| !removed.contains(page));

    site.discard(&removed, output_dir).await?;
    if recompile.is_empty() {
        return Ok(());
    }

    let results = site.compile(Some(&recompile))?;
    site.save(&results, output_dir).await?;

    tracing::info!(
        "Rebuilt {} pages in {}ms",
        results.len(),
        start.elapsed().as_millis()
    );
    Ok(())
}
