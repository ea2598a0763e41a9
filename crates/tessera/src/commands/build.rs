//! Static site build command.

use std::path::Path;

use anyhow::Result;
use tessera_static::Site;

use crate::config::{site_config, Overrides};

/// Run the build command.
pub async fn run(config_path: &Path, overrides: Overrides) -> Result<()> {
    tracing::info!("Building site...");

    let config = site_config(config_path, overrides)?;
    let mut site = Site::new(config);
    let result = site.build().await?;

    tracing::info!(
        "Built {} pages with {} templates in {}ms",
        result.pages,
        result.templates,
        result.duration_ms
    );
    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
