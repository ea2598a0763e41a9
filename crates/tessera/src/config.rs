//! Configuration file (tessera.toml).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tessera_markup::IgnoreRule;
use tessera_static::SiteConfig;

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    site: SiteSection,
    #[serde(default)]
    build: BuildSection,
    #[serde(default)]
    ignore: Vec<IgnoreRule>,
    #[serde(default)]
    exclude: ExcludeSection,
}

#[derive(Debug, Deserialize)]
struct SiteSection {
    #[serde(default = "default_pages")]
    pages: String,
    #[serde(default = "default_templates")]
    templates: String,
    #[serde(default = "default_output")]
    output: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            pages: default_pages(),
            templates: default_templates(),
            output: default_output(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BuildSection {
    #[serde(default = "default_minify")]
    minify: bool,
    #[serde(default = "default_script_timeout_ms")]
    script_timeout_ms: u64,
    #[serde(default = "default_script_memory_mb")]
    script_memory_mb: usize,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            minify: default_minify(),
            script_timeout_ms: default_script_timeout_ms(),
            script_memory_mb: default_script_memory_mb(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ExcludeSection {
    #[serde(default)]
    patterns: Vec<String>,
}

fn default_pages() -> String {
    "pages".to_string()
}
fn default_templates() -> String {
    "templates".to_string()
}
fn default_output() -> String {
    "dist".to_string()
}
fn default_minify() -> bool {
    true
}
fn default_script_timeout_ms() -> u64 {
    5000
}
fn default_script_memory_mb() -> usize {
    32
}

/// Command-line overrides of the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub minify: Option<bool>,
}

/// Load the configuration file if it exists.
/// Returns an error if the file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No {} found, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

impl ConfigFile {
    /// Build the site configuration. Directories are relative to `base`,
    /// the directory holding the configuration file.
    pub fn into_site_config(self, base: &Path, overrides: Overrides) -> SiteConfig {
        SiteConfig {
            pages_dir: base.join(&self.site.pages),
            templates_dir: base.join(&self.site.templates),
            output_dir: overrides
                .output
                .unwrap_or_else(|| base.join(&self.site.output)),
            minify: overrides.minify.unwrap_or(self.build.minify),
            script_timeout: Duration::from_millis(self.build.script_timeout_ms),
            script_memory_limit: self.build.script_memory_mb * 1024 * 1024,
            ignore: self.ignore,
            exclude: self.exclude.patterns,
        }
    }
}

/// Load `path` and apply the command-line overrides.
pub fn site_config(path: &Path, overrides: Overrides) -> Result<SiteConfig> {
    let base = path.parent().unwrap_or(Path::new("")).to_path_buf();
    Ok(load_config(path)?.into_site_config(&base, overrides))
}
