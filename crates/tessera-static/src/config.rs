//! Build driver configuration.

use std::path::PathBuf;
use std::time::Duration;

use tessera_markup::IgnoreRule;

/// Extensions read from the template directory.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["html"];

/// Extensions read from the page directory.
pub const PAGE_EXTENSIONS: &[&str] = &["html", "htm", "md", "markdown"];

/// Configuration for building a site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Page source directory
    pub pages_dir: PathBuf,

    /// Template source directory
    pub templates_dir: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Minify the client script bundles
    pub minify: bool,

    /// Time budget of one behavior-script evaluation
    pub script_timeout: Duration,

    /// Memory limit of one sandbox runtime, in bytes
    pub script_memory_limit: usize,

    /// Elements the parser leaves untouched
    pub ignore: Vec<IgnoreRule>,

    /// Path segments skipped during file enumeration
    pub exclude: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            pages_dir: PathBuf::from("pages"),
            templates_dir: PathBuf::from("templates"),
            output_dir: PathBuf::from("dist"),
            minify: true,
            script_timeout: Duration::from_secs(5),
            script_memory_limit: 32 * 1024 * 1024,
            ignore: Vec::new(),
            exclude: Vec::new(),
        }
    }
}
