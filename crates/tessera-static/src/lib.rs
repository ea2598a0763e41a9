//! Build driver for tessera sites.
//!
//! Loads templates and pages into collections, compiles pages in parallel and
//! writes the output directory. Plugins hook into loading and compilation.

pub mod config;
pub mod enumerate;
pub mod error;
pub mod plugin;
pub mod site;

pub use config::SiteConfig;
pub use enumerate::enumerate;
pub use error::SiteError;
pub use plugin::{Plugin, Plugins};
pub use site::{output_path, BuildResult, Change, CompiledPage, Site};
