//! Shared compiler types: errors, options and the module lookup seam.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;

use crate::module::Module;

/// Errors that abort a compile pass.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Behavior script of <{template}> has no default export object")]
    MissingDefaultExport { template: String },

    #[error("Value {key:?} must be a string, markup, component or a list of those, found {found}")]
    InvalidValue { key: String, found: String },

    #[error("Behavior script of <{template}> failed: {source}")]
    Sandbox {
        template: String,
        #[source]
        source: SandboxError,
    },

    #[error("Markup value in {context} is invalid: {source}")]
    Markup {
        context: String,
        #[source]
        source: tessera_markup::MarkupError,
    },

    #[error("Expansion of <{template}> in {page} nests too deeply")]
    RecursionLimit { template: String, page: String },
}

/// Errors raised inside the script sandbox.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Script engine error: {0}")]
    Engine(#[from] rquickjs::Error),

    #[error("Uncaught exception: {0}")]
    Exception(String),

    #[error("Script exceeded its {0:?} time budget")]
    Timeout(Duration),

    #[error("Default export is missing or not an object")]
    MissingDefaultExport,

    #[error("Script returned malformed data: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Read access to the parsed templates and pages.
pub trait ModuleSource: Sync {
    /// Template module by id.
    fn module(&self, id: &str) -> Option<&Module>;

    /// Ids of all known templates.
    fn template_ids(&self) -> Vec<String>;

    /// Paths of all known pages.
    fn page_paths(&self) -> Vec<String>;
}

/// A resolution-time function exposed to behavior scripts through `tessera/plugins`.
///
/// Arguments and the result cross the sandbox boundary as JSON.
pub type PluginMethod =
    Arc<dyn Fn(&[serde_json::Value]) -> Result<serde_json::Value, String> + Send + Sync>;

/// Client-side code contributed by a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientModule {
    /// Script emitted at the top of every page bundle
    pub helpers: String,

    /// Module URLs imported by the bundle
    pub imports: Vec<String>,
}

/// Settings shared by every page of one compile pass.
#[derive(Clone)]
pub struct CompileOptions {
    /// Run the client bundle through the minifier
    pub minify: bool,

    /// Time budget of one behavior-script evaluation
    pub script_timeout: Duration,

    /// Memory limit of one sandbox runtime, in bytes
    pub script_memory_limit: usize,

    /// Plugin methods by name
    pub plugin_methods: IndexMap<String, PluginMethod>,

    /// Plugin client modules, in registration order
    pub client_modules: Vec<ClientModule>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            minify: true,
            script_timeout: Duration::from_secs(5),
            script_memory_limit: 32 * 1024 * 1024,
            plugin_methods: IndexMap::new(),
            client_modules: Vec::new(),
        }
    }
}

impl std::fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileOptions")
            .field("minify", &self.minify)
            .field("script_timeout", &self.script_timeout)
            .field("script_memory_limit", &self.script_memory_limit)
            .field("plugin_methods", &self.plugin_methods.keys().collect::<Vec<_>>())
            .field("client_modules", &self.client_modules)
            .finish()
    }
}
