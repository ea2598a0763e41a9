//! Component compiler for tessera.
//!
//! This crate turns parsed pages into fully resolved HTML: custom elements are
//! expanded into their templates, behavior scripts run in an isolated QuickJS
//! sandbox, and per-instance client behaviors are bundled into one page script.

pub mod bundler;
pub mod console;
pub mod linker;
pub mod module;
pub mod resolver;
pub mod sandbox;
pub mod traits;
pub mod value;

pub use bundler::{bundle, inject, minify_source, Bundle, ClientInstance};
pub use module::{
    page_collection, template_collection, Library, Module, ModuleOptions, Page, PageOptions,
    TemplateKeys,
};
pub use resolver::{compile_page, PageCompiler};
pub use sandbox::{Sandbox, ScriptOutput, ScriptRequest};
pub use traits::{ClientModule, CompileError, CompileOptions, ModuleSource, PluginMethod, SandboxError};
pub use value::{Value, Values};
