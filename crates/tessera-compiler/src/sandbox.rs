//! Isolated evaluation of template behavior scripts.
//!
//! Every evaluation gets its own QuickJS runtime and context, dropped when the
//! call returns. Host data enters as JSON and the collected definition leaves
//! as JSON, so no engine value outlives the call.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use rquickjs::{
    CatchResultExt, Context, Ctx, Exception, Function, Module, Object, Promise, Runtime, Value,
};
use serde_json::{json, Map, Value as Json};

use crate::console::install_console;
use crate::linker::{LinkLoader, LinkResolver};
use crate::traits::{CompileOptions, PluginMethod, SandboxError};

const DATA_GLOBAL: &str = "__tessera_data";
const RAW_PLUGINS_GLOBAL: &str = "__tessera_plugin_calls";

/// Builds the host bindings object from the injected data.
const PRELUDE: &str = r#"
(() => {
  const data = globalThis.__tessera_data;
  const raw = globalThis.__tessera_plugin_calls;
  const escapes = { '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' };
  globalThis.__tessera_host = Object.freeze({
    values: data.values,
    page: data.page,
    templates: data.templates,
    pages: data.pages,
    createComponent(id, values = {}) {
      return { __tessera_component: String(id), values };
    },
    html(markup) {
      return { __tessera_html: String(markup) };
    },
    escape(text) {
      return String(text).replace(/[&<>"']/g, (c) => escapes[c]);
    },
  });
  const plugins = {};
  for (const name of Object.keys(raw)) {
    plugins[name] = (...args) => JSON.parse(raw[name](JSON.stringify(args)));
  }
  globalThis.__tessera_plugins = Object.freeze(plugins);
  delete globalThis.__tessera_data;
  delete globalThis.__tessera_plugin_calls;
})();
"#;

/// Splits a definition into computed values and the client behavior.
const COLLECT: &str = r#"
(async (definition, values) => {
  const out = {};
  let script = null;
  for (const [key, entry] of Object.entries(definition)) {
    if (key === 'script') {
      script = typeof entry === 'function' ? entry.toString() : String(entry);
      continue;
    }
    out[key] = typeof entry === 'function' ? await entry(values) : entry;
  }
  return JSON.stringify({ values: out, script });
})
"#;

/// One behavior-script evaluation.
#[derive(Debug, Clone)]
pub struct ScriptRequest<'a> {
    /// Module name the script is declared under, used as the import base
    pub path: &'a Path,
    pub source: &'a str,

    /// Current values of the instance
    pub values: Json,

    /// `{ path, values }` of the page being compiled
    pub page: Json,

    pub templates: Vec<String>,
    pub pages: Vec<String>,
}

/// Raw result of an evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptOutput {
    /// Computed values, in definition order
    pub values: Map<String, Json>,

    /// Source of the client behavior, if the definition has one
    pub client: Option<String>,
}

/// Evaluates behavior scripts under fixed limits.
#[derive(Clone)]
pub struct Sandbox {
    timeout: Duration,
    memory_limit: usize,
    plugins: IndexMap<String, PluginMethod>,
}

impl Sandbox {
    pub fn new(options: &CompileOptions) -> Self {
        Self {
            timeout: options.script_timeout,
            memory_limit: options.script_memory_limit,
            plugins: options.plugin_methods.clone(),
        }
    }

    /// Evaluate a behavior script and collect its default export.
    pub fn evaluate(&self, request: &ScriptRequest<'_>) -> Result<ScriptOutput, SandboxError> {
        let runtime = Runtime::new()?;
        runtime.set_memory_limit(self.memory_limit);

        let interrupted = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + self.timeout;
        let flag = interrupted.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || {
            let expired = Instant::now() >= deadline;
            if expired {
                flag.store(true, Ordering::Relaxed);
            }
            expired
        })));
        runtime.set_loader(
            LinkResolver,
            LinkLoader::new(self.plugins.keys().cloned().collect()),
        );

        let context = Context::full(&runtime)?;
        let result = context.with(|ctx| self.run(&ctx, request));

        match result {
            Err(_) if interrupted.load(Ordering::Relaxed) => Err(SandboxError::Timeout(self.timeout)),
            other => other,
        }
    }

    fn run(&self, ctx: &Ctx<'_>, request: &ScriptRequest<'_>) -> Result<ScriptOutput, SandboxError> {
        install_console(ctx)?;
        self.install_host(ctx, request)?;

        let name = request.path.to_string_lossy().into_owned();
        let module = caught(ctx, Module::declare(ctx.clone(), name, request.source))?;
        let (module, promise) = caught(ctx, module.eval())?;
        caught(ctx, promise.finish::<()>())?;

        let definition: Value = caught(ctx, module.get("default"))?;
        if !definition.is_object() || definition.is_function() || definition.is_array() {
            return Err(SandboxError::MissingDefaultExport);
        }

        let values = caught(ctx, ctx.json_parse(request.values.to_string()))?;
        let collect: Function = caught(ctx, ctx.eval(COLLECT))?;
        let pending: Promise = caught(ctx, collect.call((definition, values)))?;
        let output: String = caught(ctx, pending.finish())?;

        let mut output: Json = serde_json::from_str(&output)?;
        let values = match output.get_mut("values").map(Json::take) {
            Some(Json::Object(map)) => map,
            _ => Map::new(),
        };
        let client = output
            .get("script")
            .and_then(Json::as_str)
            .map(str::to_string);

        Ok(ScriptOutput { values, client })
    }

    fn install_host(&self, ctx: &Ctx<'_>, request: &ScriptRequest<'_>) -> Result<(), SandboxError> {
        let globals = ctx.globals();

        let data = json!({
            "values": request.values,
            "page": request.page,
            "templates": request.templates,
            "pages": request.pages,
        });
        globals.set(DATA_GLOBAL, caught(ctx, ctx.json_parse(data.to_string()))?)?;

        let calls = Object::new(ctx.clone())?;
        for (name, method) in &self.plugins {
            let method = method.clone();
            let plugin = name.clone();
            let function = Function::new(
                ctx.clone(),
                move |ctx: Ctx, args: String| -> rquickjs::Result<String> {
                    call_plugin(&method, &args).map_err(|message| {
                        Exception::throw_message(&ctx, &format!("plugin {plugin}: {message}"))
                    })
                },
            )?;
            calls.set(name.as_str(), function)?;
        }
        globals.set(RAW_PLUGINS_GLOBAL, calls)?;

        caught(ctx, ctx.eval::<(), _>(PRELUDE))?;
        Ok(())
    }
}

/// Run a plugin method on its JSON-encoded argument list.
fn call_plugin(method: &PluginMethod, args: &str) -> Result<String, String> {
    let args: Vec<Json> =
        serde_json::from_str(args).map_err(|e| format!("malformed arguments: {e}"))?;
    method(&args).map(|result| result.to_string())
}

/// Turn a pending exception into an error carrying its message.
fn caught<'js, T>(ctx: &Ctx<'js>, result: rquickjs::Result<T>) -> Result<T, SandboxError> {
    result
        .catch(ctx)
        .map_err(|error| SandboxError::Exception(error.to_string()))
}
