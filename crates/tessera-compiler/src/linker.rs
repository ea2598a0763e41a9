//! Module resolution for behavior scripts.
//!
//! Imports never reach the engine's default loader. Two specifiers name
//! synthetic modules built from host bindings; relative specifiers resolve
//! against the importing file; bare specifiers are looked up in `node_modules`
//! directories walking up from the importer.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use rquickjs::loader::{Loader, Resolver};
use rquickjs::module::Declared;
use rquickjs::{Ctx, Error, Module};

/// Specifier of the host bindings module.
pub const HOST_MODULE: &str = "tessera";

/// Specifier of the plugin methods module.
pub const PLUGIN_MODULE: &str = "tessera/plugins";

/// Global the sandbox stores host bindings under.
pub const HOST_GLOBAL: &str = "__tessera_host";

/// Global the sandbox stores plugin methods under.
pub const PLUGINS_GLOBAL: &str = "__tessera_plugins";

/// Names re-exported by the host module.
pub const HOST_EXPORTS: &[&str] = &[
    "values",
    "page",
    "templates",
    "pages",
    "createComponent",
    "html",
    "escape",
];

const EXTENSIONS: &[&str] = &["js", "mjs", "json"];

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid regex"));

/// Maps `(importer, specifier)` to a canonical module name.
#[derive(Debug, Default)]
pub struct LinkResolver;

impl Resolver for LinkResolver {
    fn resolve<'js>(&mut self, _ctx: &Ctx<'js>, base: &str, name: &str) -> rquickjs::Result<String> {
        resolve_specifier(base, name)
            .ok_or_else(|| Error::new_resolving(base, name))
    }
}

/// Produces module sources for canonical names.
#[derive(Debug, Default)]
pub struct LinkLoader {
    plugin_names: Vec<String>,
}

impl LinkLoader {
    pub fn new(plugin_names: Vec<String>) -> Self {
        Self { plugin_names }
    }
}

impl Loader for LinkLoader {
    fn load<'js>(&mut self, ctx: &Ctx<'js>, name: &str) -> rquickjs::Result<Module<'js, Declared>> {
        let source = match name {
            HOST_MODULE => host_module_source(),
            PLUGIN_MODULE => plugin_module_source(&self.plugin_names),
            path => load_file(path).ok_or_else(|| Error::new_loading(name))?,
        };
        tracing::debug!("linked module {}", name);
        Module::declare(ctx.clone(), name, source)
    }
}

/// Resolve a specifier imported from `base`.
pub fn resolve_specifier(base: &str, name: &str) -> Option<String> {
    if name == HOST_MODULE || name == PLUGIN_MODULE {
        return Some(name.to_string());
    }

    let importer = Path::new(base);
    if !importer.is_absolute() {
        return None;
    }
    let dir = importer.parent()?;

    let resolved = if is_relative(name) {
        resolve_file(&normalize(&dir.join(name)))?
    } else if name.starts_with('/') {
        resolve_file(&normalize(Path::new(name)))?
    } else {
        resolve_package(dir, name)?
    };

    Some(resolved.to_string_lossy().into_owned())
}

fn is_relative(name: &str) -> bool {
    name.starts_with("./") || name.starts_with("../") || name == "." || name == ".."
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Try the path itself, then with known extensions, then as a directory index.
fn resolve_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    for ext in EXTENSIONS {
        let candidate = PathBuf::from(format!("{}.{ext}", path.display()));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    if path.is_dir() {
        return resolve_package_dir(path);
    }
    None
}

/// Split `@scope/pkg/sub/path` into `@scope/pkg` and `sub/path`.
fn split_package(name: &str) -> (&str, Option<&str>) {
    let boundary = if name.starts_with('@') {
        name.match_indices('/').nth(1).map(|(i, _)| i)
    } else {
        name.find('/')
    };
    match boundary {
        Some(i) => (&name[..i], Some(&name[i + 1..])),
        None => (name, None),
    }
}

fn resolve_package(from: &Path, name: &str) -> Option<PathBuf> {
    let (package, subpath) = split_package(name);

    for dir in from.ancestors() {
        let root = dir.join("node_modules").join(package);
        if !root.is_dir() {
            continue;
        }
        return match subpath {
            Some(sub) => resolve_file(&normalize(&root.join(sub))),
            None => resolve_package_dir(&root),
        };
    }
    None
}

/// Entry point of a package directory: `module`, then `main`, then `index.js`.
fn resolve_package_dir(root: &Path) -> Option<PathBuf> {
    if let Ok(manifest) = fs::read_to_string(root.join("package.json")) {
        if let Ok(manifest) = serde_json::from_str::<serde_json::Value>(&manifest) {
            for field in ["module", "main"] {
                let Some(entry) = manifest.get(field).and_then(|v| v.as_str()) else {
                    continue;
                };
                let path = normalize(&root.join(entry));
                if let Some(found) = resolve_file_only(&path) {
                    return Some(found);
                }
            }
        }
    }
    resolve_file_only(&root.join("index"))
}

fn resolve_file_only(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    EXTENSIONS
        .iter()
        .map(|ext| PathBuf::from(format!("{}.{ext}", path.display())))
        .find(|candidate| candidate.is_file())
}

fn load_file(path: &str) -> Option<String> {
    let source = fs::read_to_string(path).ok()?;
    if path.ends_with(".json") {
        return Some(format!("export default {};", source.trim()));
    }
    Some(source)
}

fn host_module_source() -> String {
    let mut source = format!("const host = globalThis.{HOST_GLOBAL};\n");
    for name in HOST_EXPORTS {
        source.push_str(&format!("export const {name} = host.{name};\n"));
    }
    source.push_str("export default host;\n");
    source
}

fn plugin_module_source(names: &[String]) -> String {
    let mut source = format!("const plugins = globalThis.{PLUGINS_GLOBAL};\n");
    for name in names {
        if IDENTIFIER.is_match(name) && name != "default" {
            source.push_str(&format!("export const {name} = plugins[{name:?}];\n"));
        }
    }
    source.push_str("export default plugins;\n");
    source
}
