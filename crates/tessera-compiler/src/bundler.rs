//! Page-level client script assembly.
//!
//! Every instance that registered a client behavior during expansion becomes
//! one invocation of its template's shared function. Each template contributes
//! its function once, however many instances the page holds.

use std::sync::LazyLock;

use indexmap::IndexMap;
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;
use tessera_markup::{Arena, Element, NodeKind};

use crate::traits::ClientModule;
use crate::value::{values_to_json, Values};

/// Attribute carrying the index of a captured element reference.
pub const REF_ATTRIBUTE: &str = "data-tessera-ref";

static METHOD_SHORTHAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(async\s+)?script\s*\(").expect("valid regex"));

static CLOSING_SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(script)").expect("valid regex"));

/// One instance with a client behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientInstance {
    pub context_id: String,
    pub template_id: String,

    /// Source of the behavior function
    pub source: String,

    /// Values the behavior source refers to
    pub values: Values,

    /// Ref name to CSS selector
    pub refs: Vec<(String, String)>,
}

/// An assembled page script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub source: String,

    /// Whether the script has to be loaded as a module
    pub module: bool,
}

/// Assemble the page script. `None` when there is nothing to run.
pub fn bundle(instances: &[ClientInstance], modules: &[ClientModule], minify: bool) -> Option<Bundle> {
    let helpers: Vec<&str> = modules
        .iter()
        .map(|m| m.helpers.trim())
        .filter(|h| !h.is_empty())
        .collect();
    let mut imports: Vec<&str> = Vec::new();
    for import in modules.iter().flat_map(|m| &m.imports) {
        if !imports.contains(&import.as_str()) {
            imports.push(import);
        }
    }

    if instances.is_empty() && helpers.is_empty() && imports.is_empty() {
        return None;
    }

    let mut definitions: IndexMap<&str, String> = IndexMap::new();
    for instance in instances {
        definitions
            .entry(instance.template_id.as_str())
            .or_insert_with(|| function_expression(&instance.source));
    }

    let mut source = String::new();
    for import in &imports {
        source.push_str(&format!("import {};\n", js_string(import)));
    }
    source.push_str("(() => {\n");
    for helper in &helpers {
        source.push_str(helper);
        source.push('\n');
    }
    source.push_str("const definitions = {};\n");
    for (id, function) in &definitions {
        source.push_str(&format!("definitions[{}] = ({});\n", js_string(id), function));
    }
    for instance in instances {
        source.push_str(&invocation(instance));
    }
    source.push_str("})();\n");

    let source = if minify {
        match minify_source(&source) {
            Ok(minified) => minified,
            Err(reason) => {
                tracing::warn!("Client script minification failed, emitting unminified: {}", reason);
                source
            }
        }
    } else {
        source
    };
    // Codegen may print escaped literals back in their raw form.
    let source = CLOSING_SCRIPT.replace_all(&source, "<\\/$1").into_owned();

    Some(Bundle {
        source,
        module: !imports.is_empty(),
    })
}

/// Turn a method shorthand into a function expression.
fn function_expression(source: &str) -> String {
    let source = source.trim();
    METHOD_SHORTHAND
        .replace(source, "${1}function script(")
        .into_owned()
}

fn invocation(instance: &ClientInstance) -> String {
    let values = safe_json(&values_to_json(&instance.values).to_string());
    let refs: Vec<String> = instance
        .refs
        .iter()
        .map(|(name, selector)| {
            format!(
                "{}: document.querySelector({})",
                js_string(name),
                js_string(selector)
            )
        })
        .collect();

    format!(
        "definitions[{}]({{ values: {}, refs: {{ {} }} }});\n",
        js_string(&instance.template_id),
        values,
        refs.join(", ")
    )
}

fn js_string(text: &str) -> String {
    safe_json(&serde_json::Value::String(text.to_string()).to_string())
}

/// Keep JSON from closing the surrounding script element.
fn safe_json(json: &str) -> String {
    json.replace("</", "<\\/")
}

/// Minify and mangle a script.
pub fn minify_source(source: &str) -> Result<String, String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        let messages: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
        return Err(messages.join("; "));
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);

    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            ..CodegenOptions::default()
        })
        .with_scoping(minified.scoping)
        .build(&program)
        .code;
    Ok(code)
}

/// Insert the bundle as the last child of `<body>`, or of the root when the
/// page has no body.
pub fn inject(arena: &mut Arena, bundle: &Bundle) {
    let root = arena.root();
    let target = arena.find_element(root, "body").unwrap_or(root);

    let mut element = Element::new("script");
    if bundle.module {
        element.set_attr("type", "module");
    }
    let script = arena.alloc(NodeKind::Element(element));
    let text = arena.alloc(NodeKind::Text(bundle.source.clone()));
    arena.append(script, text);
    arena.append(target, script);
}
