//! Recursive component expansion.
//!
//! A [`PageCompiler`] owns one page's working tree. Every custom element is
//! replaced by a fresh instance of its template: tokens are substituted from
//! the instance values, nested custom elements are expanded depth-first and
//! `<slot>` sites are filled with the caller's content or their defaults.

use std::collections::HashMap;
use std::path::Path;

use serde_json::json;
use tessera_markup::{
    decode_entities, escape_attribute, escape_text, parse, Arena, Element, NodeId, NodeKind,
    ParseOptions, Sites, Token, DEFAULT_SLOT,
};

use crate::bundler::{bundle, inject, ClientInstance, REF_ATTRIBUTE};
use crate::module::{Module, Page};
use crate::sandbox::{Sandbox, ScriptRequest};
use crate::traits::{CompileError, CompileOptions, ModuleSource, SandboxError};
use crate::value::{camel_case, values_from_json, values_to_json, Value, Values};

/// Nesting depth at which expansion is assumed to be self-recursive.
pub const MAX_DEPTH: usize = 64;

/// Elements whose text is emitted verbatim and therefore never escaped.
const RAW_TEXT_PARENTS: &[&str] = &["script", "style"];

/// Compile a page into HTML.
pub fn compile_page<S: ModuleSource + ?Sized>(
    source: &S,
    path: &str,
    page: &Page,
    options: &CompileOptions,
) -> Result<String, CompileError> {
    let mut compiler = PageCompiler::new(source, path, page, options);
    compiler.expand_page()?;
    Ok(compiler.finish())
}

/// Script results of one instance.
#[derive(Debug, Clone)]
struct Computed {
    values: Values,
    client: Option<String>,
}

/// Expansion state of one page.
pub struct PageCompiler<'a, S: ModuleSource + ?Sized> {
    source: &'a S,
    options: &'a CompileOptions,
    sandbox: Sandbox,
    path: String,
    document: Values,
    arena: Arena,
    cache: HashMap<String, Computed>,
    instances: Vec<ClientInstance>,
    rich_attributes: HashMap<NodeId, Values>,
    registries: Option<(Vec<String>, Vec<String>)>,
    next_ref: usize,
}

impl<'a, S: ModuleSource + ?Sized> PageCompiler<'a, S> {
    pub fn new(source: &'a S, path: &str, page: &Page, options: &'a CompileOptions) -> Self {
        Self {
            source,
            options,
            sandbox: Sandbox::new(options),
            path: path.to_string(),
            document: page.values(),
            arena: page.document.arena.clone(),
            cache: HashMap::new(),
            instances: Vec::new(),
            rich_attributes: HashMap::new(),
            registries: None,
            next_ref: 0,
        }
    }

    /// Working tree of the page.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Instances that registered a client behavior so far.
    pub fn instances(&self) -> &[ClientInstance] {
        &self.instances
    }

    /// Expand every custom element of the page.
    pub fn expand_page(&mut self) -> Result<(), CompileError> {
        let root = self.arena.root();
        let context = self.path.clone();
        self.expand_within(root, &context, 0)
    }

    /// Bundle client behaviors into the tree and serialize it.
    pub fn finish(mut self) -> String {
        if let Some(script) = bundle(
            &self.instances,
            &self.options.client_modules,
            self.options.minify,
        ) {
            inject(&mut self.arena, &script);
        }
        self.arena.to_html(self.arena.root())
    }

    /// Instantiate the template `id`.
    ///
    /// Returns the detached expansion root, or `None` when no template has
    /// that id. A `host` element has its attributes merged into the values and
    /// its children distributed over the template's slots.
    pub fn create_component(
        &mut self,
        id: &str,
        context: &str,
        host: Option<NodeId>,
        extra: Values,
        depth: usize,
    ) -> Result<Option<NodeId>, CompileError> {
        let source = self.source;
        let Some(module) = source.module(id) else {
            tracing::warn!("Unknown component <{}> in {}", id, self.path);
            return Ok(None);
        };
        if depth >= MAX_DEPTH {
            return Err(CompileError::RecursionLimit {
                template: id.to_string(),
                page: self.path.clone(),
            });
        }

        let mut values = self.document.clone();
        let mut supplied: HashMap<String, Vec<NodeId>> = HashMap::new();
        if let Some(host) = host {
            self.merge_host_attributes(host, &mut values);
            supplied = self.partition_slots(host);
        }
        values.extend(extra);

        let (fragment, sites) = module.instantiate(&mut self.arena);

        let client = match &module.script {
            Some(script) => {
                let computed = self.evaluate(module, script, context, &values)?;
                values.extend(computed.values);
                computed.client
            }
            None => None,
        };

        self.substitute_tokens(&sites, &values, context, depth)?;
        let refs = self.capture_refs(&sites, client.is_some());

        if let Some(source) = client {
            self.register_instance(context, module, source, &values, refs);
        }

        self.expand_within(fragment, context, depth + 1)?;
        self.fill_slots(fragment, &sites, supplied, context, depth + 1)?;

        Ok(Some(fragment))
    }

    /// Expand the custom elements directly owned by `scope`: those not nested
    /// in another custom element or in a `<slot>`.
    fn expand_within(&mut self, scope: NodeId, context: &str, depth: usize) -> Result<(), CompileError> {
        let hosts: Vec<(NodeId, String)> = self
            .arena
            .descendants(scope)
            .into_iter()
            .filter(|&node| node != scope && self.is_owned_host(node, scope))
            .map(|node| {
                let index = self.arena.index_in_parent(node).unwrap_or(0);
                let name = self
                    .arena
                    .element(node)
                    .map(|el| el.name.clone())
                    .unwrap_or_default();
                (node, format!("{context}/{index}:{name}"))
            })
            .collect();

        for (host, context) in hosts {
            self.expand_host(host, &context, depth)?;
        }
        Ok(())
    }

    fn is_owned_host(&self, node: NodeId, scope: NodeId) -> bool {
        let Some(el) = self.arena.element(node) else {
            return false;
        };
        el.custom
            && !self.arena.has_ancestor_until(node, scope, |kind| match kind {
                NodeKind::Element(el) => el.custom || el.name == "slot",
                _ => false,
            })
    }

    /// Replace a custom element with its expansion.
    fn expand_host(&mut self, host: NodeId, context: &str, depth: usize) -> Result<(), CompileError> {
        let Some(name) = self.arena.element(host).map(|el| el.name.clone()) else {
            return Ok(());
        };

        match self.create_component(&name, context, Some(host), Values::new(), depth)? {
            Some(fragment) => {
                let children = self.arena.take_children(fragment);
                self.arena.replace_with(host, &children);
            }
            None => self.expand_within(host, context, depth + 1)?,
        }
        Ok(())
    }

    fn merge_host_attributes(&mut self, host: NodeId, values: &mut Values) {
        let mut attributes: Vec<(String, Value)> = self
            .arena
            .element(host)
            .map(|el| {
                el.attrs
                    .iter()
                    .map(|attr| {
                        let text = decode_entities(attr.value.as_deref().unwrap_or_default());
                        (attr.name.clone(), Value::Text(text))
                    })
                    .collect()
            })
            .unwrap_or_default();
        if let Some(rich) = self.rich_attributes.remove(&host) {
            attributes.extend(rich);
        }

        for (name, value) in attributes {
            if name.contains('-') {
                values.insert(camel_case(&name), value.clone());
            }
            values.insert(name, value);
        }
    }

    /// Detach the host's children and group them by target slot, consuming
    /// `slot` attributes.
    fn partition_slots(&mut self, host: NodeId) -> HashMap<String, Vec<NodeId>> {
        let mut slots: HashMap<String, Vec<NodeId>> = HashMap::new();
        for child in self.arena.take_children(host) {
            let name = self
                .arena
                .element_mut(child)
                .and_then(|el| el.remove_attr("slot"))
                .and_then(|attr| attr.value)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_SLOT.to_string());
            slots.entry(name).or_default().push(child);
        }
        slots
    }

    fn evaluate(
        &mut self,
        module: &Module,
        script: &str,
        context: &str,
        values: &Values,
    ) -> Result<Computed, CompileError> {
        if let Some(cached) = self.cache.get(context) {
            return Ok(cached.clone());
        }

        let (templates, pages) = self.registries();
        let script_path = module.script_path();
        let request = ScriptRequest {
            path: Path::new(&script_path),
            source: script,
            values: values_to_json(values),
            page: json!({ "path": self.path, "values": values_to_json(&self.document) }),
            templates,
            pages,
        };

        let output = self.sandbox.evaluate(&request).map_err(|error| match error {
            SandboxError::MissingDefaultExport => CompileError::MissingDefaultExport {
                template: module.id.clone(),
            },
            source => CompileError::Sandbox {
                template: module.id.clone(),
                source,
            },
        })?;

        let computed = Computed {
            values: values_from_json(&output.values)?,
            client: output.client,
        };
        tracing::debug!("evaluated <{}> for {}", module.id, context);
        self.cache.insert(context.to_string(), computed.clone());
        Ok(computed)
    }

    fn registries(&mut self) -> (Vec<String>, Vec<String>) {
        let source = self.source;
        self.registries
            .get_or_insert_with(|| (source.template_ids(), source.page_paths()))
            .clone()
    }

    fn substitute_tokens(
        &mut self,
        sites: &Sites,
        values: &Values,
        context: &str,
        depth: usize,
    ) -> Result<(), CompileError> {
        for site in &sites.attributes {
            self.substitute_attribute(site.node, &site.name, &site.tokens, values);
        }
        for (index, site) in sites.texts.iter().enumerate() {
            let context = format!("{context}/#{index}");
            self.substitute_text(site.node, &site.tokens, values, &context, depth)?;
        }
        Ok(())
    }

    fn substitute_attribute(&mut self, node: NodeId, name: &str, tokens: &[Token], values: &Values) {
        let Some(el) = self.arena.element(node) else {
            return;
        };
        let Some(mut text) = el.attr(name).map(str::to_string) else {
            return;
        };

        // A custom element attribute holding exactly one token keeps the
        // value itself for the nested instance.
        if el.custom {
            if let [token] = tokens {
                if text.trim() == token.raw {
                    if let Some(value) = values.get(&token.name).filter(|v| v.as_text().is_none()) {
                        self.rich_attributes
                            .entry(node)
                            .or_default()
                            .insert(name.to_string(), value.clone());
                    }
                }
            }
        }

        for token in tokens {
            if let Some(value) = values.get(&token.name) {
                text = text.replace(&token.raw, &escape_attribute(&value.to_plain_string()));
            }
        }
        if let Some(el) = self.arena.element_mut(node) {
            el.set_attr(name, text);
        }
    }

    fn substitute_text(
        &mut self,
        node: NodeId,
        tokens: &[Token],
        values: &Values,
        context: &str,
        depth: usize,
    ) -> Result<(), CompileError> {
        let Some(text) = self.arena.text(node).map(str::to_string) else {
            return Ok(());
        };
        let raw = self
            .arena
            .parent(node)
            .and_then(|p| self.arena.element(p))
            .is_some_and(|el| RAW_TEXT_PARENTS.contains(&el.name.as_str()));

        let mut pieces: Vec<Piece<'_>> = Vec::new();
        let mut rest = text.as_str();
        for token in tokens {
            let Some(pos) = rest.find(&token.raw) else {
                continue;
            };
            pieces.push(Piece::Literal(rest[..pos].to_string()));
            match values.get(&token.name) {
                Some(value) => pieces.push(Piece::Value(value)),
                None => pieces.push(Piece::Literal(token.raw.clone())),
            }
            rest = &rest[pos + token.raw.len()..];
        }
        pieces.push(Piece::Literal(rest.to_string()));

        let literal_only = pieces.iter().all(|piece| match piece {
            Piece::Literal(_) => true,
            Piece::Value(value) => value.as_text().is_some() || raw,
        });

        if literal_only {
            let mut out = String::with_capacity(text.len());
            for piece in &pieces {
                match piece {
                    Piece::Literal(s) => out.push_str(s),
                    Piece::Value(value) if raw => out.push_str(&value.to_plain_string()),
                    Piece::Value(value) => out.push_str(&escape_text(&value.to_plain_string())),
                }
            }
            *self.arena.kind_mut(node) = NodeKind::Text(out);
            return Ok(());
        }

        let mut nodes = Vec::new();
        for (index, piece) in pieces.into_iter().enumerate() {
            match piece {
                Piece::Literal(s) if s.is_empty() => {}
                Piece::Literal(s) => nodes.push(self.arena.alloc(NodeKind::Text(s))),
                Piece::Value(value) => {
                    let context = format!("{context}.{index}");
                    self.materialize(value, &context, depth, &mut nodes)?;
                }
            }
        }
        self.arena.replace_with(node, &nodes);
        Ok(())
    }

    /// Allocate the nodes a value stands for.
    fn materialize(
        &mut self,
        value: &Value,
        context: &str,
        depth: usize,
        out: &mut Vec<NodeId>,
    ) -> Result<(), CompileError> {
        match value {
            Value::Text(text) => out.push(self.arena.alloc(NodeKind::Text(escape_text(text)))),
            Value::Markup(markup) => {
                let parsed = parse(markup, &ParseOptions::page(&[])).map_err(|source| {
                    CompileError::Markup {
                        context: context.to_string(),
                        source,
                    }
                })?;
                for &child in parsed.arena.children(parsed.arena.root()) {
                    let (copy, _) = parsed.arena.copy_into(child, &mut self.arena);
                    out.push(copy);
                }
            }
            Value::Component { id, values } => {
                let context = format!("{context}:{id}");
                match self.create_component(id, &context, None, values.clone(), depth + 1)? {
                    Some(fragment) => out.extend(self.arena.take_children(fragment)),
                    None => out.push(self.arena.alloc(NodeKind::Element(Element::new(id.as_str())))),
                }
            }
            Value::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.materialize(item, &format!("{context}[{index}]"), depth, out)?;
                }
            }
        }
        Ok(())
    }

    /// Strip `ref` attributes, tagging the elements for the client script
    /// when the instance has a behavior.
    fn capture_refs(&mut self, sites: &Sites, client: bool) -> Vec<(String, String)> {
        let mut refs = Vec::new();
        for &node in &sites.refs {
            let Some(el) = self.arena.element_mut(node) else {
                continue;
            };
            let Some(name) = el.remove_attr("ref").and_then(|attr| attr.value) else {
                continue;
            };
            if !client || name.is_empty() {
                continue;
            }
            let index = self.next_ref;
            self.next_ref += 1;
            el.set_attr(REF_ATTRIBUTE, index.to_string());
            refs.push((name, format!("[{REF_ATTRIBUTE}=\"{index}\"]")));
        }
        refs
    }

    fn register_instance(
        &mut self,
        context: &str,
        module: &Module,
        source: String,
        values: &Values,
        refs: Vec<(String, String)>,
    ) {
        if self.instances.iter().any(|i| i.context_id == context) {
            return;
        }
        let referenced = values
            .iter()
            .filter(|(key, _)| references(&source, key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        self.instances.push(ClientInstance {
            context_id: context.to_string(),
            template_id: module.id.clone(),
            source,
            values: referenced,
            refs,
        });
    }

    /// Replace every `<slot>` still inside the instance with the supplied
    /// content for its name, or with its own children otherwise.
    fn fill_slots(
        &mut self,
        fragment: NodeId,
        sites: &Sites,
        mut supplied: HashMap<String, Vec<NodeId>>,
        context: &str,
        depth: usize,
    ) -> Result<(), CompileError> {
        for (name, &slot) in &sites.slots {
            if !self.is_inside(slot, fragment) {
                continue;
            }

            let content = supplied
                .remove(name)
                .filter(|nodes| nodes.iter().any(|&n| !self.arena.is_blank_text(n)));

            let holder = self.arena.alloc_fragment();
            match content {
                Some(nodes) => {
                    for node in nodes {
                        self.arena.append(holder, node);
                    }
                }
                None => {
                    for node in self.arena.take_children(slot) {
                        self.arena.append(holder, node);
                    }
                }
            }

            self.expand_within(holder, &format!("{context}/slot:{name}"), depth)?;
            let children = self.arena.take_children(holder);
            self.arena.replace_with(slot, &children);
        }

        for (name, nodes) in supplied {
            if nodes.iter().any(|&n| !self.arena.is_blank_text(n)) {
                tracing::debug!("{}: no <slot name=\"{}\"> for supplied content", context, name);
            }
        }
        Ok(())
    }

    fn is_inside(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.arena.parent(node);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.arena.parent(parent);
        }
        false
    }
}

enum Piece<'v> {
    Literal(String),
    Value(&'v Value),
}

/// Whether `source` mentions `key` as a whole word.
fn references(source: &str, key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    source.match_indices(key).any(|(start, _)| {
        let before = source[..start].chars().next_back();
        let after = source[start + key.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{page_collection, template_collection, Library, ModuleOptions, PageOptions};
    use pretty_assertions::assert_eq;
    use tessera_collection::{Collection, FileRecord};

    struct Site {
        templates: Collection<Module>,
        pages: Collection<Page>,
    }

    impl Site {
        fn new(templates: &[(&str, &str)]) -> Self {
            let mut store = template_collection(ModuleOptions {
                root: "/site/templates".into(),
                ignore: Vec::new(),
            });
            for (path, content) in templates {
                store.set(FileRecord::new(path, *content)).unwrap();
            }
            Self {
                templates: store,
                pages: page_collection(PageOptions::default()),
            }
        }

        fn compile(&mut self, path: &str, content: &str) -> Result<String, CompileError> {
            self.compile_with(path, content, &CompileOptions {
                minify: false,
                ..CompileOptions::default()
            })
        }

        fn compile_with(
            &mut self,
            path: &str,
            content: &str,
            options: &CompileOptions,
        ) -> Result<String, CompileError> {
            self.pages.set(FileRecord::new(path, content)).unwrap();
            let library = Library {
                templates: &self.templates,
                pages: &self.pages,
            };
            let page = &self.pages.get(path).unwrap().result;
            compile_page(&library, path, page, options)
        }
    }

    #[test]
    fn greets_by_name() {
        let mut site = Site::new(&[(
            "greeting.html",
            r#"<template id="hello-greeting">Hello {{name}}!</template>"#,
        )]);

        let html = site
            .compile("index.html", r#"<body><hello-greeting name="Ada"></hello-greeting></body>"#)
            .unwrap();

        assert_eq!(html, "<body>Hello Ada!</body>");
    }

    #[test]
    fn substitutes_attributes_and_keeps_unknown_tokens() {
        let mut site = Site::new(&[(
            "link.html",
            r#"<template id="nav-link"><a href="/{{ slug }}/" class="x {{ missing }}">{{ label }}</a></template>"#,
        )]);

        let html = site
            .compile(
                "index.html",
                r#"<nav-link slug="docs" label="Docs &amp; more"></nav-link>"#,
            )
            .unwrap();

        assert_eq!(
            html,
            r#"<a href="/docs/" class="x {{ missing }}">Docs &amp; more</a>"#
        );
    }

    #[test]
    fn escapes_text_values() {
        let mut site = Site::new(&[(
            "t.html",
            r#"<template id="x-text"><p>{{ body }}</p></template>"#,
        )]);

        let html = site
            .compile("index.html", r#"<x-text body="<b>bold</b>"></x-text>"#)
            .unwrap();

        assert_eq!(html, "<p>&lt;b&gt;bold&lt;/b&gt;</p>");
    }

    #[test]
    fn camel_case_aliases_reach_tokens() {
        let mut site = Site::new(&[(
            "u.html",
            r#"<template id="user-card">{{ userName }}/{{ user-name }}</template>"#,
        )]);

        let html = site
            .compile("index.html", r#"<user-card user-name="ada"></user-card>"#)
            .unwrap();

        assert_eq!(html, "ada/ada");
    }

    #[test]
    fn slot_fallback_and_override() {
        let mut site = Site::new(&[(
            "card.html",
            r#"<template id="x-card"><header><slot name="title">Untitled</slot></header><main><slot>Nothing here</slot></main><footer><slot name="foot">Footer</slot></footer></template>"#,
        )]);

        let fallback = site.compile("a.html", "<x-card></x-card>").unwrap();
        assert_eq!(
            fallback,
            "<header>Untitled</header><main>Nothing here</main><footer>Footer</footer>"
        );

        let overridden = site
            .compile(
                "b.html",
                r#"<x-card><h1 slot="title">Hi</h1>
  <p>Body</p></x-card>"#,
            )
            .unwrap();
        assert_eq!(
            overridden,
            "<header><h1>Hi</h1></header><main>\n  <p>Body</p></main><footer>Footer</footer>"
        );
    }

    #[test]
    fn whitespace_only_content_uses_the_default() {
        let mut site = Site::new(&[(
            "card.html",
            r#"<template id="x-card"><slot>Default</slot></template>"#,
        )]);

        let html = site.compile("a.html", "<x-card>\n   \n</x-card>").unwrap();
        assert_eq!(html, "Default");
    }

    #[test]
    fn nested_components_and_slotted_components_expand() {
        let mut site = Site::new(&[
            (
                "layout.html",
                r#"<template id="site-layout"><div class="layout"><site-nav current="{{ page }}"></site-nav><slot></slot></div></template>"#,
            ),
            (
                "nav.html",
                r#"<template id="site-nav"><nav>{{ current }}</nav></template>"#,
            ),
            (
                "badge.html",
                r#"<template id="x-badge"><span class="badge"><slot></slot></span></template>"#,
            ),
        ]);

        let html = site
            .compile(
                "index.html",
                r#"<site-layout page="home"><x-badge>new</x-badge></site-layout>"#,
            )
            .unwrap();

        assert_eq!(
            html,
            r#"<div class="layout"><nav>home</nav><span class="badge">new</span></div>"#
        );
    }

    #[test]
    fn slot_defaults_expand_their_components_only_when_used() {
        let mut site = Site::new(&[
            (
                "frame.html",
                r#"<template id="x-frame"><slot><x-empty></x-empty></slot></template>"#,
            ),
            (
                "empty.html",
                r#"<template id="x-empty"><em>empty</em></template>"#,
            ),
        ]);

        assert_eq!(site.compile("a.html", "<x-frame></x-frame>").unwrap(), "<em>empty</em>");
        assert_eq!(
            site.compile("b.html", "<x-frame><b>full</b></x-frame>").unwrap(),
            "<b>full</b>"
        );
    }

    #[test]
    fn slots_pass_through_nested_components() {
        let mut site = Site::new(&[
            (
                "outer.html",
                r#"<template id="x-outer"><x-inner><slot></slot></x-inner></template>"#,
            ),
            (
                "inner.html",
                r#"<template id="x-inner"><section><slot>inner default</slot></section></template>"#,
            ),
        ]);

        let html = site.compile("a.html", "<x-outer><p>hi</p></x-outer>").unwrap();
        assert_eq!(html, "<section><p>hi</p></section>");
    }

    #[test]
    fn unknown_components_are_kept_with_expanded_content() {
        let mut site = Site::new(&[(
            "b.html",
            r#"<template id="x-bold"><b>{{ t }}</b></template>"#,
        )]);

        let html = site
            .compile("a.html", r#"<my-widget id="w"><x-bold t="x"></x-bold></my-widget>"#)
            .unwrap();

        assert_eq!(html, r#"<my-widget id="w"><b>x</b></my-widget>"#);
    }

    #[test]
    fn script_values_are_merged() {
        let mut site = Site::new(&[(
            "price.html",
            r#"<template id="x-price"><span>{{ formatted }}</span></template>
<script type="module">
export default {
  formatted: ({ amount }) => `$${Number(amount).toFixed(2)}`,
};
</script>"#,
        )]);

        let html = site
            .compile("a.html", r#"<x-price amount="3"></x-price>"#)
            .unwrap();
        assert_eq!(html, "<span>$3.00</span>");
    }

    #[test]
    fn sibling_instances_keep_their_own_values() {
        let mut site = Site::new(&[(
            "echo.html",
            r#"<template id="x-echo"><i>{{ doubled }}</i></template>
<script type="module">
export default { doubled: ({ word }) => word + word };
</script>"#,
        )]);

        let html = site
            .compile(
                "a.html",
                r#"<x-echo word="a"></x-echo><x-echo word="b"></x-echo>"#,
            )
            .unwrap();
        assert_eq!(html, "<i>aa</i><i>bb</i>");
    }

    #[test]
    fn markup_and_component_values_are_spliced() {
        let mut site = Site::new(&[
            (
                "list.html",
                r#"<template id="x-list"><ul>{{ items }}</ul><p>before {{ note }} after</p></template>
<script type="module">
import { html, createComponent } from 'tessera';
export default {
  items: ({ names }) => names.split(',').map((name) => createComponent('x-item', { name })),
  note: html('<em>note</em>'),
};
</script>"#,
            ),
            (
                "item.html",
                r#"<template id="x-item"><li>{{ name }}</li></template>"#,
            ),
        ]);

        let html = site
            .compile("a.html", r#"<x-list names="a,b"></x-list>"#)
            .unwrap();
        assert_eq!(
            html,
            "<ul><li>a</li><li>b</li></ul><p>before <em>note</em> after</p>"
        );
    }

    #[test]
    fn document_values_reach_templates() {
        let mut site = Site::new(&[(
            "title.html",
            r#"<template id="page-title"><h1>{{ title }}</h1></template>"#,
        )]);

        let html = site
            .compile("post.md", "---\ntitle: Welcome\n---\n<page-title></page-title>\n")
            .unwrap();
        assert!(html.contains("<h1>Welcome</h1>"), "{html}");
    }

    #[test]
    fn missing_default_export_aborts() {
        let mut site = Site::new(&[(
            "a.html",
            r#"<template id="x-a">a</template><script type="module">export const x = 1;</script>"#,
        )]);

        let err = site.compile("a.html", "<x-a></x-a>").unwrap_err();
        assert!(matches!(err, CompileError::MissingDefaultExport { ref template } if template == "x-a"));
    }

    #[test]
    fn object_values_are_rejected() {
        let mut site = Site::new(&[(
            "a.html",
            r#"<template id="x-a">{{ bad }}</template><script type="module">export default { bad: { a: 1 } };</script>"#,
        )]);

        let err = site.compile("a.html", "<x-a></x-a>").unwrap_err();
        assert!(matches!(err, CompileError::InvalidValue { ref key, .. } if key == "bad"));
    }

    #[test]
    fn self_recursion_is_bounded() {
        let mut site = Site::new(&[(
            "loop.html",
            r#"<template id="x-loop"><x-loop></x-loop></template>"#,
        )]);

        let err = site.compile("a.html", "<x-loop></x-loop>").unwrap_err();
        assert!(matches!(err, CompileError::RecursionLimit { .. }));
    }

    #[test]
    fn client_behaviors_are_bundled_once_per_template() {
        let mut site = Site::new(&[(
            "counter.html",
            r#"<template id="x-counter"><button ref="button">{{ label }}</button><span ref="out"></span></template>
<script type="module">
export default {
  script({ values, refs }) {
    refs.button.addEventListener('click', () => { refs.out.textContent = values.label; });
  },
};
</script>"#,
        )]);

        let html = site
            .compile(
                "a.html",
                r#"<body><x-counter label="one"></x-counter><x-counter label="two"></x-counter></body>"#,
            )
            .unwrap();

        assert!(html.contains(r#"<button data-tessera-ref="0">one</button>"#), "{html}");
        assert!(html.contains(r#"<span data-tessera-ref="3"></span>"#), "{html}");
        assert_eq!(html.matches("function script(").count(), 1);
        assert_eq!(html.matches("definitions[\"x-counter\"]({").count(), 2);
        assert!(html.contains(r#"{"label":"two"}"#));
        assert!(!html.contains(" ref="));
        assert!(html.ends_with("})();\n</script></body>"));
    }

    #[test]
    fn refs_without_behavior_are_stripped() {
        let mut site = Site::new(&[(
            "a.html",
            r#"<template id="x-a"><p ref="para">x</p></template>"#,
        )]);

        let html = site.compile("a.html", "<x-a></x-a>").unwrap();
        assert_eq!(html, "<p>x</p>");
    }

    #[test]
    fn rich_values_pass_through_custom_element_attributes() {
        let mut site = Site::new(&[
            (
                "outer.html",
                r#"<template id="x-outer"><x-inner content="{{ body }}"></x-inner></template>
<script type="module">
import { html } from 'tessera';
export default { body: html('<strong>rich</strong>') };
</script>"#,
            ),
            (
                "inner.html",
                r#"<template id="x-inner"><div>{{ content }}</div></template>"#,
            ),
        ]);

        let html = site.compile("a.html", "<x-outer></x-outer>").unwrap();
        assert_eq!(html, "<div><strong>rich</strong></div>");
    }

    #[test]
    fn references_match_whole_words() {
        assert!(references("values.label", "label"));
        assert!(!references("values.labels", "label"));
        assert!(references("x['data-id']", "data-id"));
        assert!(references("a.labels + values.label", "label"));
        assert!(!references("$label + label_2", "label"));
        assert!(!references("values.étiquette", "tiquette"));
        assert!(!references("anything", ""));
    }

    #[test]
    fn minified_page_script_closes_once() {
        let mut site = Site::new(&[(
            "note.html",
            r#"<template id="x-note"><div ref="out"></div></template>
<script type="module">
export default {
  script({ values, refs }) {
    refs.out.innerHTML = '<\/script><b>x</b>' + values.text;
  },
};
</script>"#,
        )]);

        let html = site
            .compile_with(
                "a.html",
                r#"<body><x-note text="</script><i>"></x-note></body>"#,
                &CompileOptions::default(),
            )
            .unwrap();

        assert_eq!(html.matches("</script>").count(), 1, "{html}");
        assert!(html.ends_with("</script></body>"), "{html}");
    }

    #[test]
    fn compiling_leaves_modules_pristine() {
        let mut site = Site::new(&[(
            "g.html",
            r#"<template id="x-g">{{ n }}</template>"#,
        )]);

        site.compile("a.html", r#"<x-g n="1"></x-g>"#).unwrap();
        let module = &site.templates.get("x-g").unwrap().result;
        assert_eq!(module.template.inner_html(module.template.root()), "{{ n }}");
        assert_eq!(site.compile("b.html", r#"<x-g n="2"></x-g>"#).unwrap(), "2");
    }
}
