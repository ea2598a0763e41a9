//! Streaming markup tokenizer and tree builder.

use serde::Deserialize;

use crate::frontmatter::FrontmatterError;
use crate::node::{is_void_element, Arena, Attribute, Element, NodeId, NodeKind};
use crate::tagger::{tag, Sites};

/// Elements whose content is taken verbatim up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Errors raised while parsing or validating markup.
#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    #[error("Invalid template id {0:?}: must be a lowercase custom element name containing a hyphen")]
    InvalidTemplateId(String),

    #[error("Template id {0:?} is a reserved element name")]
    ReservedName(String),

    #[error("Missing <template> element")]
    MissingTemplate,

    #[error("Expected exactly one <template> element, found {0}")]
    MultipleTemplates(usize),

    #[error("Duplicate slot name {name:?}")]
    DuplicateSlot { name: String },

    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] FrontmatterError),
}

/// Whether token sites are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Page,
    Template,
}

/// Flags elements that are removed from the tree once fully parsed.
///
/// A rule with both fields set matches only elements satisfying both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IgnoreRule {
    /// Element name to match
    #[serde(default)]
    pub tag: Option<String>,

    /// Attribute whose presence matches
    #[serde(default)]
    pub attribute: Option<String>,
}

impl IgnoreRule {
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            tag: Some(name.into()),
            attribute: None,
        }
    }

    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            tag: None,
            attribute: Some(name.into()),
        }
    }

    pub fn matches(&self, el: &Element) -> bool {
        if self.tag.is_none() && self.attribute.is_none() {
            return false;
        }
        let tag_ok = self.tag.as_deref().is_none_or(|t| t == el.name);
        let attr_ok = self.attribute.as_deref().is_none_or(|a| el.has_attr(a));
        tag_ok && attr_ok
    }
}

/// Options for a single parse call.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub mode: ParseMode,
    pub ignore: Vec<IgnoreRule>,
}

impl ParseOptions {
    pub fn template(ignore: &[IgnoreRule]) -> Self {
        Self {
            mode: ParseMode::Template,
            ignore: ignore.to_vec(),
        }
    }

    pub fn page(ignore: &[IgnoreRule]) -> Self {
        Self {
            mode: ParseMode::Page,
            ignore: ignore.to_vec(),
        }
    }
}

/// A parsed document together with its tagged sites.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub arena: Arena,
    pub sites: Sites,
}

/// Parse markup into a tagged document.
pub fn parse(source: &str, options: &ParseOptions) -> Result<ParsedDocument, MarkupError> {
    let arena = build_tree(source, &options.ignore);
    let sites = tag(&arena, arena.root(), options.mode)?;
    Ok(ParsedDocument { arena, sites })
}

/// Build the node tree without tagging.
pub fn build_tree(source: &str, ignore: &[IgnoreRule]) -> Arena {
    TreeBuilder::new(source, ignore).run()
}

struct TreeBuilder<'a> {
    src: &'a str,
    pos: usize,
    ignore: &'a [IgnoreRule],
    arena: Arena,
    stack: Vec<NodeId>,
}

impl<'a> TreeBuilder<'a> {
    fn new(src: &'a str, ignore: &'a [IgnoreRule]) -> Self {
        let arena = Arena::new();
        let root = arena.root();
        Self {
            src,
            pos: 0,
            ignore,
            arena,
            stack: vec![root],
        }
    }

    fn run(mut self) -> Arena {
        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];

            if rest.starts_with("<!--") {
                self.comment();
            } else if rest.starts_with("</") {
                self.end_tag();
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.directive();
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                self.start_tag();
            } else {
                self.text();
            }
        }

        while self.stack.len() > 1 {
            self.pop();
        }

        self.arena
    }

    fn current(&self) -> NodeId {
        *self.stack.last().unwrap_or(&self.arena.root())
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();
        if let Some(&last) = self.arena.children(parent).last() {
            if let NodeKind::Text(existing) = self.arena.kind_mut(last) {
                existing.push_str(text);
                return;
            }
        }
        let node = self.arena.alloc(NodeKind::Text(text.to_string()));
        self.arena.append(parent, node);
    }

    fn text(&mut self) {
        let rest = &self.src[self.pos..];
        // A lone '<' that does not open a tag is literal text.
        let skip = rest.chars().next().map_or(0, char::len_utf8);
        let end = rest[skip..]
            .find('<')
            .map(|i| i + skip)
            .unwrap_or(rest.len());
        self.push_text(&rest[..end]);
        self.pos += end;
    }

    fn comment(&mut self) {
        let body_start = self.pos + 4;
        let (body, next) = match self.src[body_start..].find("-->") {
            Some(i) => (&self.src[body_start..body_start + i], body_start + i + 3),
            None => (&self.src[body_start..], self.src.len()),
        };
        let node = self.arena.alloc(NodeKind::Comment(body.to_string()));
        let parent = self.current();
        self.arena.append(parent, node);
        self.pos = next;
    }

    fn directive(&mut self) {
        let body_start = self.pos + 2;
        let (body, next) = match self.src[body_start..].find('>') {
            Some(i) => (&self.src[body_start..body_start + i], body_start + i + 1),
            None => (&self.src[body_start..], self.src.len()),
        };
        let text = if self.src[self.pos..].starts_with("<?") {
            format!("?{}", body)
        } else {
            body.to_string()
        };
        let node = self.arena.alloc(NodeKind::Directive(text));
        let parent = self.current();
        self.arena.append(parent, node);
        self.pos = next;
    }

    fn end_tag(&mut self) {
        let start = self.pos + 2;
        let Some(close) = self.src[start..].find('>') else {
            self.push_text(&self.src[self.pos..]);
            self.pos = self.src.len();
            return;
        };
        let name = self.src[start..start + close].trim().to_ascii_lowercase();
        self.pos = start + close + 1;

        let matching = self
            .stack
            .iter()
            .rposition(|&id| self.arena.element(id).is_some_and(|el| el.name == name));

        // Unmatched end tags are dropped.
        if let Some(index) = matching.filter(|&i| i > 0) {
            while self.stack.len() > index {
                self.pop();
            }
        }
    }

    fn start_tag(&mut self) {
        let tag_start = self.pos;
        let mut cursor = self.pos + 1;
        let name_len = self.src[cursor..]
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .unwrap_or(self.src.len() - cursor);
        let name = self.src[cursor..cursor + name_len].to_ascii_lowercase();
        cursor += name_len;

        let mut element = Element::new(name);
        let mut self_closing = false;
        let mut closed = false;

        while cursor < self.src.len() {
            let rest = &self.src[cursor..];
            let trimmed = rest.trim_start();
            cursor += rest.len() - trimmed.len();

            if trimmed.is_empty() {
                break;
            }
            if trimmed.starts_with('>') {
                cursor += 1;
                closed = true;
                break;
            }
            if trimmed.starts_with("/>") {
                cursor += 2;
                self_closing = true;
                closed = true;
                break;
            }
            if trimmed.starts_with('/') {
                cursor += 1;
                continue;
            }

            let (attr, consumed) = parse_attribute(trimmed);
            cursor += consumed;
            if !element.has_attr(&attr.name) {
                element.attrs.push(attr);
            }
        }

        if !closed {
            // Unterminated tag: keep the remainder as text.
            self.push_text(&self.src[tag_start..]);
            self.pos = self.src.len();
            return;
        }
        self.pos = cursor;

        element.ignored = self.ignore.iter().any(|rule| rule.matches(&element));
        let name = element.name.clone();
        let node = self.arena.alloc(NodeKind::Element(element));
        let parent = self.current();
        self.arena.append(parent, node);
        self.stack.push(node);

        if self_closing || is_void_element(&name) {
            self.pop();
        } else if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            self.raw_text(&name);
        }
    }

    fn raw_text(&mut self, name: &str) {
        let rest = &self.src[self.pos..];
        let needle = format!("</{}", name);
        let end = find_ascii_case_insensitive(rest, &needle).unwrap_or(rest.len());
        self.push_text(&rest[..end]);
        self.pos += end;

        if self.pos < self.src.len() {
            let after = &self.src[self.pos..];
            self.pos += after.find('>').map(|i| i + 1).unwrap_or(after.len());
        }
        self.pop();
    }

    /// Close the innermost open element, excising it if an ignore rule matched.
    fn pop(&mut self) {
        let Some(node) = self.stack.pop() else {
            return;
        };
        if self.arena.element(node).is_some_and(|el| el.ignored) {
            self.arena.detach(node);
        }
    }
}

/// Parse one attribute at the start of `input`, returning it and the bytes consumed.
fn parse_attribute(input: &str) -> (Attribute, usize) {
    // The first character always belongs to the name so the cursor advances.
    let name_len = input
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c.is_whitespace() || c == '=' || c == '>' || c == '/')
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    let name = input[..name_len].to_ascii_lowercase();
    let mut cursor = name_len;

    let after_name = &input[cursor..];
    let trimmed = after_name.trim_start();
    if !trimmed.starts_with('=') {
        return (Attribute::new(name, None), cursor);
    }
    cursor += after_name.len() - trimmed.len() + 1;

    let rest = &input[cursor..];
    let value_input = rest.trim_start();
    cursor += rest.len() - value_input.len();

    let quote = value_input.chars().next();
    match quote {
        Some(q @ ('"' | '\'')) => {
            let body = &value_input[1..];
            match body.find(q) {
                Some(end) => (
                    Attribute::new(name, Some(body[..end].to_string())),
                    cursor + end + 2,
                ),
                None => (
                    Attribute::new(name, Some(body.to_string())),
                    cursor + value_input.len(),
                ),
            }
        }
        _ => {
            let end = value_input
                .find(|c: char| c.is_whitespace() || c == '>')
                .unwrap_or(value_input.len());
            (
                Attribute::new(name, Some(value_input[..end].to_string())),
                cursor + end,
            )
        }
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}
