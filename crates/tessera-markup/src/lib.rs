//! Markup parsing for tessera.
//!
//! This crate provides a streaming tokenizer that builds an arena-backed node
//! tree and tags the positions the compiler acts on: custom elements,
//! `{{ token }}` placeholders, `ref` attributes and `<slot>` elements.

pub mod frontmatter;
pub mod names;
pub mod node;
pub mod page;
pub mod parser;
pub mod tagger;
pub mod template;

pub use frontmatter::{Frontmatter, FrontmatterError};
pub use names::{is_custom_element, validate_template_id};
pub use node::{
    decode_entities, escape_attribute, escape_text, Arena, Attribute, Element, NodeId, NodeKind,
};
pub use page::{parse_page, PageFormat, PageSource};
pub use parser::{parse, IgnoreRule, MarkupError, ParseMode, ParseOptions, ParsedDocument};
pub use tagger::{tokens, AttributeSite, Sites, TextSite, Token, DEFAULT_SLOT};
pub use template::{parse_template, TemplateSource};
