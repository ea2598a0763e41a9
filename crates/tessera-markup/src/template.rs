//! Template file parsing.
//!
//! A template file holds exactly one `<template id="…">` and optionally a
//! sibling `<script type="module">` carrying the component's behavior.

use crate::names::validate_template_id;
use crate::node::{Arena, NodeId};
use crate::parser::{build_tree, MarkupError, ParseMode, ParseOptions};
use crate::tagger::{tag, Sites};

/// A parsed template file.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    /// Declared template id
    pub id: String,

    /// Template content under the arena root
    pub arena: Arena,

    /// Sites within `arena`
    pub sites: Sites,

    /// Source of the sibling module script, if any
    pub script: Option<String>,
}

/// Parse a template file.
pub fn parse_template(source: &str, options: &ParseOptions) -> Result<TemplateSource, MarkupError> {
    let file = build_tree(source, &options.ignore);
    let top_level = file.children(file.root());

    let templates: Vec<NodeId> = top_level
        .iter()
        .copied()
        .filter(|&n| file.element(n).is_some_and(|el| el.name == "template"))
        .collect();

    let template = match templates.as_slice() {
        [] => return Err(MarkupError::MissingTemplate),
        [one] => *one,
        many => return Err(MarkupError::MultipleTemplates(many.len())),
    };

    let id = file
        .element(template)
        .and_then(|el| el.attr("id"))
        .unwrap_or_default()
        .to_string();
    validate_template_id(&id)?;

    let script = top_level
        .iter()
        .copied()
        .find(|&n| {
            file.element(n)
                .is_some_and(|el| el.name == "script" && el.attr("type") == Some("module"))
        })
        .map(|n| file.text_content(n));

    let mut arena = Arena::new();
    let root = arena.root();
    for &child in file.children(template) {
        let (copy, _) = file.copy_into(child, &mut arena);
        arena.append(root, copy);
    }

    let sites = tag(&arena, root, ParseMode::Template)?;

    Ok(TemplateSource {
        id,
        arena,
        sites,
        script,
    })
}
