//! Site tagging: custom elements, tokens, refs and slots.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::node::{Arena, NodeId, NodeKind};
use crate::parser::{MarkupError, ParseMode};

/// Name of the slot used when a `<slot>` has no `name` attribute.
pub const DEFAULT_SLOT: &str = "default";

/// A `{{ … }}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Trimmed inner text, used as the values key
    pub name: String,

    /// Full placeholder text including delimiters
    pub raw: String,
}

/// Extract tokens from text. Nested braces are kept inside the token verbatim.
pub fn tokens(text: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        let body = &rest[start + 2..];
        let mut depth = 1;
        let mut index = 0;
        let bytes = body.as_bytes();
        let mut end = None;

        while index < bytes.len() {
            if bytes[index..].starts_with(b"{{") {
                depth += 1;
                index += 2;
            } else if bytes[index..].starts_with(b"}}") {
                depth -= 1;
                if depth == 0 {
                    end = Some(index);
                    break;
                }
                index += 2;
            } else {
                index += 1;
            }
        }

        let Some(end) = end else {
            break;
        };

        let raw = &rest[start..start + 2 + end + 2];
        out.push(Token {
            name: body[..end].trim().to_string(),
            raw: raw.to_string(),
        });
        rest = &rest[start + 2 + end + 2..];
    }

    out
}

/// Tokens found in one attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSite {
    pub node: NodeId,
    pub name: String,
    pub tokens: Vec<Token>,
}

/// Tokens found in one text node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSite {
    pub node: NodeId,
    pub tokens: Vec<Token>,
}

/// Positions in a tree that expansion acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sites {
    pub attributes: Vec<AttributeSite>,
    pub texts: Vec<TextSite>,
    pub refs: Vec<NodeId>,
    pub custom_elements: Vec<NodeId>,
    pub slots: IndexMap<String, NodeId>,
}

impl Sites {
    /// Rewrite every site through an old-to-new id map. Sites whose node is not
    /// in the map are dropped.
    pub fn relink(&self, map: &HashMap<NodeId, NodeId>) -> Sites {
        Sites {
            attributes: self
                .attributes
                .iter()
                .filter_map(|site| {
                    Some(AttributeSite {
                        node: *map.get(&site.node)?,
                        name: site.name.clone(),
                        tokens: site.tokens.clone(),
                    })
                })
                .collect(),
            texts: self
                .texts
                .iter()
                .filter_map(|site| {
                    Some(TextSite {
                        node: *map.get(&site.node)?,
                        tokens: site.tokens.clone(),
                    })
                })
                .collect(),
            refs: self.refs.iter().filter_map(|n| map.get(n).copied()).collect(),
            custom_elements: self
                .custom_elements
                .iter()
                .filter_map(|n| map.get(n).copied())
                .collect(),
            slots: self
                .slots
                .iter()
                .filter_map(|(name, n)| Some((name.clone(), *map.get(n)?)))
                .collect(),
        }
    }

    /// Names of the custom elements used, deduplicated in first-use order.
    pub fn custom_element_names(&self, arena: &Arena) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for &node in &self.custom_elements {
            if let Some(el) = arena.element(node) {
                if !names.contains(&el.name) {
                    names.push(el.name.clone());
                }
            }
        }
        names
    }
}

/// Collect sites below `root` in document order.
pub fn tag(arena: &Arena, root: NodeId, mode: ParseMode) -> Result<Sites, MarkupError> {
    let mut sites = Sites::default();

    for node in arena.descendants(root) {
        match arena.kind(node) {
            NodeKind::Element(el) => {
                if el.custom {
                    sites.custom_elements.push(node);
                }
                if el.has_attr("ref") {
                    sites.refs.push(node);
                }
                if el.name == "slot" {
                    let name = el
                        .attr("name")
                        .filter(|n| !n.is_empty())
                        .unwrap_or(DEFAULT_SLOT)
                        .to_string();
                    if sites.slots.contains_key(&name) {
                        return Err(MarkupError::DuplicateSlot { name });
                    }
                    sites.slots.insert(name, node);
                }
                if mode == ParseMode::Template {
                    for attr in &el.attrs {
                        let Some(value) = &attr.value else {
                            continue;
                        };
                        let found = tokens(value);
                        if !found.is_empty() {
                            sites.attributes.push(AttributeSite {
                                node,
                                name: attr.name.clone(),
                                tokens: found,
                            });
                        }
                    }
                }
            }
            NodeKind::Text(text) if mode == ParseMode::Template => {
                let found = tokens(text);
                if !found.is_empty() {
                    sites.texts.push(TextSite {
                        node,
                        tokens: found,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, ParseOptions};
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_tokens() {
        let found = tokens("Hello {{ name }}, you are {{age}}!");
        assert_eq!(
            found,
            vec![
                Token {
                    name: "name".into(),
                    raw: "{{ name }}".into()
                },
                Token {
                    name: "age".into(),
                    raw: "{{age}}".into()
                },
            ]
        );
    }

    #[test]
    fn nested_tokens_are_not_evaluated() {
        let found = tokens("{{ outer {{ inner }} }} tail");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "outer {{ inner }}");
        assert_eq!(found[0].raw, "{{ outer {{ inner }} }}");
    }

    #[test]
    fn unterminated_token_is_ignored() {
        assert!(tokens("{{ open").is_empty());
        assert!(tokens("plain text").is_empty());
    }

    #[test]
    fn tags_template_sites() {
        let source = r#"<div class="card {{ tone }}" ref="root"><h2>{{ title }}</h2><x-icon></x-icon><slot></slot><slot name="footer">fallback</slot></div>"#;
        let doc = parse(source, &ParseOptions::template(&[])).unwrap();

        assert_eq!(doc.sites.attributes.len(), 1);
        assert_eq!(doc.sites.attributes[0].name, "class");
        assert_eq!(doc.sites.texts.len(), 1);
        assert_eq!(doc.sites.refs.len(), 1);
        assert_eq!(doc.sites.custom_elements.len(), 1);
        assert_eq!(
            doc.sites.slots.keys().collect::<Vec<_>>(),
            vec!["default", "footer"]
        );
    }

    #[test]
    fn pages_do_not_collect_tokens() {
        let doc = parse("<p>{{ title }}</p>", &ParseOptions::page(&[])).unwrap();
        assert!(doc.sites.texts.is_empty());
    }

    #[test]
    fn rejects_duplicate_slot_names() {
        let result = parse(
            "<slot name=\"a\"></slot><slot name=\"a\"></slot>",
            &ParseOptions::template(&[]),
        );
        assert!(matches!(result, Err(MarkupError::DuplicateSlot { name }) if name == "a"));
    }

    #[test]
    fn relink_follows_the_copy() {
        let doc = parse("<p>{{ a }}</p><x-y></x-y>", &ParseOptions::template(&[])).unwrap();
        let mut target = Arena::new();
        let (_, map) = doc.arena.copy_into(doc.arena.root(), &mut target);
        let relinked = doc.sites.relink(&map);

        let text = relinked.texts[0].node;
        assert_eq!(target.text(text), Some("{{ a }}"));
        assert_eq!(
            relinked.custom_element_names(&target),
            vec!["x-y".to_string()]
        );
    }
}
