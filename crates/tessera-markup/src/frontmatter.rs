//! Frontmatter extraction and parsing.

use indexmap::IndexMap;
use serde::Deserialize;

/// Document values declared in a page's YAML frontmatter, in declaration order.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Frontmatter {
    pub values: IndexMap<String, serde_yaml::Value>,
}

impl Frontmatter {
    pub fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Extract frontmatter from a document.
///
/// Returns the parsed frontmatter and the remaining content after the frontmatter block.
pub fn extract_frontmatter(source: &str) -> Result<(Option<Frontmatter>, &str), FrontmatterError> {
    let trimmed = source.trim_start();

    if !trimmed.starts_with("---") {
        return Ok((None, source));
    }

    // Find the closing ---
    let after_open = &trimmed[3..];
    let Some(close_pos) = after_open.find("\n---") else {
        return Err(FrontmatterError::Unclosed);
    };

    let yaml_content = after_open[..close_pos].trim();
    let remaining = &after_open[close_pos + 4..];

    let frontmatter: Frontmatter = if yaml_content.is_empty() {
        Frontmatter::default()
    } else {
        serde_yaml::from_str(yaml_content)
            .map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?
    };

    Ok((Some(frontmatter), remaining.trim_start()))
}

/// Errors that can occur when parsing frontmatter.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("Unclosed frontmatter block - missing closing ---")]
    Unclosed,

    #[error("Invalid YAML in frontmatter: {0}")]
    InvalidYaml(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_valid_frontmatter() {
        let source = r#"---
title: Home
tags: [a, b]
order: 1
---

<site-layout></site-layout>
"#;

        let (fm, content) = extract_frontmatter(source).unwrap();
        let fm = fm.unwrap();

        assert_eq!(fm.get("title").and_then(|v| v.as_str()), Some("Home"));
        assert_eq!(
            fm.values.keys().collect::<Vec<_>>(),
            vec!["title", "tags", "order"]
        );
        assert!(content.starts_with("<site-layout>"));
    }

    #[test]
    fn handles_no_frontmatter() {
        let source = "<p>No frontmatter here.</p>";

        let (fm, content) = extract_frontmatter(source).unwrap();

        assert!(fm.is_none());
        assert_eq!(content, source);
    }

    #[test]
    fn empty_block_yields_empty_values() {
        let (fm, content) = extract_frontmatter("---\n---\nbody").unwrap();
        assert!(fm.unwrap().is_empty());
        assert_eq!(content, "body");
    }

    #[test]
    fn errors_on_unclosed_frontmatter() {
        let source = "---\ntitle: Test\n<p>No closing</p>";

        let result = extract_frontmatter(source);

        assert!(matches!(result, Err(FrontmatterError::Unclosed)));
    }

    #[test]
    fn errors_on_invalid_yaml() {
        let source = "---\ntitle: [invalid yaml\n---\n";

        let result = extract_frontmatter(source);

        assert!(matches!(result, Err(FrontmatterError::InvalidYaml(_))));
    }
}
