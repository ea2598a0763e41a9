//! Custom element name grammar.

use crate::parser::MarkupError;

/// Hyphenated names already taken by SVG and MathML.
pub const RESERVED_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// Upper bound on name length, keeps pathological input out of the indices.
pub const MAX_NAME_LEN: usize = 256;

pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// Whether `name` satisfies the custom element name grammar.
///
/// The name must start with a lowercase ASCII letter, contain a hyphen and
/// otherwise consist of lowercase ASCII letters, digits, `-`, `.`, `_` or
/// non-ASCII characters.
pub fn is_valid_custom_element_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN || !name.contains('-') {
        return false;
    }

    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_lowercase()) {
        return false;
    }

    chars.all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_') || !c.is_ascii()
    })
}

/// Whether an element with this tag name should be expanded as a component.
pub fn is_custom_element(name: &str) -> bool {
    is_valid_custom_element_name(name) && !is_reserved_name(name)
}

/// Validate a template id, rejecting reserved names and malformed names.
pub fn validate_template_id(id: &str) -> Result<(), MarkupError> {
    if is_reserved_name(id) {
        return Err(MarkupError::ReservedName(id.to_string()));
    }
    if !is_valid_custom_element_name(id) {
        return Err(MarkupError::InvalidTemplateId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_kebab_case_names() {
        assert!(is_valid_custom_element_name("my-card"));
        assert!(is_valid_custom_element_name("x-1"));
        assert!(is_valid_custom_element_name("math-α"));
        assert!(is_valid_custom_element_name("a.b-c_d"));
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(!is_valid_custom_element_name(""));
        assert!(!is_valid_custom_element_name("card"));
        assert!(!is_valid_custom_element_name("-card"));
        assert!(!is_valid_custom_element_name("1-card"));
        assert!(!is_valid_custom_element_name("My-card"));
        assert!(!is_valid_custom_element_name("my card-x"));
        assert!(!is_valid_custom_element_name(&format!("a-{}", "b".repeat(MAX_NAME_LEN))));
    }

    #[test]
    fn reserved_names_are_not_components() {
        assert!(is_valid_custom_element_name("font-face"));
        assert!(!is_custom_element("font-face"));
        assert!(is_custom_element("font-faces"));
    }

    #[test]
    fn validates_template_ids() {
        assert!(validate_template_id("site-header").is_ok());
        assert!(matches!(
            validate_template_id("missing-glyph"),
            Err(MarkupError::ReservedName(_))
        ));
        assert!(matches!(
            validate_template_id("header"),
            Err(MarkupError::InvalidTemplateId(_))
        ));
    }
}
