//! Page document parsing.

use pulldown_cmark::{html, Options, Parser};

use crate::frontmatter::{extract_frontmatter, Frontmatter};
use crate::parser::{parse, MarkupError, ParseMode, ParseOptions, ParsedDocument};

/// Source format of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    Html,
    Markdown,
}

impl PageFormat {
    /// Detect the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "html" | "htm" => Some(Self::Html),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// A parsed page.
#[derive(Debug, Clone)]
pub struct PageSource {
    /// Frontmatter values (empty when the page has none)
    pub frontmatter: Frontmatter,

    /// Parsed page tree
    pub document: ParsedDocument,
}

/// Parse a page, extracting frontmatter and rendering Markdown first if needed.
pub fn parse_page(
    source: &str,
    format: PageFormat,
    options: &ParseOptions,
) -> Result<PageSource, MarkupError> {
    let (frontmatter, content) = extract_frontmatter(source)?;

    let markup = match format {
        PageFormat::Html => content.to_string(),
        PageFormat::Markdown => render_markdown(content),
    };

    let options = ParseOptions {
        mode: ParseMode::Page,
        ignore: options.ignore.clone(),
    };
    let document = parse(&markup, &options)?;

    Ok(PageSource {
        frontmatter: frontmatter.unwrap_or_default(),
        document,
    })
}

/// Render Markdown to HTML. Inline and block HTML, custom elements included,
/// pass through untouched.
pub fn render_markdown(content: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let parser = Parser::new_ext(content, options);

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    html_output
}
