//! File records supplied by the file enumeration collaborator.

use std::path::Path;

/// Path of a document relative to its source directory, always `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilePath {
    /// Full relative path, e.g. `blog/post.html`
    pub pathname: String,

    /// Directory part, `.` for top-level files
    pub dirname: String,

    /// File name part, e.g. `post.html`
    pub filename: String,
}

impl FilePath {
    pub fn new(pathname: impl AsRef<Path>) -> Self {
        let pathname = pathname
            .as_ref()
            .to_string_lossy()
            .replace('\\', "/")
            .trim_start_matches("./")
            .to_string();

        let (dirname, filename) = match pathname.rfind('/') {
            Some(i) => (pathname[..i].to_string(), pathname[i + 1..].to_string()),
            None => (".".to_string(), pathname.clone()),
        };

        Self {
            pathname,
            dirname,
            filename,
        }
    }

    /// Extension of the file name, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.filename.rsplit_once('.')?;
        (!stem.is_empty()).then_some(ext)
    }
}

/// Kind of document held by a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Page,
    Template,
}

/// Raw document content keyed by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: FilePath,
    pub content: String,
}

impl FileRecord {
    pub fn new(pathname: impl AsRef<Path>, content: impl Into<String>) -> Self {
        Self {
            path: FilePath::new(pathname),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_paths() {
        let path = FilePath::new("blog/2024/post.html");
        assert_eq!(path.dirname, "blog/2024");
        assert_eq!(path.filename, "post.html");
        assert_eq!(path.extension(), Some("html"));
    }

    #[test]
    fn top_level_files_use_dot_directory() {
        let path = FilePath::new("./index.md");
        assert_eq!(path.pathname, "index.md");
        assert_eq!(path.dirname, ".");
    }

    #[test]
    fn normalizes_separators() {
        let path = FilePath::new("a\\b\\c.html");
        assert_eq!(path.pathname, "a/b/c.html");
        assert_eq!(path.dirname, "a/b");
    }

    #[test]
    fn dotfiles_have_no_extension() {
        assert_eq!(FilePath::new(".hidden").extension(), None);
    }
}
