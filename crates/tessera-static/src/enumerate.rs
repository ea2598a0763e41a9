//! Source file enumeration.

use std::fs;
use std::path::Path;

use tessera_collection::FileRecord;
use walkdir::{DirEntry, WalkDir};

use crate::error::SiteError;

/// Read every file below `dir` with one of `extensions`.
///
/// Records are keyed by their `/`-separated path relative to `dir` and come
/// back sorted by that path. Hidden entries and entries with a path segment
/// listed in `exclude` are skipped.
pub fn enumerate(
    dir: &Path,
    extensions: &[&str],
    exclude: &[String],
) -> Result<Vec<FileRecord>, SiteError> {
    if !dir.is_dir() {
        return Err(SiteError::MissingDirectory(dir.to_path_buf()));
    }

    let mut records = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !skipped(e, exclude));

    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || !has_extension(path, extensions) {
            continue;
        }

        let relative = path.strip_prefix(dir).unwrap_or(path);
        let content = fs::read_to_string(path).map_err(|source| SiteError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        records.push(FileRecord::new(relative, content));
    }

    records.sort_by(|a, b| a.path.pathname.cmp(&b.path.pathname));
    Ok(records)
}

/// Whether `path` has one of `extensions`, compared case-insensitively.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
}

/// Whether a relative path crosses a hidden or excluded segment.
pub fn is_excluded(relative: &Path, exclude: &[String]) -> bool {
    relative.components().any(|c| {
        let segment = c.as_os_str().to_string_lossy();
        segment.starts_with('.') || exclude.iter().any(|x| *x == segment)
    })
}

fn skipped(entry: &DirEntry, exclude: &[String]) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || exclude.iter().any(|x| *x == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn reads_matching_files_relative_to_the_root() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("blog/_drafts")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("index.html"), "<p>home</p>").unwrap();
        fs::write(root.join("blog/post.md"), "# Post").unwrap();
        fs::write(root.join("blog/_drafts/wip.md"), "# WIP").unwrap();
        fs::write(root.join(".cache/x.html"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();

        let records = enumerate(root, &["html", "md"], &["_drafts".to_string()]).unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.path.pathname.as_str()).collect();

        assert_eq!(paths, vec!["blog/post.md", "index.html"]);
        assert_eq!(records[1].content, "<p>home</p>");
        assert_eq!(records[0].path.dirname, "blog");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let temp = tempdir().unwrap();
        let err = enumerate(&temp.path().join("nope"), &["html"], &[]).unwrap_err();
        assert!(matches!(err, SiteError::MissingDirectory(_)));
    }

    #[test]
    fn excludes_hidden_and_listed_segments() {
        let exclude = vec!["_drafts".to_string()];
        assert!(is_excluded(Path::new("_drafts/a.html"), &exclude));
        assert!(is_excluded(Path::new("a/.b.html"), &exclude));
        assert!(!is_excluded(Path::new("a/b.html"), &exclude));
        assert!(has_extension(Path::new("a/B.HTML"), &["html"]));
        assert!(!has_extension(Path::new("a/b"), &["html"]));
    }
}
