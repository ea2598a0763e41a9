//! Build driver errors.

use std::path::PathBuf;

use tessera_collection::CollectionError;
use tessera_compiler::CompileError;

/// Errors that can occur while loading, compiling or saving a site.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("Directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error("Failed to compile {path}: {source}")]
    Compile {
        path: String,
        #[source]
        source: CompileError,
    },

    #[error("{} is outside the page and template directories", .0.display())]
    Unwatched(PathBuf),

    #[error("Plugin {0:?} is registered twice")]
    DuplicatePlugin(String),
}
