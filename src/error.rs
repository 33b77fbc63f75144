//! Error taxonomy for the reference engine.
//!
//! Unresolved links are not errors: they surface as `None` from the
//! resolver. Everything here is a condition a caller may want to tell apart.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("directory does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("no {marker} found in {} or any parent directory", start.display())]
    DocsetNotFound { marker: &'static str, start: PathBuf },

    #[error("'{}' is not inside the docset rooted at '{}'", dir.display(), root.display())]
    OutsideDocset { dir: PathBuf, root: PathBuf },

    #[error("malformed link '{link}' in {}", file.display())]
    MalformedPath { link: String, file: PathBuf },

    #[error("redirect cycle starting at '{source_url}': {}", chain.join(" -> "))]
    RedirectCycle { source_url: String, chain: Vec<String> },

    #[error("invalid redirect table {}: {source}", path.display())]
    RedirectTable {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid link pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
