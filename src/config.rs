//! Docset discovery and engine configuration.
//!
//! A docset is anchored at the nearest directory containing `docfx.json`.
//! The enclosing repository is anchored at the nearest directory containing
//! `.openpublishing.publish.config.json`, which is also where the redirect
//! table lives.

use crate::error::{EngineError, Result};
use crate::extract::Extractor;
use crate::resolve::Resolver;
use std::path::{Path, PathBuf};

pub const DOCFX_FILE: &str = "docfx.json";
pub const OPS_CONFIG_FILE: &str = ".openpublishing.publish.config.json";
pub const REDIRECTION_FILE: &str = ".openpublishing.redirection.json";

pub const DEFAULT_SNIPPET_EXTENSIONS: &[&str] = &["cs", "vb"];
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg"];

/// Returns `start` or its nearest ancestor that contains a file named `marker`.
pub fn find_ancestor_with(start: &Path, marker: &'static str) -> Result<PathBuf> {
    if !start.is_dir() {
        return Err(EngineError::MissingRoot(start.to_path_buf()));
    }
    let start = start
        .canonicalize()
        .map_err(|e| EngineError::io(start, e))?;

    let found = start
        .ancestors()
        .find(|dir| dir.join(marker).is_file())
        .map(Path::to_path_buf);
    found.ok_or(EngineError::DocsetNotFound { marker, start })
}

/// Where a docset lives on disk.
#[derive(Debug, Clone)]
pub struct Docset {
    /// Directory containing `docfx.json`.
    pub root: PathBuf,
    /// Directory containing the publishing config, if any.
    pub repo_root: Option<PathBuf>,
}

impl Docset {
    pub fn discover(start: &Path) -> Result<Self> {
        let root = find_ancestor_with(start, DOCFX_FILE)?;
        let repo_root = find_ancestor_with(&root, OPS_CONFIG_FILE).ok();
        Ok(Docset { root, repo_root })
    }

    /// Default location of the redirect table.
    pub fn redirection_file(&self) -> Option<PathBuf> {
        self.repo_root.as_ref().map(|r| r.join(REDIRECTION_FILE))
    }

    /// Fails unless `dir` is the docset root or one of its descendants.
    pub fn ensure_contains(&self, dir: &Path) -> Result<PathBuf> {
        if !dir.is_dir() {
            return Err(EngineError::MissingRoot(dir.to_path_buf()));
        }
        let dir = dir.canonicalize().map_err(|e| EngineError::io(dir, e))?;
        if dir.starts_with(&self.root) {
            Ok(dir)
        } else {
            Err(EngineError::OutsideDocset {
                dir,
                root: self.root.clone(),
            })
        }
    }

    /// Path of the docset root relative to the repository root, `/`-separated.
    ///
    /// Redirect `source_path` values are written relative to the repository
    /// root, so this is the prefix that maps them into the docset.
    pub fn prefix_in_repo(&self) -> String {
        let Some(repo) = &self.repo_root else {
            return String::new();
        };
        self.root
            .strip_prefix(repo)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default()
    }
}

/// Normalizes a URL base path to `/segment[/segment]` form.
pub fn normalize_url_base_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}

/// Settings shared by every engine operation in one run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub docset: Docset,
    pub url_base_path: Option<String>,
    pub snippet_extensions: Vec<String>,
    pub media_extensions: Vec<String>,
    pub exclude: Vec<glob::Pattern>,
}

impl EngineConfig {
    pub fn new(docset: Docset) -> Self {
        EngineConfig {
            docset,
            url_base_path: None,
            snippet_extensions: DEFAULT_SNIPPET_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            media_extensions: DEFAULT_MEDIA_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude: Vec::new(),
        }
    }

    pub fn with_url_base_path(mut self, raw: Option<&str>) -> Self {
        self.url_base_path = raw.and_then(normalize_url_base_path);
        self
    }

    pub fn with_excludes(mut self, patterns: Vec<glob::Pattern>) -> Self {
        self.exclude = patterns;
        self
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.docset.root.clone(), self.url_base_path.clone())
    }

    pub fn extractor(&self) -> std::result::Result<Extractor, regex::Error> {
        Extractor::new(self.url_base_path.as_deref())
    }
}
