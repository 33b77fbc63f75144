//! Side effects requested by the engine.
//!
//! Analysis never deletes or writes on its own. Every destructive action
//! goes through a [`MutationSink`], so the same code path serves a real run
//! and a dry run.

use crate::error::{EngineError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A requested side effect, as recorded by [`DryRunSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "path", rename_all = "kebab-case")]
pub enum Mutation {
    DeleteFile(PathBuf),
    DeleteDir(PathBuf),
    WriteText(PathBuf),
}

pub trait MutationSink {
    /// Reads the current text of `path`, including any pending writes.
    fn read_text(&self, path: &Path) -> Result<String>;
    fn write_text(&mut self, path: &Path, text: &str) -> Result<()>;
    fn delete_file(&mut self, path: &Path) -> Result<()>;
    /// Deletes `path` and everything below it.
    fn delete_dir(&mut self, path: &Path) -> Result<()>;
}

/// Applies mutations to the filesystem.
#[derive(Debug, Default)]
pub struct FsSink;

impl MutationSink for FsSink {
    fn read_text(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))
    }

    fn write_text(&mut self, path: &Path, text: &str) -> Result<()> {
        std::fs::write(path, text).map_err(|e| EngineError::io(path, e))
    }

    fn delete_file(&mut self, path: &Path) -> Result<()> {
        tracing::debug!("Deleting file {}", path.display());
        std::fs::remove_file(path).map_err(|e| EngineError::io(path, e))
    }

    fn delete_dir(&mut self, path: &Path) -> Result<()> {
        tracing::debug!("Deleting directory {}", path.display());
        std::fs::remove_dir_all(path).map_err(|e| EngineError::io(path, e))
    }
}

/// Records mutations instead of performing them.
///
/// Writes are kept in memory so that a later read of the same file sees
/// them, which keeps multi-step rewrites of one file consistent.
#[derive(Debug, Default)]
pub struct DryRunSink {
    pub log: Vec<Mutation>,
    pending: HashMap<PathBuf, String>,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text written to `path` so far, if any.
    pub fn pending_text(&self, path: &Path) -> Option<&str> {
        self.pending.get(path).map(String::as_str)
    }
}

impl MutationSink for DryRunSink {
    fn read_text(&self, path: &Path) -> Result<String> {
        if let Some(text) = self.pending.get(path) {
            return Ok(text.clone());
        }
        std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))
    }

    fn write_text(&mut self, path: &Path, text: &str) -> Result<()> {
        self.pending.insert(path.to_path_buf(), text.to_string());
        self.log.push(Mutation::WriteText(path.to_path_buf()));
        Ok(())
    }

    fn delete_file(&mut self, path: &Path) -> Result<()> {
        self.log.push(Mutation::DeleteFile(path.to_path_buf()));
        Ok(())
    }

    fn delete_dir(&mut self, path: &Path) -> Result<()> {
        self.log.push(Mutation::DeleteDir(path.to_path_buf()));
        Ok(())
    }
}
