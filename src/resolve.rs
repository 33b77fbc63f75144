//! Link target resolution and resource identity.
//!
//! A raw link target is turned into an absolute on-disk path by joining it
//! with the referencing file's directory (or with the docset root for `~/`
//! and site-absolute targets), normalizing it lexically, and, when the
//! target carries no recognizable extension, probing its directory for a
//! sibling file sharing its base name.
//!
//! Identity comparisons never touch the filesystem: every path that takes
//! part in reachability is first turned into a [`ResourceId`], a lowercase
//! forward-slash string, so equality is plain string equality.

use crate::error::{EngineError, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Extensions that mark a link target as naming a concrete file.
const RESOLVED_EXTENSIONS: &[&str] = &[
    "md", "yml", "yaml", "json", "png", "jpg", "jpeg", "gif", "svg", "cs", "vb", "fs", "cpp",
    "xml", "txt", "zip",
];

/// Canonical identity of a resource: lowercase, `/`-separated, lexically normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(path: &Path) -> Self {
        let normalized = normalize_path(path);
        let mut id = normalized
            .to_string_lossy()
            .replace('\\', "/")
            .to_lowercase();
        while id.len() > 1 && id.ends_with('/') {
            id.pop();
        }
        ResourceId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, e.g. `foo.md`.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// True when `self` lies strictly below the directory `dir`.
    pub fn is_under(&self, dir: &ResourceId) -> bool {
        self.0.len() > dir.0.len()
            && self.0.starts_with(&dir.0)
            && self.0.as_bytes()[dir.0.len()] == b'/'
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapses `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Splits a raw target at its last `#`, returning the path and the bookmark (with `#`).
pub fn split_bookmark(raw: &str) -> (&str, Option<&str>) {
    match raw.rfind('#') {
        Some(idx) => (&raw[..idx], Some(&raw[idx..])),
        None => (raw, None),
    }
}

/// Path portion of a target, dropping any `#fragment` and `?query`.
pub fn path_portion(raw: &str) -> &str {
    let end = raw.find(['#', '?']).unwrap_or(raw.len());
    &raw[..end]
}

/// Computes `to` relative to `from_dir`, using `/` separators.
///
/// Both paths are expected to be absolute; they are normalized first.
pub fn relative_path(from_dir: &Path, to: &Path) -> String {
    let from = normalize_path(from_dir);
    let to = normalize_path(to);
    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &to[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    parts.join("/")
}

/// Resolves raw link targets against a docset.
#[derive(Debug, Clone)]
pub struct Resolver {
    docset_root: PathBuf,
    url_base_path: Option<String>,
}

impl Resolver {
    pub fn new(docset_root: impl Into<PathBuf>, url_base_path: Option<String>) -> Self {
        Resolver {
            docset_root: docset_root.into(),
            url_base_path,
        }
    }

    pub fn docset_root(&self) -> &Path {
        &self.docset_root
    }

    pub fn url_base_path(&self) -> Option<&str> {
        self.url_base_path.as_deref()
    }

    /// Returns the part of `raw` after the URL base path, if `raw` is site-absolute for this docset.
    pub fn strip_base_path<'a>(&self, raw: &'a str) -> Option<&'a str> {
        let base = self.url_base_path.as_deref()?;
        let head = raw.get(..base.len())?;
        if !head.eq_ignore_ascii_case(base) {
            return None;
        }
        raw[base.len()..].strip_prefix('/')
    }

    /// Lexical resolution only: no probing, no existence check.
    ///
    /// Returns `Ok(None)` for external URLs, site-absolute links outside this
    /// docset, and empty targets. Fails only when the target contains
    /// characters that cannot form a path.
    pub fn locate(&self, raw: &str, referencing_dir: &Path) -> Result<Option<PathBuf>> {
        let target = unwrap_angle_brackets(raw.trim());
        let target = path_portion(target).trim();
        if target.is_empty() || is_external(target) {
            return Ok(None);
        }
        if target.chars().any(is_invalid_path_char) {
            return Err(EngineError::MalformedPath {
                link: raw.to_string(),
                file: referencing_dir.to_path_buf(),
            });
        }

        let target = target.replace('\\', "/");
        let joined = if let Some(rest) = target.strip_prefix("~/") {
            self.docset_root.join(rest.trim_start_matches('/'))
        } else if target.starts_with('/') {
            match self.strip_base_path(&target) {
                Some(rest) if !rest.is_empty() => self.docset_root.join(rest),
                _ => return Ok(None),
            }
        } else {
            referencing_dir.join(&target)
        };

        Ok(Some(normalize_path(&joined)))
    }

    /// Full resolution: [`Resolver::locate`] followed by extension probing.
    ///
    /// A missing sibling directory (typically a link into content that lives
    /// in another repository) yields `Ok(None)`.
    pub fn resolve(&self, raw: &str, referencing_dir: &Path) -> Result<Option<PathBuf>> {
        let Some(candidate) = self.locate(raw, referencing_dir)? else {
            return Ok(None);
        };
        if has_resolved_extension(&candidate) {
            return Ok(Some(candidate));
        }
        Ok(probe_siblings(&candidate))
    }
}

fn unwrap_angle_brackets(raw: &str) -> &str {
    raw.strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(raw)
}

fn is_external(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("mailto:")
        || lower.starts_with("xref:")
        || lower.starts_with("//")
}

fn is_invalid_path_char(c: char) -> bool {
    c.is_control() || matches!(c, '|' | '<' | '>' | '"' | '*')
}

fn has_resolved_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            RESOLVED_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Looks for `<name>.*` next to `candidate`, preferring markdown, then YAML.
fn probe_siblings(candidate: &Path) -> Option<PathBuf> {
    let dir = candidate.parent()?;
    let stem = candidate.file_name()?.to_str()?.to_lowercase();
    let prefix = format!("{}.", stem);

    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_lowercase().starts_with(&prefix))
        })
        .collect();
    matches.sort();

    let with_ext = |wanted: &str| {
        matches.iter().find(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
        })
    };

    with_ext("md")
        .or_else(|| with_ext("yml"))
        .or_else(|| matches.first())
        .cloned()
}
