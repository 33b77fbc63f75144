//! Redirect table loading and hop collapsing.
//!
//! A redirect table maps source URLs to target URLs. Entries may chain
//! (`/a -> /b`, `/b -> /c`); collapsing rewrites every entry so it points
//! straight at the end of its chain. Chains that revisit a source are
//! cycles: they are reported and the entry keeps its original target.
//!
//! Sources in `.openpublishing.redirection.json` are repository-relative
//! file paths, so they are first mapped to site URLs (`/base/dir/page`) to
//! share a key space with the targets.

use crate::config::Docset;
use crate::error::{EngineError, Result};
use crate::resolve::split_bookmark;
use crate::sink::MutationSink;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One entry of the on-disk redirect table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redirection {
    pub source_path: String,
    pub redirect_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_document_id: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The `.openpublishing.redirection.json` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectTable {
    #[serde(default)]
    pub redirections: Vec<Redirection>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RedirectTable {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| EngineError::RedirectTable {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json(&self, path: &Path) -> Result<String> {
        let mut text =
            serde_json::to_string_pretty(self).map_err(|source| EngineError::RedirectTable {
                path: path.to_path_buf(),
                source,
            })?;
        text.push('\n');
        Ok(text)
    }

    pub fn save(&self, path: &Path, sink: &mut dyn MutationSink) -> Result<()> {
        let text = self.to_json(path)?;
        sink.write_text(path, &text)
    }

    /// The table as URL pairs, index-aligned with `redirections`.
    pub fn redirects(&self, docset: &Docset, url_base_path: Option<&str>) -> Vec<Redirect> {
        let prefix = docset.prefix_in_repo();
        self.redirections
            .iter()
            .map(|r| Redirect {
                source: source_url(&r.source_path, &prefix, url_base_path),
                target: r.redirect_url.clone(),
            })
            .collect()
    }

    /// Copies collapsed targets back into the table. Returns the number of changed entries.
    pub fn apply(&mut self, report: &CollapseReport) -> usize {
        let mut changed = 0;
        for (entry, redirect) in self.redirections.iter_mut().zip(&report.redirects) {
            if entry.redirect_url != redirect.target {
                entry.redirect_url = redirect.target.clone();
                changed += 1;
            }
        }
        changed
    }
}

/// Maps a repository-relative source file path to the URL it is served at.
///
/// `docs/core/old.md` in a docset at `docs/` with base path `/dotnet`
/// becomes `/dotnet/core/old`; `index` pages map to their directory.
pub fn source_url(source_path: &str, prefix_in_repo: &str, url_base_path: Option<&str>) -> String {
    let path = source_path.trim().replace('\\', "/");
    let path = path.trim_start_matches('/');

    let rest = match prefix_in_repo.trim_matches('/') {
        "" => path,
        prefix => path
            .get(..prefix.len())
            .filter(|head| head.eq_ignore_ascii_case(prefix))
            .and_then(|_| path[prefix.len()..].strip_prefix('/'))
            .unwrap_or(path),
    };

    let mut rest = strip_page_extension(rest).to_string();
    if rest.eq_ignore_ascii_case("index") {
        rest.clear();
    } else if let Some(dir) = rest
        .rsplit_once('/')
        .filter(|(_, last)| last.eq_ignore_ascii_case("index"))
        .map(|(dir, _)| format!("{}/", dir))
    {
        rest = dir;
    }

    format!("{}/{}", url_base_path.unwrap_or(""), rest)
}

fn strip_page_extension(path: &str) -> &str {
    for ext in [".md", ".yml", ".yaml"] {
        if let Some(head) = path.len().checked_sub(ext.len()).and_then(|n| path.get(..n))
            && path[head.len()..].eq_ignore_ascii_case(ext)
        {
            return head;
        }
    }
    path
}

/// Lookup key for a redirect URL: lowercase, no bookmark or query, no
/// page extension, no trailing `/index` or `/`.
pub fn redirect_key(url: &str) -> String {
    let end = url.find(['#', '?']).unwrap_or(url.len());
    let mut key = url[..end].trim().replace('\\', "/").to_lowercase();
    key.truncate(strip_page_extension(&key).len());
    loop {
        if key.len() > 1 && key.ends_with('/') {
            key.pop();
        } else if let Some(n) = key.strip_suffix("/index").map(str::len) {
            key.truncate(n);
        } else {
            break;
        }
    }
    key
}

/// A source URL and the URL it redirects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub source: String,
    pub target: String,
}

impl Redirect {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Redirect {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A chain that revisits one of its own sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectCycle {
    /// Source of the entry whose chain loops.
    pub source: String,
    /// Every URL visited, ending with the repeated one.
    pub chain: Vec<String>,
}

impl RedirectCycle {
    pub fn to_error(&self) -> EngineError {
        EngineError::RedirectCycle {
            source_url: self.source.clone(),
            chain: self.chain.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollapsedHop {
    pub source: String,
    pub from: String,
    pub to: String,
}

/// Outcome of [`collapse_hops`].
#[derive(Debug, Clone, Serialize)]
pub struct CollapseReport {
    /// Every input entry, in input order, with collapsed targets.
    pub redirects: Vec<Redirect>,
    pub collapsed: Vec<CollapsedHop>,
    pub cycles: Vec<RedirectCycle>,
}

impl CollapseReport {
    /// Source-to-target lookup over the collapsed entries, leaving out cycles.
    pub fn lookup(&self) -> RedirectMap {
        let looping: HashSet<&str> = self.cycles.iter().map(|c| c.source.as_str()).collect();
        let mut targets = HashMap::new();
        for redirect in &self.redirects {
            if looping.contains(redirect.source.as_str()) {
                continue;
            }
            targets
                .entry(redirect_key(&redirect.source))
                .or_insert_with(|| redirect.target.clone());
        }
        RedirectMap { targets }
    }
}

/// Follows every chain to its terminal target.
///
/// The result is idempotent: collapsing its output again changes nothing.
pub fn collapse_hops(entries: &[Redirect]) -> CollapseReport {
    let mut by_source: HashMap<String, usize> = HashMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        by_source.entry(redirect_key(&entry.source)).or_insert(idx);
    }

    let mut redirects = Vec::with_capacity(entries.len());
    let mut collapsed = Vec::new();
    let mut cycles = Vec::new();

    for entry in entries {
        let mut visited: HashSet<String> = HashSet::from([redirect_key(&entry.source)]);
        let mut chain = vec![entry.source.clone()];
        let mut current = entry.target.as_str();
        let mut looped = false;

        while let Some(&next) = by_source.get(&redirect_key(current)) {
            chain.push(current.to_string());
            if !visited.insert(redirect_key(current)) {
                looped = true;
                break;
            }
            current = entries[next].target.as_str();
        }

        if looped {
            tracing::debug!("Redirect cycle at {}", entry.source);
            cycles.push(RedirectCycle {
                source: entry.source.clone(),
                chain,
            });
            redirects.push(entry.clone());
            continue;
        }

        if current != entry.target {
            collapsed.push(CollapsedHop {
                source: entry.source.clone(),
                from: entry.target.clone(),
                to: current.to_string(),
            });
        }
        redirects.push(Redirect::new(entry.source.clone(), current));
    }

    CollapseReport {
        redirects,
        collapsed,
        cycles,
    }
}

/// Collapsed redirects keyed for link lookup.
#[derive(Debug, Clone, Default)]
pub struct RedirectMap {
    targets: HashMap<String, String>,
}

impl RedirectMap {
    /// Terminal target for `url`, carrying over any bookmark `url` has and
    /// the target lacks.
    pub fn target_for(&self, url: &str) -> Option<String> {
        let target = self.targets.get(&redirect_key(url))?;
        match split_bookmark(url) {
            (_, Some(bookmark)) if !target.contains('#') => Some(format!("{}{}", target, bookmark)),
            _ => Some(target.clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
