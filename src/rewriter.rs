//! In-content link rewriting.
//!
//! Two rewrites share this module: repointing links at redirected pages to
//! the terminal target of their redirect chain, and turning site-absolute
//! links (`/base/dir/page`) into file-relative ones. Both are planned
//! read-only over the whole corpus first, then applied through a
//! [`MutationSink`]. Planning is parallel per file; application is serial.
//!
//! A raw target containing `?` is never rewritten: the query usually pins a
//! product version that a file-relative link cannot express.

use crate::corpus::FileDescriptor;
use crate::error::Result;
use crate::extract::{Extractor, LinkKind, RawLink, TextFormat};
use crate::redirect::RedirectMap;
use crate::resolve::{Resolver, relative_path, split_bookmark};
use crate::sink::MutationSink;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Link forms that may point at a redirected page.
const REDIRECTABLE: &[LinkKind] = &[
    LinkKind::Inline,
    LinkKind::ReferenceDefinition,
    LinkKind::YamlKey,
];

/// Link forms converted from site-absolute to file-relative.
const RELATIVIZABLE: &[LinkKind] = &[
    LinkKind::Inline,
    LinkKind::ReferenceDefinition,
    LinkKind::ImageTag,
    LinkKind::ImageDirective,
    LinkKind::ImageSrcKey,
];

/// A planned replacement of one link's matched text within one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRewrite {
    pub file: PathBuf,
    /// The whole matched text, e.g. `[text](/base/old)`.
    pub original: String,
    pub replacement: String,
    pub old_target: String,
    pub new_target: String,
}

impl LinkRewrite {
    fn new(file: &Path, text: &str, link: &RawLink, new_target: String) -> Self {
        let original = link.matched(text).to_string();
        let replacement = format!(
            "{}{}{}",
            &text[link.span.start..link.target_span.start],
            new_target,
            &text[link.target_span.end..link.span.end]
        );
        LinkRewrite {
            file: file.to_path_buf(),
            original,
            replacement,
            old_target: link.target.clone(),
            new_target,
        }
    }
}

fn plan<F>(files: &[FileDescriptor], extractor: &Extractor, kinds: &[LinkKind], rewrite: F) -> Vec<LinkRewrite>
where
    F: Fn(&FileDescriptor, &RawLink) -> Option<String> + Sync,
{
    let partials: Vec<Vec<LinkRewrite>> = files
        .par_iter()
        .map(|file| -> Vec<LinkRewrite> {
            let text = match std::fs::read_to_string(&file.path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Skipping unreadable file {}: {}", file.path.display(), e);
                    return Vec::new();
                }
            };
            let format = TextFormat::from_path(&file.path).unwrap_or(TextFormat::Markdown);
            extractor
                .extract_kinds(&text, format, kinds)
                .into_iter()
                .filter(|link| !link.has_query())
                .filter_map(|link| {
                    let new_target = rewrite(file, &link)?;
                    (new_target != link.target)
                        .then(|| LinkRewrite::new(&file.path, &text, &link, new_target))
                })
                .collect()
        })
        .collect();

    partials.into_iter().flatten().collect()
}

/// File-relative link to the existing file behind `target`, keeping its bookmark.
fn relative_link(resolver: &Resolver, target: &str, from_dir: &Path) -> Option<String> {
    let path = match resolver.resolve(target, from_dir) {
        Ok(found) => found?,
        Err(e) => {
            tracing::warn!("{}", e);
            return None;
        }
    };
    if !path.is_file() {
        return None;
    }
    let (_, bookmark) = split_bookmark(target);
    Some(format!(
        "{}{}",
        relative_path(from_dir, &path),
        bookmark.unwrap_or("")
    ))
}

/// Site URL a link points at: site-absolute targets as written, relative
/// targets mapped through their docset-relative location.
fn link_url(resolver: &Resolver, target: &str, from_dir: &Path) -> Option<String> {
    if target.starts_with('/') {
        return Some(target.to_string());
    }
    let path = resolver.locate(target, from_dir).ok()??;
    let relative = path.strip_prefix(resolver.docset_root()).ok()?;
    let (_, bookmark) = split_bookmark(target);
    Some(format!(
        "{}/{}{}",
        resolver.url_base_path().unwrap_or(""),
        relative.to_string_lossy().replace('\\', "/"),
        bookmark.unwrap_or("")
    ))
}

/// Plans rewrites of links to redirected pages.
///
/// Each link is repointed at the terminal target of its (already
/// collapsed) redirect, expressed relative to the linking file. Targets
/// with no file in this docset are left alone.
pub fn plan_redirect_rewrites(
    files: &[FileDescriptor],
    extractor: &Extractor,
    resolver: &Resolver,
    redirects: &RedirectMap,
) -> Vec<LinkRewrite> {
    plan(files, extractor, REDIRECTABLE, |file, link| {
        let url = link_url(resolver, &link.target, &file.dir)?;
        let target = redirects.target_for(&url)?;
        resolver.strip_base_path(&target)?;
        relative_link(resolver, &target, &file.dir)
    })
}

/// Plans rewrites of site-absolute links into file-relative ones.
pub fn plan_relative_rewrites(
    files: &[FileDescriptor],
    extractor: &Extractor,
    resolver: &Resolver,
) -> Vec<LinkRewrite> {
    plan(files, extractor, RELATIVIZABLE, |file, link| {
        resolver.strip_base_path(&link.target)?;
        relative_link(resolver, &link.target, &file.dir)
    })
}

/// Applies rewrites in order, re-reading the file before each one.
///
/// Returns the number of rewrites that changed a file.
pub fn apply_rewrites(rewrites: &[LinkRewrite], sink: &mut dyn MutationSink) -> Result<usize> {
    let mut applied = 0;
    for rewrite in rewrites {
        let text = sink.read_text(&rewrite.file)?;
        let updated = replace_link(&text, &rewrite.original, &rewrite.replacement);
        if updated != text {
            sink.write_text(&rewrite.file, &updated)?;
            applied += 1;
        }
    }
    Ok(applied)
}

/// Replaces every occurrence of `original`, except where the target it ends
/// with continues past the occurrence (e.g. into a `?query`).
pub fn replace_link(text: &str, original: &str, replacement: &str) -> String {
    if original.is_empty() {
        return text.to_string();
    }
    let open_ended = original.chars().last().is_some_and(continues_target);

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find(original) {
        let end = idx + original.len();
        let extends = open_ended && rest[end..].chars().next().is_some_and(continues_target);
        out.push_str(&rest[..idx]);
        out.push_str(if extends { original } else { replacement });
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

fn continues_target(c: char) -> bool {
    !(c.is_whitespace() || matches!(c, ')' | '"' | '\'' | '>' | ']' | ','))
}
