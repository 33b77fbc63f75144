//! Link extraction from markdown and YAML text.
//!
//! Extraction is targeted pattern matching over raw text, not parsing. Each
//! recognized syntax is a [`LinkKind`]; callers pick the kinds relevant to the
//! question they are asking (media references, include references, TOC
//! entries). When two patterns capture the same target span, the more
//! specific kind wins, so an include directive is not reported a second time
//! as an ordinary inline link.

use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::path::Path;

/// Syntax a link target was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    /// `[!INCLUDE [label](target)]`
    Include,
    /// `[!code-csharp[label](target#frag)]` or `:::code ... source="target":::`
    CodeEmbed,
    /// `:::image ... source="target" ...:::`
    ImageDirective,
    /// `<img src="target">`
    ImageTag,
    /// `imageSrc: target`
    ImageSrcKey,
    /// `social_image_url: "/base/..."`
    SocialImage,
    /// `[text](target)` or `[text](<target>)`
    Inline,
    /// `[label]: target`
    ReferenceDefinition,
    /// `href:` / `src:` / `url:` keys in YAML
    YamlKey,
}

impl LinkKind {
    /// Kinds that can point at a media file.
    pub const MEDIA: &'static [LinkKind] = &[
        LinkKind::ImageDirective,
        LinkKind::ImageTag,
        LinkKind::ImageSrcKey,
        LinkKind::SocialImage,
        LinkKind::Inline,
        LinkKind::ReferenceDefinition,
        LinkKind::YamlKey,
    ];

    /// Kinds that navigate to another article.
    pub const ARTICLE: &'static [LinkKind] = &[
        LinkKind::Inline,
        LinkKind::ReferenceDefinition,
        LinkKind::YamlKey,
    ];
}

/// The format a resource's text is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Markdown,
    Yaml,
}

impl TextFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" => Some(TextFormat::Markdown),
            "yml" | "yaml" => Some(TextFormat::Yaml),
            _ => None,
        }
    }
}

/// A raw link target as it appears in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawLink {
    pub target: String,
    pub kind: LinkKind,
    /// Byte range of the whole match.
    pub span: Range<usize>,
    /// Byte range of `target` within the text.
    pub target_span: Range<usize>,
}

impl RawLink {
    /// The full matched text, e.g. `[text](target)`.
    pub fn matched<'t>(&self, text: &'t str) -> &'t str {
        &text[self.span.clone()]
    }

    pub fn has_query(&self) -> bool {
        self.target.contains('?')
    }
}

struct Pattern {
    kind: LinkKind,
    regex: Regex,
    markdown: bool,
    yaml: bool,
}

/// Compiled link patterns for one docset.
pub struct Extractor {
    patterns: Vec<Pattern>,
    code_reference: Regex,
}

impl Extractor {
    /// Compiles the pattern set. `url_base_path` enables `social_image_url` matching.
    pub fn new(url_base_path: Option<&str>) -> Result<Self, regex::Error> {
        let mut patterns = vec![
            Pattern {
                kind: LinkKind::Include,
                regex: Regex::new(r"(?i)\[!INCLUDE\s*\[[^\]]*\]\(\s*<?([^)>\s]+)>?\s*\)\]?")?,
                markdown: true,
                yaml: true,
            },
            Pattern {
                kind: LinkKind::CodeEmbed,
                regex: Regex::new(r"(?i)\[!code(?:-[\w+#.-]+)?\s*\[[^\]]*\]\(\s*<?([^)>\s]+)>?\s*\)\]?")?,
                markdown: true,
                yaml: false,
            },
            Pattern {
                kind: LinkKind::CodeEmbed,
                regex: Regex::new(r#"(?i):::code\b[^\n]*?\ssource\s*=\s*"([^"\n]+)""#)?,
                markdown: true,
                yaml: false,
            },
            Pattern {
                kind: LinkKind::ImageDirective,
                regex: Regex::new(r#"(?i):::image\b[^\n]*?\ssource\s*=\s*"([^"\n]+)""#)?,
                markdown: true,
                yaml: false,
            },
            Pattern {
                kind: LinkKind::ImageTag,
                regex: Regex::new(r#"(?i)<img\b[^>]*?\ssrc\s*=\s*"\s*([^"\n]+?)\s*""#)?,
                markdown: true,
                yaml: true,
            },
            Pattern {
                kind: LinkKind::ImageSrcKey,
                regex: Regex::new(r#"(?i)imageSrc:[ \t]*["']?([^"'\s]+)"#)?,
                markdown: true,
                yaml: true,
            },
            Pattern {
                kind: LinkKind::Inline,
                regex: Regex::new(r#"\]\(\s*(?:<([^>\n]+)>|([^)\s]+))(?:\s+"[^"\n]*")?\s*\)"#)?,
                markdown: true,
                yaml: true,
            },
            Pattern {
                kind: LinkKind::ReferenceDefinition,
                regex: Regex::new(r"(?m)^[ \t]*\[[^\]\n]+\]:[ \t]*<?([^\s>]+)>?")?,
                markdown: true,
                yaml: false,
            },
            Pattern {
                kind: LinkKind::YamlKey,
                regex: Regex::new(r#"(?im)^[ \t]*-?[ \t]*(?:href|src|url):[ \t]*["']?([^"'\s#][^"'\s]*)"#)?,
                markdown: false,
                yaml: true,
            },
        ];

        if let Some(base) = url_base_path {
            patterns.insert(
                0,
                Pattern {
                    kind: LinkKind::SocialImage,
                    regex: Regex::new(&format!(
                        r#"(?i)social_image_url:[ \t]*["']?({}/[^"'\s]*)"#,
                        regex::escape(base)
                    ))?,
                    markdown: true,
                    yaml: true,
                },
            );
        }

        Ok(Extractor {
            patterns,
            code_reference: Regex::new(r#"[("]([^()"\s]+)[)"]"#)?,
        })
    }

    /// All links in `text`, ordered by position.
    pub fn extract(&self, text: &str, format: TextFormat) -> Vec<RawLink> {
        let mut links: Vec<RawLink> = Vec::new();

        for pattern in &self.patterns {
            let enabled = match format {
                TextFormat::Markdown => pattern.markdown,
                TextFormat::Yaml => pattern.yaml,
            };
            if !enabled {
                continue;
            }
            for caps in pattern.regex.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                let Some(target) = caps.iter().skip(1).flatten().next() else {
                    continue;
                };
                let target_span = target.range();
                if links.iter().any(|l| l.target_span == target_span) {
                    continue;
                }
                links.push(RawLink {
                    target: target.as_str().trim().to_string(),
                    kind: pattern.kind,
                    span: whole.range(),
                    target_span,
                });
            }
        }

        links.sort_by_key(|l| l.span.start);
        links
    }

    /// Links of the given kinds only.
    pub fn extract_kinds(&self, text: &str, format: TextFormat, kinds: &[LinkKind]) -> Vec<RawLink> {
        self.extract(text, format)
            .into_iter()
            .filter(|l| kinds.contains(&l.kind))
            .collect()
    }

    /// Every parenthesized or quoted path-like token.
    ///
    /// Code samples are embedded through several syntaxes, and project
    /// directories are referenced by any path that passes through them, so
    /// snippet analysis casts a wider net than [`Extractor::extract`]. Tokens
    /// without a `/` or `.` are dropped.
    pub fn code_references(&self, text: &str) -> Vec<RawLink> {
        self.code_reference
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let target = caps.get(1)?;
                let value = target.as_str();
                if !value.contains(['/', '.']) {
                    return None;
                }
                Some(RawLink {
                    target: value.to_string(),
                    kind: LinkKind::CodeEmbed,
                    span: whole.range(),
                    target_span: target.range(),
                })
            })
            .collect()
    }
}
