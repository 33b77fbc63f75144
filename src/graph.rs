//! The reference graph.
//!
//! Nodes are the resources a question is about (the interest set); edges are
//! resolved links from referencing files to those nodes. Referencing files
//! are scanned in parallel; every worker returns its own edge list and the
//! lists are merged on the calling thread in input order, so the result does
//! not depend on scheduling.
//!
//! Directory nodes aggregate everything below them: a link landing anywhere
//! under a directory node becomes an edge to that directory, and to every
//! enclosing directory node as well.

use crate::corpus::FileDescriptor;
use crate::extract::{Extractor, LinkKind, RawLink, TextFormat};
use crate::resolve::{ResourceId, Resolver, path_portion};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// What a resource is, for orphan rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Article,
    Media,
    Include,
    Snippet,
    /// A project directory whose members share fate.
    Directory,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub id: ResourceId,
    pub path: PathBuf,
    pub category: Category,
}

impl Resource {
    pub fn new(path: impl Into<PathBuf>, category: Category) -> Self {
        let path = path.into();
        Resource {
            id: ResourceId::new(&path),
            path,
            category,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceEdge {
    /// The file containing the link.
    pub source: PathBuf,
    pub target: ResourceId,
    pub raw: String,
    pub kind: LinkKind,
}

/// Which links a scan collects and how they are resolved.
#[derive(Debug, Clone, Copy)]
pub enum LinkSelect<'a> {
    /// Links of these kinds, fully resolved with extension probing.
    Kinds(&'a [LinkKind]),
    /// Every path-like token, resolved lexically. Used for code samples.
    CodeReferences,
}

/// Extracts and resolves the links of one file.
///
/// Unreadable files are logged and yield nothing. Links that cannot form a
/// path are logged and skipped; unresolved links are silently dropped.
pub fn scan_links(
    file: &Path,
    extractor: &Extractor,
    resolver: &Resolver,
    select: LinkSelect<'_>,
) -> Vec<(RawLink, PathBuf)> {
    let text = match std::fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Skipping unreadable file {}: {}", file.display(), e);
            return Vec::new();
        }
    };
    let dir = file.parent().unwrap_or(Path::new(""));
    let format = TextFormat::from_path(file).unwrap_or(TextFormat::Markdown);

    let links = match select {
        LinkSelect::Kinds(kinds) => extractor.extract_kinds(&text, format, kinds),
        LinkSelect::CodeReferences => extractor.code_references(&text),
    };

    links
        .into_iter()
        .filter_map(|link| {
            let resolved = match select {
                LinkSelect::Kinds(_) => resolver.resolve(&link.target, dir),
                LinkSelect::CodeReferences => resolver.locate(&link.target, dir),
            };
            match resolved {
                Ok(Some(path)) => Some((link, path)),
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            }
        })
        .collect()
}

/// Resources of interest plus the resolved links landing on them.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    resources: BTreeMap<ResourceId, Resource>,
    edges: Vec<ReferenceEdge>,
    counts: HashMap<ResourceId, usize>,
    /// File names and stems of file resources, for cheap pre-filtering.
    names: HashSet<String>,
    has_directories: bool,
}

impl ReferenceGraph {
    pub fn new(resources: impl IntoIterator<Item = Resource>) -> Self {
        let mut graph = ReferenceGraph::default();
        for resource in resources {
            if resource.category == Category::Directory {
                graph.has_directories = true;
            } else {
                let name = resource.id.file_name().to_string();
                if let Some((stem, _)) = name.rsplit_once('.') {
                    graph.names.insert(stem.to_string());
                }
                graph.names.insert(name);
            }
            graph.counts.insert(resource.id.clone(), 0);
            graph.resources.insert(resource.id.clone(), resource);
        }
        graph
    }

    /// Scans `referencing` in parallel and records every link landing on a node.
    pub fn link_from(
        &mut self,
        referencing: &[FileDescriptor],
        extractor: &Extractor,
        resolver: &Resolver,
        select: LinkSelect<'_>,
    ) {
        let this = &*self;
        let partials: Vec<Vec<ReferenceEdge>> = referencing
            .par_iter()
            .map(|file| this.edges_from(&file.path, extractor, resolver, select))
            .collect();

        for edge in partials.into_iter().flatten() {
            self.add_edge(edge);
        }
    }

    fn edges_from(
        &self,
        file: &Path,
        extractor: &Extractor,
        resolver: &Resolver,
        select: LinkSelect<'_>,
    ) -> Vec<ReferenceEdge> {
        scan_links(file, extractor, resolver, select)
            .into_iter()
            .flat_map(|(link, path)| {
                self.nodes_for(&ResourceId::new(&path))
                    .into_iter()
                    .map(move |target| ReferenceEdge {
                        source: file.to_path_buf(),
                        target,
                        raw: link.target.clone(),
                        kind: link.kind,
                    })
            })
            .collect()
    }

    /// Same as [`ReferenceGraph::link_from`], but drops links whose last
    /// segment cannot name any node before paying for resolution.
    pub fn link_from_prefiltered(
        &mut self,
        referencing: &[FileDescriptor],
        extractor: &Extractor,
        resolver: &Resolver,
        kinds: &[LinkKind],
    ) {
        let this = &*self;
        let partials: Vec<Vec<ReferenceEdge>> = referencing
            .par_iter()
            .map(|file| -> Vec<ReferenceEdge> {
                let Ok(text) = std::fs::read_to_string(&file.path) else {
                    tracing::warn!("Skipping unreadable file {}", file.path.display());
                    return Vec::new();
                };
                let format = TextFormat::from_path(&file.path).unwrap_or(TextFormat::Markdown);
                extractor
                    .extract_kinds(&text, format, kinds)
                    .into_iter()
                    .filter(|link| this.may_name_node(&link.target))
                    .flat_map(|link| {
                        let targets = match resolver.resolve(&link.target, &file.dir) {
                            Ok(Some(path)) => this.nodes_for(&ResourceId::new(&path)),
                            Ok(None) => Vec::new(),
                            Err(e) => {
                                tracing::warn!("{}", e);
                                Vec::new()
                            }
                        };
                        targets.into_iter().map(move |target| ReferenceEdge {
                            source: file.path.clone(),
                            target,
                            raw: link.target.clone(),
                            kind: link.kind,
                        })
                    })
                    .collect()
            })
            .collect();

        for edge in partials.into_iter().flatten() {
            self.add_edge(edge);
        }
    }

    fn may_name_node(&self, raw: &str) -> bool {
        if self.has_directories {
            return true;
        }
        let path = path_portion(raw).trim_end_matches('>');
        let last = path.rsplit(['/', '\\']).next().unwrap_or(path);
        self.names.contains(&last.to_lowercase())
    }

    /// The nodes a resolved path lands on: the path itself when it is a node,
    /// plus every directory node enclosing it, innermost first.
    pub fn nodes_for(&self, id: &ResourceId) -> Vec<ResourceId> {
        let mut nodes = Vec::new();
        if self.resources.contains_key(id) {
            nodes.push(id.clone());
        }
        if self.has_directories {
            let mut enclosing: Vec<&ResourceId> = self
                .resources
                .values()
                .filter(|r| r.category == Category::Directory && id.is_under(&r.id))
                .map(|r| &r.id)
                .collect();
            enclosing.sort_by_key(|dir| std::cmp::Reverse(dir.as_str().len()));
            nodes.extend(enclosing.into_iter().cloned());
        }
        nodes
    }

    pub fn add_edge(&mut self, edge: ReferenceEdge) {
        // Links outside the interest set are expected; only known nodes count.
        if let Some(count) = self.counts.get_mut(&edge.target) {
            *count += 1;
            self.edges.push(edge);
        }
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn edges(&self) -> &[ReferenceEdge] {
        &self.edges
    }

    pub fn incoming_count(&self, id: &ResourceId) -> usize {
        self.counts.get(id).copied().unwrap_or(0)
    }

    /// Distinct files linking to `id`, in first-seen order.
    pub fn referrers(&self, id: &ResourceId) -> Vec<&Path> {
        let mut seen: Vec<&Path> = Vec::new();
        for edge in self.edges.iter().filter(|e| &e.target == id) {
            if !seen.contains(&edge.source.as_path()) {
                seen.push(&edge.source);
            }
        }
        seen
    }

    /// Nodes with no incoming edge, in identity order.
    pub fn unreferenced(&self) -> impl Iterator<Item = &Resource> {
        self.resources
            .values()
            .filter(|r| self.incoming_count(&r.id) == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::enumerate_content_files;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn counts_every_resolved_link_to_a_node() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let used = write(root, "media/used.png", "");
        let unused = write(root, "media/unused.png", "");
        write(root, "a.md", "![x](media/used.png) ![y](./media/used.png)");
        write(root, "sub/b.md", "![z](../media/used.png) [ext](https://x/y.png)");

        let mut graph = ReferenceGraph::new([
            Resource::new(&used, Category::Media),
            Resource::new(&unused, Category::Media),
        ]);
        let files = enumerate_content_files(root, &["md"], &[]).unwrap();
        let resolver = Resolver::new(root, None);
        let extractor = Extractor::new(None).unwrap();
        graph.link_from(&files, &extractor, &resolver, LinkSelect::Kinds(LinkKind::MEDIA));

        assert_eq!(graph.incoming_count(&ResourceId::new(&used)), 3);
        assert_eq!(graph.referrers(&ResourceId::new(&used)).len(), 2);
        let orphans: Vec<_> = graph.unreferenced().map(|r| r.path.clone()).collect();
        assert_eq!(orphans, vec![unused]);
    }

    #[test]
    fn directory_nodes_absorb_links_below_them() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let proj = root.join("samples/ProjA");
        write(root, "samples/ProjA/ProjA.csproj", "");
        write(root, "samples/ProjA/src/Program.cs", "");
        write(root, "docs/a.md", "[!code-csharp[x](../samples/ProjA/src/Program.cs#main)]");

        let mut graph = ReferenceGraph::new([Resource::new(&proj, Category::Directory)]);
        let files = enumerate_content_files(root, &["md"], &[]).unwrap();
        let resolver = Resolver::new(root, None);
        let extractor = Extractor::new(None).unwrap();
        graph.link_from(&files, &extractor, &resolver, LinkSelect::CodeReferences);

        assert_eq!(graph.incoming_count(&ResourceId::new(&proj)), 1);
        assert_eq!(graph.unreferenced().count(), 0);
    }

    #[test]
    fn nested_directory_nodes_all_count_the_link() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let outer = root.join("samples/Outer");
        let inner = root.join("samples/Outer/Inner");
        write(root, "samples/Outer/Inner/Lib.cs", "");
        write(root, "docs/a.md", "[!code-csharp[x](../samples/Outer/Inner/Lib.cs)]");

        let mut graph = ReferenceGraph::new([
            Resource::new(&outer, Category::Directory),
            Resource::new(&inner, Category::Directory),
        ]);
        let lib = ResourceId::new(&inner.join("Lib.cs"));
        assert_eq!(
            graph.nodes_for(&lib),
            vec![ResourceId::new(&inner), ResourceId::new(&outer)]
        );

        let files = enumerate_content_files(root, &["md"], &[]).unwrap();
        let resolver = Resolver::new(root, None);
        let extractor = Extractor::new(None).unwrap();
        graph.link_from(&files, &extractor, &resolver, LinkSelect::CodeReferences);

        assert_eq!(graph.incoming_count(&ResourceId::new(&outer)), 1);
        assert_eq!(graph.incoming_count(&ResourceId::new(&inner)), 1);
        assert_eq!(graph.unreferenced().count(), 0);
    }

    #[test]
    fn prefilter_still_validates_full_path() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let listed = write(root, "core/intro.md", "");
        let same_name = write(root, "other/intro.md", "");
        write(root, "core/toc.yml", "- name: Intro\n  href: intro.md\n");

        let mut graph = ReferenceGraph::new([
            Resource::new(&listed, Category::Article),
            Resource::new(&same_name, Category::Article),
        ]);
        let tocs = enumerate_content_files(&root.join("core"), &["yml"], &[]).unwrap();
        let resolver = Resolver::new(root, None);
        let extractor = Extractor::new(None).unwrap();
        graph.link_from_prefiltered(&tocs, &extractor, &resolver, LinkKind::ARTICLE);

        assert_eq!(graph.incoming_count(&ResourceId::new(&listed)), 1);
        assert_eq!(graph.incoming_count(&ResourceId::new(&same_name)), 0);
    }

    #[test]
    fn edges_outside_the_interest_set_are_ignored() {
        let mut graph = ReferenceGraph::new([Resource::new("/r/a.md", Category::Article)]);
        graph.add_edge(ReferenceEdge {
            source: PathBuf::from("/r/toc.md"),
            target: ResourceId::new(Path::new("/r/zzz.md")),
            raw: "zzz.md".to_string(),
            kind: LinkKind::Inline,
        });
        assert!(graph.edges().is_empty());
        assert_eq!(graph.unreferenced().count(), 1);
    }
}
