//! Reachability analysis.
//!
//! Each resource category has its own notion of "referenced":
//!
//! - **Articles** are referenced when a table-of-contents file links to them.
//! - **Media** and **includes** are referenced when any markdown or YAML file
//!   in the docset links to them; the signal is the incoming link count.
//! - **Snippets** outside a project are counted individually. Snippets inside
//!   a project directory share the fate of that directory, and a directory
//!   listed by a solution lives or dies with the solution.
//!
//! Analysis is read-only. Deletions are applied afterwards through a
//! [`MutationSink`].

use crate::config::EngineConfig;
use crate::corpus::{self, FileDescriptor, Solution};
use crate::error::Result;
use crate::extract::{Extractor, LinkKind};
use crate::graph::{Category, LinkSelect, ReferenceGraph, Resource};
use crate::resolve::{ResourceId, Resolver};
use crate::sink::MutationSink;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Directory names whose markdown is never an orphaned article.
const NON_ARTICLE_DIRS: &[&str] = &["includes", "_shared", "misc"];

/// Summary statistics from an orphan pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Diagnostics {
    pub files_scanned: usize,
    pub candidates: usize,
    pub references: usize,
    pub orphans: usize,
}

/// Orphans of a single-file category.
#[derive(Debug, Clone, Serialize)]
pub struct OrphanReport {
    pub category: Category,
    pub orphans: Vec<PathBuf>,
    pub diagnostics: Diagnostics,
}

impl OrphanReport {
    fn from_graph(category: Category, graph: &ReferenceGraph, files_scanned: usize) -> Self {
        let orphans: Vec<PathBuf> = graph.unreferenced().map(|r| r.path.clone()).collect();
        OrphanReport {
            category,
            diagnostics: Diagnostics {
                files_scanned,
                candidates: graph.resources().count(),
                references: graph.edges().len(),
                orphans: orphans.len(),
            },
            orphans,
        }
    }

    /// Deletes every orphan except those in `keep`.
    pub fn delete(&self, keep: &BTreeMap<PathBuf, usize>, sink: &mut dyn MutationSink) -> Result<usize> {
        let mut deleted = 0;
        for orphan in self.orphans.iter().filter(|o| !keep.contains_key(*o)) {
            sink.delete_file(orphan)?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

/// What happens to a project directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    Keep,
    Delete,
    /// Unreferenced, but its fate is decided by a solution it belongs to.
    DeferToSolution,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatus {
    pub dir: PathBuf,
    pub references: usize,
    pub decision: Decision,
}

/// Result of the snippet pass.
#[derive(Debug, Clone, Serialize)]
pub struct SnippetReport {
    /// Snippet files outside any project with no incoming reference.
    pub orphaned_files: Vec<PathBuf>,
    /// Project directories with no reference and no solution.
    pub orphaned_projects: Vec<PathBuf>,
    /// Directories of solutions none of whose projects is referenced.
    pub orphaned_solutions: Vec<PathBuf>,
    /// Solution or project directories with no reference of their own that
    /// still hold a referenced snippet, so they are left in place.
    pub retained: Vec<PathBuf>,
    pub projects: Vec<ProjectStatus>,
    pub diagnostics: Diagnostics,
}

impl SnippetReport {
    /// Deletes orphaned solutions, then projects, then loose files, skipping
    /// anything already removed along with an enclosing directory.
    pub fn delete(&self, sink: &mut dyn MutationSink) -> Result<usize> {
        let mut removed: Vec<ResourceId> = Vec::new();
        let mut count = 0;

        let dirs = self.orphaned_solutions.iter().chain(&self.orphaned_projects);
        for dir in dirs {
            let id = ResourceId::new(dir);
            if removed.iter().any(|r| id == *r || id.is_under(r)) {
                continue;
            }
            sink.delete_dir(dir)?;
            removed.push(id);
            count += 1;
        }

        for file in &self.orphaned_files {
            let id = ResourceId::new(file);
            if removed.iter().any(|r| id.is_under(r)) {
                continue;
            }
            sink.delete_file(file)?;
            count += 1;
        }

        Ok(count)
    }
}

/// True unless the file is an include, shared, misc, TOC or index page.
pub fn is_article_candidate(file: &FileDescriptor, docset_root: &Path) -> bool {
    let relative = file.path.strip_prefix(docset_root).unwrap_or(file.path.as_path());
    if corpus::has_dir_component(relative, NON_ARTICLE_DIRS) {
        return false;
    }
    let stem = file
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    !(stem.eq_ignore_ascii_case("toc") || stem.eq_ignore_ascii_case("index"))
}

/// Runs reachability questions against one docset.
pub struct Analyzer {
    extractor: Extractor,
    resolver: Resolver,
}

impl Analyzer {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Analyzer {
            extractor: config.extractor()?,
            resolver: config.resolver(),
        })
    }

    pub fn from_parts(extractor: Extractor, resolver: Resolver) -> Self {
        Analyzer {
            extractor,
            resolver,
        }
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    fn toc_graph(&self, tocs: &[FileDescriptor], articles: &[FileDescriptor]) -> ReferenceGraph {
        let mut graph = ReferenceGraph::new(
            articles
                .iter()
                .filter(|f| is_article_candidate(f, self.resolver.docset_root()))
                .map(|f| Resource::new(&f.path, Category::Article)),
        );
        graph.link_from_prefiltered(tocs, &self.extractor, &self.resolver, LinkKind::ARTICLE);
        graph
    }

    /// Articles not linked from any TOC file.
    pub fn orphaned_articles(
        &self,
        tocs: &[FileDescriptor],
        articles: &[FileDescriptor],
    ) -> OrphanReport {
        let graph = self.toc_graph(tocs, articles);
        OrphanReport::from_graph(Category::Article, &graph, tocs.len())
    }

    /// Articles that appear in more than one TOC file, with the TOC count.
    pub fn popular_articles(
        &self,
        tocs: &[FileDescriptor],
        articles: &[FileDescriptor],
    ) -> Vec<(PathBuf, usize)> {
        let graph = self.toc_graph(tocs, articles);
        graph
            .resources()
            .filter_map(|r| {
                let count = graph.referrers(&r.id).len();
                (count > 1).then(|| (r.path.clone(), count))
            })
            .collect()
    }

    /// Orphans that are still linked from some file in `linking`, with the link count.
    ///
    /// These are kept when orphaned articles are deleted, so deletion never
    /// leaves a dangling link behind.
    pub fn files_to_keep(
        &self,
        orphans: &[PathBuf],
        linking: &[FileDescriptor],
    ) -> BTreeMap<PathBuf, usize> {
        let mut graph =
            ReferenceGraph::new(orphans.iter().map(|p| Resource::new(p, Category::Article)));
        graph.link_from(
            linking,
            &self.extractor,
            &self.resolver,
            LinkSelect::Kinds(LinkKind::ARTICLE),
        );
        graph
            .resources()
            .filter_map(|r| {
                let count = graph.incoming_count(&r.id);
                (count > 0).then(|| (r.path.clone(), count))
            })
            .collect()
    }

    pub fn media_graph(&self, media: &[FileDescriptor], linking: &[FileDescriptor]) -> ReferenceGraph {
        let mut graph =
            ReferenceGraph::new(media.iter().map(|f| Resource::new(&f.path, Category::Media)));
        graph.link_from(
            linking,
            &self.extractor,
            &self.resolver,
            LinkSelect::Kinds(LinkKind::MEDIA),
        );
        graph
    }

    /// Media files no markdown or YAML file links to.
    pub fn orphaned_media(&self, media: &[FileDescriptor], linking: &[FileDescriptor]) -> OrphanReport {
        let graph = self.media_graph(media, linking);
        OrphanReport::from_graph(Category::Media, &graph, linking.len())
    }

    /// Every media file with the files that reference it.
    pub fn media_catalog(
        &self,
        media: &[FileDescriptor],
        linking: &[FileDescriptor],
    ) -> BTreeMap<PathBuf, Vec<PathBuf>> {
        let graph = self.media_graph(media, linking);
        graph
            .resources()
            .map(|r| {
                let referrers = graph
                    .referrers(&r.id)
                    .into_iter()
                    .map(Path::to_path_buf)
                    .collect();
                (r.path.clone(), referrers)
            })
            .collect()
    }

    /// Include files no `[!INCLUDE]` directive in a markdown or YAML file
    /// points at.
    pub fn orphaned_includes(
        &self,
        includes: &[FileDescriptor],
        linking: &[FileDescriptor],
    ) -> OrphanReport {
        let mut graph = ReferenceGraph::new(
            includes
                .iter()
                .map(|f| Resource::new(&f.path, Category::Include)),
        );
        graph.link_from(
            linking,
            &self.extractor,
            &self.resolver,
            LinkSelect::Kinds(&[LinkKind::Include]),
        );
        OrphanReport::from_graph(Category::Include, &graph, linking.len())
    }

    /// Snippet files and project directories nothing references.
    ///
    /// `stop_at` bounds the upward search for a snippet's project directory.
    pub fn orphaned_snippets(
        &self,
        snippets: &[FileDescriptor],
        solutions: &[Solution],
        markdown: &[FileDescriptor],
        stop_at: &Path,
    ) -> SnippetReport {
        let mut cache = HashMap::new();
        let mut resources: Vec<Resource> = Vec::new();
        for snippet in snippets {
            match corpus::find_project_dir(&snippet.dir, stop_at, &mut cache) {
                Some(project) => {
                    let id = ResourceId::new(&project);
                    if !resources.iter().any(|r| r.id == id) {
                        resources.push(Resource::new(project, Category::Directory));
                    }
                }
                None => resources.push(Resource::new(&snippet.path, Category::Snippet)),
            }
        }

        let mut graph = ReferenceGraph::new(resources);
        graph.link_from(
            markdown,
            &self.extractor,
            &self.resolver,
            LinkSelect::CodeReferences,
        );

        let in_solution =
            |id: &ResourceId| solutions.iter().any(|s| s.project_dirs.contains(id));
        let holds_referenced = |dir: &ResourceId| {
            graph
                .resources()
                .any(|r| (r.id == *dir || r.id.is_under(dir)) && graph.incoming_count(&r.id) > 0)
        };

        let mut orphaned_files = Vec::new();
        let mut orphaned_projects = Vec::new();
        let mut retained = Vec::new();
        let mut projects = Vec::new();
        for resource in graph.resources() {
            let references = graph.incoming_count(&resource.id);
            match resource.category {
                Category::Directory => {
                    let decision = if references > 0 {
                        Decision::Keep
                    } else if in_solution(&resource.id) {
                        Decision::DeferToSolution
                    } else if holds_referenced(&resource.id) {
                        tracing::warn!(
                            "Keeping {}: it holds referenced snippets",
                            resource.path.display()
                        );
                        retained.push(resource.path.clone());
                        Decision::Keep
                    } else {
                        orphaned_projects.push(resource.path.clone());
                        Decision::Delete
                    };
                    projects.push(ProjectStatus {
                        dir: resource.path.clone(),
                        references,
                        decision,
                    });
                }
                _ if references == 0 => orphaned_files.push(resource.path.clone()),
                _ => {}
            }
        }

        let mut orphaned_solutions = Vec::new();
        for solution in solutions {
            if solution
                .project_dirs
                .iter()
                .any(|dir| graph.incoming_count(dir) > 0)
            {
                continue;
            }
            let dir = solution.dir().to_path_buf();
            if retained.contains(&dir) || orphaned_solutions.contains(&dir) {
                continue;
            }
            if holds_referenced(&ResourceId::new(&dir)) {
                tracing::warn!(
                    "Keeping {}: {} is unused, but the directory holds referenced snippets",
                    dir.display(),
                    solution.path.display()
                );
                retained.push(dir);
            } else {
                orphaned_solutions.push(dir);
            }
        }

        let diagnostics = Diagnostics {
            files_scanned: markdown.len(),
            candidates: graph.resources().count(),
            references: graph.edges().len(),
            orphans: orphaned_files.len() + orphaned_projects.len() + orphaned_solutions.len(),
        };

        SnippetReport {
            orphaned_files,
            orphaned_projects,
            orphaned_solutions,
            retained,
            projects,
            diagnostics,
        }
    }
}
