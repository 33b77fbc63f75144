//! docs-sweep library for finding unreferenced docset files and collapsing
//! redirect chains.
//!
//! The engine works in three phases:
//!
//! 1. **Enumeration**: Collect the files a question is about ([`corpus`])
//! 2. **Analysis**: Extract links, resolve them to files and count the
//!    references landing on each resource ([`extract`], [`resolve`],
//!    [`graph`], [`analyzer`]), or collapse the redirect table ([`redirect`])
//! 3. **Mutation**: Delete orphans or rewrite links through a
//!    [`sink::MutationSink`], which may be a dry run
//!
//! # Example
//!
//! ```no_run
//! use docs_sweep::{Analyzer, Docset, EngineConfig, corpus};
//! use std::path::Path;
//!
//! let docset = Docset::discover(Path::new("./docs")).unwrap();
//! let config = EngineConfig::new(docset);
//! let root = config.docset.root.clone();
//!
//! let tocs = corpus::toc_files(&root, &config.exclude).unwrap();
//! let articles = corpus::markdown_files(&root, &["snippets"], &config.exclude).unwrap();
//!
//! let analyzer = Analyzer::new(&config).unwrap();
//! let report = analyzer.orphaned_articles(&tocs, &articles);
//! println!("Found {} orphaned articles", report.orphans.len());
//! ```

pub mod analyzer;
pub mod config;
pub mod corpus;
pub mod error;
pub mod extract;
pub mod graph;
pub mod redirect;
pub mod resolve;
pub mod rewriter;
pub mod sink;

// Re-export commonly used types at crate root
pub use analyzer::{Analyzer, Diagnostics, OrphanReport, SnippetReport};
pub use config::{Docset, EngineConfig};
pub use error::EngineError;
pub use redirect::{CollapseReport, RedirectTable, collapse_hops};
pub use resolve::{ResourceId, Resolver};
pub use sink::{DryRunSink, FsSink, MutationSink};
