//! Command-line interface definitions.
//!
//! Defines the argument parser and subcommands using clap's derive API.
//! Orphan commands report first and delete only when confirmed; rewrite
//! commands are dry runs unless `--write` is given.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Find orphaned docset files and collapse redirect chains.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Print additional diagnostics to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    pub json: bool,

    /// Glob patterns for directory or file names to skip (e.g., "node_modules", "draft-*").
    /// Entries starting with `.` are always skipped.
    #[arg(short, long, global = true)]
    pub exclude: Vec<String>,
}

/// Where to look, within which docset.
#[derive(Debug, Clone, clap::Args)]
pub struct Target {
    /// Directory to process. Must be inside a docset (a directory tree with a
    /// docfx.json at its root). Prompted for when omitted.
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// URL base path of the docset, e.g. "/dotnet" or "/windows/uwp".
    #[arg(short, long)]
    pub url_base_path: Option<String>,
}

/// Options shared by the orphan commands.
#[derive(Debug, Clone, clap::Args)]
pub struct OrphanArgs {
    #[command(flatten)]
    pub target: Target,

    /// Delete orphans after reporting them (true/false). Prompted for when omitted.
    #[arg(long)]
    pub delete: Option<bool>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report articles that no table of contents links to.
    Articles(OrphanArgs),

    /// Report media files that no markdown or YAML file links to.
    Media(OrphanArgs),

    /// List every media file with the files that reference it.
    CatalogMedia(Target),

    /// Report files in `includes` or `_shared` directories that nothing includes.
    Includes(OrphanArgs),

    /// Report snippet files and project directories that no article references.
    Snippets(OrphanArgs),

    /// List articles that appear in more than one table of contents.
    Popular(Target),

    /// Repoint links to redirected articles at their final target.
    ReplaceRedirects {
        #[command(flatten)]
        target: Target,

        /// Redirect table to read. Defaults to the repository's
        /// .openpublishing.redirection.json.
        #[arg(long)]
        redirects: Option<PathBuf>,

        /// Actually modify files (default is dry-run).
        #[arg(long)]
        write: bool,
    },

    /// Replace site-absolute links into this docset with file-relative links.
    RelativeLinks {
        #[command(flatten)]
        target: Target,

        /// Actually modify files (default is dry-run).
        #[arg(long)]
        write: bool,
    },

    /// Collapse redirect chains so every entry points at its final target.
    RemoveHops {
        #[command(flatten)]
        target: Target,

        /// Redirect table to rewrite. Defaults to the repository's
        /// .openpublishing.redirection.json.
        #[arg(long)]
        redirects: Option<PathBuf>,

        /// Actually modify the table (default is dry-run).
        #[arg(long)]
        write: bool,
    },

    /// Show which files each command would examine.
    Scan(Target),
}

/// Parses `--exclude` values into glob patterns.
pub fn parse_excludes(raw: &[String]) -> anyhow::Result<Vec<glob::Pattern>> {
    raw.iter()
        .map(|p| {
            glob::Pattern::new(p)
                .map_err(|e| anyhow::anyhow!("Invalid exclude pattern '{}': {}", p, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_orphan_command_with_delete_flag() {
        let args = Args::parse_from([
            "docs-sweep",
            "media",
            "--dir",
            "docs/media",
            "--delete",
            "false",
            "-e",
            "node_modules",
        ]);
        assert_eq!(args.exclude, vec!["node_modules"]);
        match args.command {
            Commands::Media(orphans) => {
                assert_eq!(orphans.delete, Some(false));
                assert_eq!(orphans.target.dir, Some(PathBuf::from("docs/media")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rewrite_commands_default_to_dry_run() {
        let args = Args::parse_from(["docs-sweep", "remove-hops", "-u", "/dotnet", "--json"]);
        assert!(args.json);
        match args.command {
            Commands::RemoveHops { target, write, redirects } => {
                assert!(!write);
                assert!(redirects.is_none());
                assert_eq!(target.url_base_path.as_deref(), Some("/dotnet"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_exclude_glob() {
        assert!(parse_excludes(&["[".to_string()]).is_err());
        assert_eq!(parse_excludes(&["*.tmp".to_string()]).unwrap().len(), 1);
    }
}
