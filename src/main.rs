//! docs-sweep: find orphaned docset files and collapse redirect chains.
//!
//! Every command locates the docset (the nearest `docfx.json` above the
//! given directory), runs a read-only analysis, prints the full report and
//! only then deletes or rewrites anything.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, Commands, OrphanArgs, Target};
use colored::Colorize;
use dialoguer::{Confirm, Input};
use docs_sweep::analyzer::{Analyzer, Decision, Diagnostics, OrphanReport, SnippetReport};
use docs_sweep::config::{Docset, EngineConfig};
use docs_sweep::corpus;
use docs_sweep::redirect::{CollapseReport, RedirectTable, collapse_hops};
use docs_sweep::rewriter::{self, LinkRewrite};
use docs_sweep::sink::{DryRunSink, FsSink};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "docs_sweep={}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let excludes = cli::parse_excludes(&args.exclude)?;
    let json = args.json;
    let started = Instant::now();

    match args.command {
        Commands::Articles(orphans) => cmd_articles(orphans, excludes, json),
        Commands::Media(orphans) => cmd_media(orphans, excludes, json),
        Commands::CatalogMedia(target) => cmd_catalog_media(target, excludes, json),
        Commands::Includes(orphans) => cmd_includes(orphans, excludes, json),
        Commands::Snippets(orphans) => cmd_snippets(orphans, excludes, json),
        Commands::Popular(target) => cmd_popular(target, excludes, json),
        Commands::ReplaceRedirects {
            target,
            redirects,
            write,
        } => cmd_replace_redirects(target, redirects, write, excludes, json),
        Commands::RelativeLinks { target, write } => {
            cmd_relative_links(target, write, excludes, json)
        }
        Commands::RemoveHops {
            target,
            redirects,
            write,
        } => cmd_remove_hops(target, redirects, write, excludes, json),
        Commands::Scan(target) => cmd_scan(target, excludes),
    }?;

    if !json {
        println!(
            "\n{} Elapsed time: {:.2?}",
            "info:".blue().bold(),
            started.elapsed()
        );
    }

    Ok(())
}

/// A resolved working directory inside a discovered docset.
struct Session {
    config: EngineConfig,
    dir: PathBuf,
}

impl Session {
    fn open(
        target: Target,
        prompt: &str,
        needs_base_path: bool,
        excludes: Vec<glob::Pattern>,
    ) -> Result<Self> {
        let dir = match target.dir {
            Some(dir) => dir,
            None => PathBuf::from(prompt_text(prompt)?),
        };
        let docset = Docset::discover(&dir)?;
        let dir = docset.ensure_contains(&dir)?;

        let base = match target.url_base_path {
            Some(base) => Some(base),
            None if needs_base_path => Some(prompt_text(
                "URL base path for this docset, for example '/dotnet' or '/windows/uwp'",
            )?),
            None => None,
        };

        tracing::debug!("Docset root: {}", docset.root.display());
        let config = EngineConfig::new(docset)
            .with_url_base_path(base.as_deref())
            .with_excludes(excludes);

        Ok(Session { config, dir })
    }

    fn root(&self) -> &Path {
        &self.config.docset.root
    }

    fn exclude(&self) -> &[glob::Pattern] {
        &self.config.exclude
    }

    fn analyzer(&self) -> Result<Analyzer> {
        Ok(Analyzer::new(&self.config)?)
    }

    fn show(&self, path: &Path) -> String {
        path.strip_prefix(self.root())
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

fn prompt_text(prompt: &str) -> Result<String> {
    let value = Input::<String>::new()
        .with_prompt(prompt)
        .interact_text()
        .context("Failed to read input")?;
    Ok(value.trim().to_string())
}

/// Resolves the delete decision, prompting only when the flag is absent.
fn confirm_delete(flag: Option<bool>, json: bool, count: usize, what: &str) -> Result<bool> {
    if count == 0 {
        return Ok(false);
    }
    match flag {
        Some(delete) => Ok(delete),
        None if json => Ok(false),
        None => Confirm::new()
            .with_prompt(format!("Delete {} {}?", count, what))
            .default(false)
            .interact()
            .context("Failed to read confirmation"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_diagnostics(d: &Diagnostics) {
    println!(
        "\n{} Files scanned: {}, Candidates: {}, References: {}, Orphans: {}",
        "Diagnostics:".bold(),
        d.files_scanned,
        d.candidates,
        d.references,
        d.orphans
    );
}

fn print_orphans(session: &Session, report: &OrphanReport, what: &str) {
    print_diagnostics(&report.diagnostics);

    if report.orphans.is_empty() {
        println!("{} No orphaned {} found", "ok:".green().bold(), what);
        return;
    }

    println!(
        "\n{} {} orphaned {}:\n",
        "Found".red().bold(),
        report.orphans.len(),
        what
    );
    for orphan in &report.orphans {
        println!("  {}", session.show(orphan).red());
    }
}

#[derive(Serialize)]
struct ArticleResult<'a> {
    #[serde(flatten)]
    report: &'a OrphanReport,
    kept: &'a BTreeMap<PathBuf, usize>,
}

fn cmd_articles(args: OrphanArgs, excludes: Vec<glob::Pattern>, json: bool) -> Result<()> {
    let session = Session::open(
        args.target,
        "Directory to check for orphaned articles",
        false,
        excludes,
    )?;
    let analyzer = session.analyzer()?;

    tracing::info!("Searching {} for orphaned articles", session.dir.display());
    let tocs = corpus::toc_files(session.root(), session.exclude())?;
    let articles = corpus::markdown_files(&session.dir, &["snippets"], session.exclude())?;
    let report = analyzer.orphaned_articles(&tocs, &articles);

    let linking = corpus::linking_files(session.root(), session.exclude())?;
    let keep = analyzer.files_to_keep(&report.orphans, &linking);

    if json {
        print_json(&ArticleResult {
            report: &report,
            kept: &keep,
        })?;
    } else {
        print_orphans(&session, &report, "article(s)");
        if !keep.is_empty() {
            println!(
                "\n{} {} orphan(s) are still linked from other files and will be kept:\n",
                "warn:".yellow().bold(),
                keep.len()
            );
            for (file, links) in &keep {
                println!("  {} {}", session.show(file), format!("({} link(s))", links).dimmed());
            }
        }
    }

    let deletable = report.orphans.len().saturating_sub(keep.len());
    if confirm_delete(args.delete, json, deletable, "orphaned article(s)")? {
        let deleted = report.delete(&keep, &mut FsSink)?;
        println!("{} Deleted {} article(s)", "ok:".green().bold(), deleted);
    }

    Ok(())
}

fn media_files(session: &Session) -> Result<Vec<corpus::FileDescriptor>> {
    let extensions: Vec<&str> = session
        .config
        .media_extensions
        .iter()
        .map(String::as_str)
        .collect();
    corpus::enumerate_content_files(&session.dir, &extensions, session.exclude())
}

fn cmd_media(args: OrphanArgs, excludes: Vec<glob::Pattern>, json: bool) -> Result<()> {
    let session = Session::open(
        args.target,
        "Directory to check for orphaned media files",
        false,
        excludes,
    )?;
    let analyzer = session.analyzer()?;

    tracing::info!("Searching {} for orphaned media", session.dir.display());
    let media = media_files(&session)?;
    let linking = corpus::linking_files(session.root(), session.exclude())?;
    let report = analyzer.orphaned_media(&media, &linking);

    if json {
        print_json(&report)?;
    } else {
        print_orphans(&session, &report, "media file(s)");
    }

    if confirm_delete(args.delete, json, report.orphans.len(), "orphaned media file(s)")? {
        let deleted = report.delete(&BTreeMap::new(), &mut FsSink)?;
        println!("{} Deleted {} media file(s)", "ok:".green().bold(), deleted);
    }

    Ok(())
}

fn cmd_catalog_media(target: Target, excludes: Vec<glob::Pattern>, json: bool) -> Result<()> {
    let session = Session::open(
        target,
        "Directory containing the media files to catalog",
        false,
        excludes,
    )?;
    let analyzer = session.analyzer()?;

    let media = media_files(&session)?;
    let linking = corpus::linking_files(session.root(), session.exclude())?;
    let catalog = analyzer.media_catalog(&media, &linking);

    if json {
        return print_json(&catalog);
    }

    for (file, referrers) in &catalog {
        if referrers.is_empty() {
            println!("{} {}", session.show(file), "(unreferenced)".dimmed());
            continue;
        }
        println!("{}", session.show(file));
        for referrer in referrers {
            println!("  {} {}", "<-".green(), session.show(referrer));
        }
    }

    Ok(())
}

fn cmd_includes(args: OrphanArgs, excludes: Vec<glob::Pattern>, json: bool) -> Result<()> {
    let session = Session::open(
        args.target,
        "Directory to check for orphaned include files",
        false,
        excludes,
    )?;
    let analyzer = session.analyzer()?;

    let includes = corpus::include_files(&session.dir, session.exclude())?;
    if includes.is_empty() {
        println!(
            "{} No .md files were found in any directory named 'includes' or '_shared'",
            "info:".blue().bold()
        );
        return Ok(());
    }
    let linking = corpus::linking_files(session.root(), session.exclude())?;
    let report = analyzer.orphaned_includes(&includes, &linking);

    if json {
        print_json(&report)?;
    } else {
        print_orphans(&session, &report, "include file(s)");
    }

    if confirm_delete(args.delete, json, report.orphans.len(), "orphaned include file(s)")? {
        let deleted = report.delete(&BTreeMap::new(), &mut FsSink)?;
        println!("{} Deleted {} include file(s)", "ok:".green().bold(), deleted);
    }

    Ok(())
}

fn print_snippet_report(session: &Session, report: &SnippetReport) {
    print_diagnostics(&report.diagnostics);

    for project in &report.projects {
        let status = match project.decision {
            Decision::Keep => "keep".green(),
            Decision::Delete => "delete".red(),
            Decision::DeferToSolution => "solution decides".yellow(),
        };
        tracing::debug!(
            "Project {} has {} reference(s): {}",
            session.show(&project.dir),
            project.references,
            status
        );
    }

    if !report.retained.is_empty() {
        println!(
            "\n{} {} unreferenced director(ies) hold referenced snippets and will be kept:\n",
            "warn:".yellow().bold(),
            report.retained.len()
        );
        for dir in &report.retained {
            println!("  {}", session.show(dir));
        }
    }

    if report.orphaned_files.is_empty()
        && report.orphaned_projects.is_empty()
        && report.orphaned_solutions.is_empty()
    {
        println!("{} No orphaned snippets found", "ok:".green().bold());
        return;
    }

    let sections = [
        ("solution directories", &report.orphaned_solutions),
        ("project directories", &report.orphaned_projects),
        ("snippet files", &report.orphaned_files),
    ];
    for (what, paths) in sections {
        if paths.is_empty() {
            continue;
        }
        println!("\n{} {} orphaned {}:\n", "Found".red().bold(), paths.len(), what);
        for path in paths {
            println!("  {}", session.show(path).red());
        }
    }
}

fn cmd_snippets(args: OrphanArgs, excludes: Vec<glob::Pattern>, json: bool) -> Result<()> {
    let session = Session::open(
        args.target,
        "Directory to check for orphaned snippet files",
        false,
        excludes,
    )?;
    let analyzer = session.analyzer()?;

    let extensions: Vec<&str> = session
        .config
        .snippet_extensions
        .iter()
        .map(String::as_str)
        .collect();
    let snippets = corpus::enumerate_content_files(&session.dir, &extensions, session.exclude())?;
    if snippets.is_empty() {
        println!(
            "{} No {} files were found",
            "info:".blue().bold(),
            extensions.join("/")
        );
        return Ok(());
    }
    let solutions = corpus::solutions(&session.dir, session.exclude())?;
    let markdown = corpus::markdown_files(session.root(), &[], session.exclude())?;
    tracing::info!(
        "Checking {} snippet file(s) and {} solution(s) against {} article(s)",
        snippets.len(),
        solutions.len(),
        markdown.len()
    );

    let report = analyzer.orphaned_snippets(&snippets, &solutions, &markdown, session.root());

    if json {
        print_json(&report)?;
    } else {
        print_snippet_report(&session, &report);
    }

    let total = report.orphaned_files.len()
        + report.orphaned_projects.len()
        + report.orphaned_solutions.len();
    if confirm_delete(args.delete, json, total, "orphaned snippet file(s) and directories")? {
        let deleted = report.delete(&mut FsSink)?;
        println!("{} Deleted {} file(s) and directories", "ok:".green().bold(), deleted);
    }

    Ok(())
}

fn cmd_popular(target: Target, excludes: Vec<glob::Pattern>, json: bool) -> Result<()> {
    let session = Session::open(
        target,
        "Directory containing the articles to rank",
        false,
        excludes,
    )?;
    let analyzer = session.analyzer()?;

    let tocs = corpus::toc_files(session.root(), session.exclude())?;
    let articles = corpus::markdown_files(&session.dir, &["snippets"], session.exclude())?;
    let popular = analyzer.popular_articles(&tocs, &articles);

    if json {
        return print_json(&popular);
    }

    if popular.is_empty() {
        println!("{} No article appears in more than one TOC", "ok:".green().bold());
        return Ok(());
    }
    for (file, count) in &popular {
        println!("  {} {}", session.show(file), format!("({} TOCs)", count).dimmed());
    }

    Ok(())
}

fn redirect_table_path(explicit: Option<PathBuf>, docset: &Docset) -> Result<PathBuf> {
    explicit
        .or_else(|| docset.redirection_file())
        .context("No redirect table found; pass --redirects")
}

fn report_cycles(report: &CollapseReport) {
    for cycle in &report.cycles {
        tracing::warn!("{}", cycle.to_error());
    }
}

fn finish_rewrites(session: &Session, rewrites: &[LinkRewrite], write: bool, json: bool) -> Result<()> {
    let applied = if write {
        rewriter::apply_rewrites(rewrites, &mut FsSink)?
    } else {
        rewriter::apply_rewrites(rewrites, &mut DryRunSink::new())?
    };

    if json {
        #[derive(Serialize)]
        struct RewriteResult<'a> {
            rewrites: &'a [LinkRewrite],
            applied: usize,
            written: bool,
        }
        return print_json(&RewriteResult {
            rewrites,
            applied,
            written: write,
        });
    }

    if rewrites.is_empty() {
        println!("{} No links to rewrite", "info:".blue().bold());
        return Ok(());
    }

    let mut current: Option<&Path> = None;
    for rewrite in rewrites {
        if current != Some(rewrite.file.as_path()) {
            println!(
                "\n{} {}",
                if write { "Updating:" } else { "Would update:" }
                    .yellow()
                    .bold(),
                session.show(&rewrite.file)
            );
            current = Some(rewrite.file.as_path());
        }
        println!(
            "  {} -> {}",
            rewrite.old_target.red(),
            rewrite.new_target.green()
        );
    }

    println!(
        "\n{} {} link(s) {}",
        "ok:".green().bold(),
        applied,
        if write { "rewritten" } else { "would be rewritten" }
    );
    if !write {
        println!("{} Use --write to apply changes", "hint:".cyan().bold());
    }

    Ok(())
}

fn cmd_replace_redirects(
    target: Target,
    redirects: Option<PathBuf>,
    write: bool,
    excludes: Vec<glob::Pattern>,
    json: bool,
) -> Result<()> {
    let session = Session::open(
        target,
        "Directory containing the articles with links to fix",
        true,
        excludes,
    )?;
    let analyzer = session.analyzer()?;

    let table_path = redirect_table_path(redirects, &session.config.docset)?;
    let table = RedirectTable::load(&table_path)?;
    tracing::info!(
        "Loaded {} redirect(s) from {}",
        table.redirections.len(),
        table_path.display()
    );

    // Links are repointed at terminal targets, never at intermediate hops.
    let report = collapse_hops(&table.redirects(
        &session.config.docset,
        session.config.url_base_path.as_deref(),
    ));
    report_cycles(&report);

    let files = corpus::linking_files(&session.dir, session.exclude())?;
    let rewrites = rewriter::plan_redirect_rewrites(
        &files,
        analyzer.extractor(),
        analyzer.resolver(),
        &report.lookup(),
    );

    finish_rewrites(&session, &rewrites, write, json)
}

fn cmd_relative_links(
    target: Target,
    write: bool,
    excludes: Vec<glob::Pattern>,
    json: bool,
) -> Result<()> {
    let session = Session::open(
        target,
        "Directory containing the articles with links to fix",
        true,
        excludes,
    )?;
    if session.config.docset.repo_root.as_deref() == Some(session.dir.as_path()) {
        anyhow::bail!(
            "'{}' is the repository root; choose a subdirectory to rewrite links in",
            session.dir.display()
        );
    }
    let analyzer = session.analyzer()?;

    let files = corpus::linking_files(&session.dir, session.exclude())?;
    let rewrites = rewriter::plan_relative_rewrites(&files, analyzer.extractor(), analyzer.resolver());

    finish_rewrites(&session, &rewrites, write, json)
}

#[derive(Serialize)]
struct HopResult<'a> {
    table: &'a Path,
    #[serde(flatten)]
    report: &'a CollapseReport,
    changed: usize,
    written: bool,
}

fn cmd_remove_hops(
    target: Target,
    redirects: Option<PathBuf>,
    write: bool,
    excludes: Vec<glob::Pattern>,
    json: bool,
) -> Result<()> {
    let session = Session::open(
        target,
        "Directory containing the docfx.json file",
        true,
        excludes,
    )?;

    let table_path = redirect_table_path(redirects, &session.config.docset)?;
    let mut table = RedirectTable::load(&table_path)?;
    let report = collapse_hops(&table.redirects(
        &session.config.docset,
        session.config.url_base_path.as_deref(),
    ));
    report_cycles(&report);
    let changed = table.apply(&report);

    if changed > 0 {
        if write {
            table.save(&table_path, &mut FsSink)?;
        } else {
            table.save(&table_path, &mut DryRunSink::new())?;
        }
    }

    if json {
        return print_json(&HopResult {
            table: &table_path,
            report: &report,
            changed,
            written: write && changed > 0,
        });
    }

    for hop in &report.collapsed {
        println!(
            "  {} {} -> {}",
            hop.source.dimmed(),
            hop.from.red(),
            hop.to.green()
        );
    }
    if !report.cycles.is_empty() {
        println!(
            "\n{} {} redirect(s) are part of a cycle and were left unchanged",
            "warn:".yellow().bold(),
            report.cycles.len()
        );
    }
    if changed == 0 {
        println!("{} No redirect hops found", "ok:".green().bold());
    } else if write {
        println!("\n{} Collapsed {} redirect(s)", "ok:".green().bold(), changed);
    } else {
        println!(
            "\n{} {} redirect(s) would be collapsed. Use --write to apply changes",
            "hint:".cyan().bold(),
            changed
        );
    }

    Ok(())
}

fn cmd_scan(target: Target, excludes: Vec<glob::Pattern>) -> Result<()> {
    let session = Session::open(target, "Directory to scan", false, excludes)?;
    let (root, dir, exclude) = (session.root(), session.dir.as_path(), session.exclude());

    let snippet_extensions: Vec<&str> = session
        .config
        .snippet_extensions
        .iter()
        .map(String::as_str)
        .collect();

    let groups = [
        ("TOC files", corpus::toc_files(root, exclude)?),
        ("Article candidates", corpus::markdown_files(dir, &["snippets"], exclude)?),
        ("Linking files", corpus::linking_files(root, exclude)?),
        ("Media files", media_files(&session)?),
        ("Include files", corpus::include_files(dir, exclude)?),
        (
            "Snippet files",
            corpus::enumerate_content_files(dir, &snippet_extensions, exclude)?,
        ),
    ];

    println!("Docset root: {}", root.display());
    for (title, files) in &groups {
        println!("\n{} ({}):", title.bold(), files.len());
        for file in files {
            println!("  {}", session.show(&file.path));
        }
    }

    let solutions = corpus::solutions(dir, exclude)?;
    println!("\n{} ({}):", "Solutions".bold(), solutions.len());
    for solution in &solutions {
        println!(
            "  {} {}",
            session.show(&solution.path),
            format!("({} project(s))", solution.project_dirs.len()).dimmed()
        );
    }

    Ok(())
}
