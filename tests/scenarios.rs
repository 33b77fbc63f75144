use docs_sweep::analyzer::Analyzer;
use docs_sweep::config::{Docset, EngineConfig, OPS_CONFIG_FILE, REDIRECTION_FILE};
use docs_sweep::corpus;
use docs_sweep::redirect::{Redirect, RedirectTable, collapse_hops};
use docs_sweep::resolve::relative_path;
use docs_sweep::rewriter::{apply_rewrites, plan_redirect_rewrites, plan_relative_rewrites};
use docs_sweep::sink::{DryRunSink, FsSink};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, text).unwrap();
    path
}

/// A repository with a docset at `docs/`.
fn repo() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().canonicalize().unwrap();
    write(&repo, OPS_CONFIG_FILE, "{}");
    write(&repo, "docs/docfx.json", "{}");
    (tmp, repo)
}

fn config(repo: &Path, base: Option<&str>) -> EngineConfig {
    EngineConfig::new(Docset::discover(&repo.join("docs")).unwrap()).with_url_base_path(base)
}

#[test]
fn article_missing_from_every_toc_is_the_only_orphan() {
    let (_tmp, repo) = repo();
    let docs = repo.join("docs");
    write(&docs, "toc.md", "# [A](a.md)\n");
    write(&docs, "a.md", "# A\n");
    let b = write(&docs, "b.md", "# B\n");

    let config = config(&repo, None);
    let analyzer = Analyzer::new(&config).unwrap();
    let tocs = corpus::toc_files(&docs, &[]).unwrap();
    let articles = corpus::markdown_files(&docs, &["snippets"], &[]).unwrap();

    let report = analyzer.orphaned_articles(&tocs, &articles);
    assert_eq!(report.orphans, vec![b.clone()]);

    let deleted = report.delete(&BTreeMap::new(), &mut FsSink).unwrap();
    assert_eq!(deleted, 1);
    assert!(!b.exists());
    assert!(docs.join("a.md").exists());
}

#[test]
fn reachable_resources_are_never_orphans() {
    let (_tmp, repo) = repo();
    let docs = repo.join("docs");
    write(&docs, "core/toc.yml", "- name: Intro\n  href: intro.md\n- name: Guide\n  href: ~/guide/start\n");
    write(&docs, "core/intro.md", "![diagram](./media/diagram.png)\n[!INCLUDE [note](../includes/note.md)]\n");
    write(&docs, "core/index.yml", "### YamlMime:Landing\nbody: |\n  [!INCLUDE [banner](../includes/banner.md)]\n");
    write(&docs, "guide/start.md", "<img src=\"../core/media/photo.jpg\" alt=\"x\">\n");
    write(&docs, "core/media/diagram.png", "");
    write(&docs, "core/media/photo.jpg", "");
    let stray = write(&docs, "core/media/stray.gif", "");
    write(&docs, "includes/note.md", "");
    write(&docs, "includes/banner.md", "");
    let unused = write(&docs, "includes/unused.md", "");

    let config = config(&repo, None);
    let analyzer = Analyzer::new(&config).unwrap();
    let tocs = corpus::toc_files(&docs, &[]).unwrap();
    let articles = corpus::markdown_files(&docs, &[], &[]).unwrap();
    assert!(analyzer.orphaned_articles(&tocs, &articles).orphans.is_empty());

    let media = corpus::enumerate_content_files(&docs, &["png", "jpg", "gif"], &[]).unwrap();
    let linking = corpus::linking_files(&docs, &[]).unwrap();
    assert_eq!(analyzer.orphaned_media(&media, &linking).orphans, vec![stray]);

    let includes = corpus::include_files(&docs, &[]).unwrap();
    assert_eq!(analyzer.orphaned_includes(&includes, &linking).orphans, vec![unused]);
}

#[test]
fn redirect_chain_collapses_to_final_target() {
    let report = collapse_hops(&[
        Redirect::new("/old1", "/old2"),
        Redirect::new("/old2", "/final"),
    ]);
    assert_eq!(
        report.redirects,
        vec![Redirect::new("/old1", "/final"), Redirect::new("/old2", "/final")]
    );
    assert_eq!(collapse_hops(&report.redirects).redirects, report.redirects);
}

#[test]
fn redirect_cycle_is_reported_and_left_alone() {
    let input = vec![Redirect::new("/a", "/b"), Redirect::new("/b", "/a")];
    let report = collapse_hops(&input);
    assert_eq!(report.redirects, input);
    assert_eq!(report.cycles.len(), 2);
}

#[test]
fn redirected_link_is_rewritten_to_the_file_behind_the_final_target() {
    let (_tmp, repo) = repo();
    let docs = repo.join("docs");
    let page = write(&docs, "articles/page.md", "Read [text](/base/articles/old1).\n");
    let final_page = write(&docs, "articles/final.md", "");

    let config = config(&repo, Some("/base"));
    let analyzer = Analyzer::new(&config).unwrap();
    let report = collapse_hops(&[
        Redirect::new("/base/articles/old1", "/base/articles/old2"),
        Redirect::new("/base/articles/old2", "/base/articles/final"),
    ]);
    let files = corpus::linking_files(&docs, &[]).unwrap();
    let rewrites = plan_redirect_rewrites(
        &files,
        analyzer.extractor(),
        analyzer.resolver(),
        &report.lookup(),
    );
    assert_eq!(apply_rewrites(&rewrites, &mut FsSink).unwrap(), 1);
    assert_eq!(fs::read_to_string(&page).unwrap(), "Read [text](final.md).\n");

    // Without a backing file the link stays as written.
    fs::remove_file(final_page).unwrap();
    fs::write(&page, "Read [text](/base/articles/old1).\n").unwrap();
    let rewrites = plan_redirect_rewrites(
        &files,
        analyzer.extractor(),
        analyzer.resolver(),
        &report.lookup(),
    );
    assert!(rewrites.is_empty());
}

#[test]
fn links_with_queries_are_never_rewritten() {
    let (_tmp, repo) = repo();
    let docs = repo.join("docs");
    write(&docs, "articles/target.md", "");
    let page = write(
        &docs,
        "articles/page.md",
        "[a](/base/articles/target?view=vs-2019)\n[b](/base/articles/target)\n",
    );
    let toc = write(&docs, "toc.yml", "- href: /base/articles/target?view=vs-2019\n");

    let config = config(&repo, Some("/base"));
    let analyzer = Analyzer::new(&config).unwrap();
    let files = corpus::linking_files(&docs, &[]).unwrap();

    let relative = plan_relative_rewrites(&files, analyzer.extractor(), analyzer.resolver());
    let redirects = collapse_hops(&[Redirect::new("/base/articles/target", "/base/articles/page")]);
    let redirected = plan_redirect_rewrites(
        &files,
        analyzer.extractor(),
        analyzer.resolver(),
        &redirects.lookup(),
    );

    let mut sink = DryRunSink::new();
    apply_rewrites(&relative, &mut sink).unwrap();
    apply_rewrites(&redirected, &mut sink).unwrap();

    let text = sink.pending_text(&page).unwrap();
    assert!(text.contains("[a](/base/articles/target?view=vs-2019)"));
    assert!(!text.contains("[b](/base/articles/target)"));
    assert!(sink.pending_text(&toc).is_none());
}

#[test]
fn relative_paths_resolve_back_to_the_same_file() {
    let (_tmp, repo) = repo();
    let docs = repo.join("docs");
    let target = write(&docs, "a/b/target.md", "");
    let from = docs.join("c/d");
    fs::create_dir_all(&from).unwrap();

    let config = config(&repo, None);
    let resolver = config.resolver();
    let link = relative_path(&from, &target);
    assert_eq!(link, "../../a/b/target.md");
    assert_eq!(resolver.resolve(&link, &from).unwrap(), Some(target));
}

#[test]
fn unreferenced_project_is_an_orphaned_directory() {
    let (_tmp, repo) = repo();
    let docs = repo.join("docs");
    write(&docs, "Samples/ProjA/ProjA.csproj", "<Project />");
    write(&docs, "Samples/ProjA/foo.cs", "class Foo {}");
    write(&docs, "articles/a.md", "No code here.\n");

    let config = config(&repo, None);
    let analyzer = Analyzer::new(&config).unwrap();
    let snippets = corpus::enumerate_content_files(&docs, &["cs", "vb"], &[]).unwrap();
    let markdown = corpus::markdown_files(&docs, &[], &[]).unwrap();
    let report = analyzer.orphaned_snippets(&snippets, &[], &markdown, &docs);

    assert_eq!(report.orphaned_projects, vec![docs.join("Samples/ProjA")]);
    assert!(report.orphaned_files.is_empty());

    report.delete(&mut FsSink).unwrap();
    assert!(!docs.join("Samples/ProjA").exists());
}

#[test]
fn any_path_under_a_project_keeps_it_alive() {
    let (_tmp, repo) = repo();
    let docs = repo.join("docs");
    write(&docs, "Samples/ProjA/ProjA.csproj", "");
    write(&docs, "Samples/ProjA/foo.cs", "");
    write(&docs, "Samples/ProjA/bar.cs", "");
    write(&docs, "articles/a.md", "Download [the project](../Samples/ProjA/ProjA.csproj).\n");

    let config = config(&repo, None);
    let analyzer = Analyzer::new(&config).unwrap();
    let snippets = corpus::enumerate_content_files(&docs, &["cs"], &[]).unwrap();
    let markdown = corpus::markdown_files(&docs, &[], &[]).unwrap();
    let report = analyzer.orphaned_snippets(&snippets, &[], &markdown, &docs);

    assert!(report.orphaned_projects.is_empty());
    assert!(report.orphaned_files.is_empty());
}

#[test]
fn deleting_snippets_never_removes_referenced_code() {
    let (_tmp, repo) = repo();
    let docs = repo.join("docs");
    write(&docs, "samples/Outer/Outer.csproj", "");
    write(&docs, "samples/Outer/Program.cs", "");
    let lib = write(&docs, "samples/Outer/Inner/Inner.csproj", "");
    write(&docs, "samples/Outer/Inner/Lib.cs", "");
    write(
        &docs,
        "samples/app/App.sln",
        "Project(\"{A}\") = \"Old\", \"Old\\Old.csproj\", \"{1}\"\nEndProject\n",
    );
    write(&docs, "samples/app/Old/Old.csproj", "");
    write(&docs, "samples/app/Old/old.cs", "");
    let helper = write(&docs, "samples/app/helper.cs", "");
    write(
        &docs,
        "articles/a.md",
        "[!code-csharp[x](../samples/Outer/Inner/Lib.cs)]\n[!code-csharp[y](../samples/app/helper.cs)]\n",
    );

    let config = config(&repo, None);
    let analyzer = Analyzer::new(&config).unwrap();
    let snippets = corpus::enumerate_content_files(&docs, &["cs"], &[]).unwrap();
    let solutions = corpus::solutions(&docs, &[]).unwrap();
    let markdown = corpus::markdown_files(&docs, &[], &[]).unwrap();
    let report = analyzer.orphaned_snippets(&snippets, &solutions, &markdown, &docs);

    assert!(report.orphaned_projects.is_empty());
    assert!(report.orphaned_solutions.is_empty());
    assert_eq!(report.retained, vec![docs.join("samples/app")]);

    report.delete(&mut FsSink).unwrap();
    assert!(lib.exists());
    assert!(helper.exists());
    assert!(docs.join("samples/Outer/Program.cs").exists());
}

#[test]
fn redirect_table_hops_are_removed_on_disk() {
    let (_tmp, repo) = repo();
    let table_path = write(
        &repo,
        REDIRECTION_FILE,
        r#"{"redirections":[
            {"source_path":"docs/old1.md","redirect_url":"/base/old2"},
            {"source_path":"docs/old2.md","redirect_url":"/base/final","redirect_document_id":false}
        ]}"#,
    );

    let config = config(&repo, Some("/base"));
    assert_eq!(config.docset.redirection_file(), Some(table_path.clone()));

    let mut table = RedirectTable::load(&table_path).unwrap();
    let report = collapse_hops(&table.redirects(&config.docset, config.url_base_path.as_deref()));
    assert_eq!(table.apply(&report), 1);
    table.save(&table_path, &mut FsSink).unwrap();

    let reloaded = RedirectTable::load(&table_path).unwrap();
    let targets: Vec<_> = reloaded
        .redirections
        .iter()
        .map(|r| r.redirect_url.as_str())
        .collect();
    assert_eq!(targets, vec!["/base/final", "/base/final"]);
    assert_eq!(reloaded.redirections[1].redirect_document_id, Some(false));
}
