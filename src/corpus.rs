//! Corpus enumeration.
//!
//! Recursively walks a docset to collect the files each analysis works on,
//! skipping hidden entries and any user-supplied exclusion globs. Also finds
//! the project directory a snippet belongs to and parses `.sln` files into
//! the project directories they list.

use crate::resolve::ResourceId;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    pub path: PathBuf,
    /// Lowercase extension without the dot.
    pub extension: String,
    /// Containing directory.
    pub dir: PathBuf,
}

impl FileDescriptor {
    fn from_path(path: PathBuf) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        FileDescriptor {
            path,
            extension,
            dir,
        }
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::new(&self.path)
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Collects files under `root` whose extension is in `extensions`, in path order.
pub fn enumerate_content_files(
    root: &Path,
    extensions: &[&str],
    exclude: &[glob::Pattern],
) -> Result<Vec<FileDescriptor>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(is_hidden(e) || is_excluded(e, exclude)))
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let descriptor = FileDescriptor::from_path(entry.into_path());
        if extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(&descriptor.extension))
        {
            files.push(descriptor);
        }
    }

    Ok(files)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|s| s.starts_with('.'))
}

fn is_excluded(entry: &walkdir::DirEntry, exclude: &[glob::Pattern]) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| exclude.iter().any(|p| p.matches(name)))
}

/// True when `path` has a directory component equal to one of `names` (case-insensitive).
pub fn has_dir_component(path: &Path, names: &[&str]) -> bool {
    path.parent().is_some_and(|parent| {
        parent.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|s| names.iter().any(|n| n.eq_ignore_ascii_case(s)))
        })
    })
}

/// Markdown files under `root`, dropping any below a directory named in `ignore_dirs`.
pub fn markdown_files(
    root: &Path,
    ignore_dirs: &[&str],
    exclude: &[glob::Pattern],
) -> Result<Vec<FileDescriptor>> {
    Ok(enumerate_content_files(root, &["md"], exclude)?
        .into_iter()
        .filter(|f| {
            let relative = f.path.strip_prefix(root).unwrap_or(f.path.as_path());
            !has_dir_component(relative, ignore_dirs)
        })
        .collect())
}

/// Markdown and YAML files under `root`: everything that can link to something.
pub fn linking_files(root: &Path, exclude: &[glob::Pattern]) -> Result<Vec<FileDescriptor>> {
    enumerate_content_files(root, &["md", "yml", "yaml"], exclude)
}

/// Table-of-contents files under `root` (`toc.yml`, `toc.md`).
pub fn toc_files(root: &Path, exclude: &[glob::Pattern]) -> Result<Vec<FileDescriptor>> {
    Ok(enumerate_content_files(root, &["md", "yml"], exclude)?
        .into_iter()
        .filter(|f| {
            let name = f.file_name();
            name.eq_ignore_ascii_case("toc.yml") || name.eq_ignore_ascii_case("toc.md")
        })
        .collect())
}

/// Markdown files sitting directly in a directory named `includes` or `_shared`.
pub fn include_files(root: &Path, exclude: &[glob::Pattern]) -> Result<Vec<FileDescriptor>> {
    Ok(enumerate_content_files(root, &["md"], exclude)?
        .into_iter()
        .filter(|f| {
            f.dir
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case("includes") || n.eq_ignore_ascii_case("_shared"))
        })
        .collect())
}

/// Finds the nearest ancestor of `dir`, no higher than `stop_at`, holding a `*.??proj` file.
///
/// Results are memoized in `cache` since sibling snippets share ancestry.
pub fn find_project_dir(
    dir: &Path,
    stop_at: &Path,
    cache: &mut HashMap<PathBuf, Option<PathBuf>>,
) -> Option<PathBuf> {
    if let Some(hit) = cache.get(dir) {
        return hit.clone();
    }

    let found = if contains_project_file(dir) {
        Some(dir.to_path_buf())
    } else if dir == stop_at || !dir.starts_with(stop_at) {
        None
    } else {
        dir.parent()
            .and_then(|parent| find_project_dir(parent, stop_at, cache))
    };

    cache.insert(dir.to_path_buf(), found.clone());
    found
}

fn contains_project_file(dir: &Path) -> bool {
    let Ok(pattern) = glob::Pattern::new("*.??proj") else {
        return false;
    };
    let options = glob::MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    std::fs::read_dir(dir).is_ok_and(|entries| {
        entries.filter_map(|e| e.ok()).any(|e| {
            e.file_type().is_ok_and(|t| t.is_file())
                && e.file_name()
                    .to_str()
                    .is_some_and(|n| pattern.matches_with(n, options))
        })
    })
}

/// A solution file and the project directories it lists.
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub path: PathBuf,
    pub project_dirs: Vec<ResourceId>,
}

impl Solution {
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }
}

/// Parses every `.sln` under `root`.
pub fn solutions(root: &Path, exclude: &[glob::Pattern]) -> Result<Vec<Solution>> {
    let project_line = Regex::new(r#"(?m)^Project\("\{[^}]*\}"\)\s*=\s*"[^"]*"\s*,\s*"([^"]+)""#)?;

    enumerate_content_files(root, &["sln"], exclude)?
        .into_iter()
        .map(|file| -> Result<Solution> {
            let text = std::fs::read_to_string(&file.path)
                .with_context(|| format!("Failed to read {}", file.path.display()))?;
            Ok(Solution {
                project_dirs: parse_solution(&project_line, &text, &file.dir),
                path: file.path,
            })
        })
        .collect()
}

fn parse_solution(project_line: &Regex, text: &str, sln_dir: &Path) -> Vec<ResourceId> {
    let mut dirs: Vec<ResourceId> = Vec::new();
    for caps in project_line.captures_iter(text) {
        let relative = caps[1].replace('\\', "/");
        if !relative.to_ascii_lowercase().ends_with("proj") {
            continue;
        }
        let project = sln_dir.join(&relative);
        let Some(dir) = project.parent() else {
            continue;
        };
        let id = ResourceId::new(dir);
        if !dirs.contains(&id) {
            dirs.push(id);
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn names(files: &[FileDescriptor], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|f| {
                f.path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn enumerates_by_extension_in_path_order() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "b.md");
        touch(root, "a.md");
        touch(root, "sub/c.yml");
        touch(root, "sub/d.png");
        touch(root, ".git/e.md");

        let files = enumerate_content_files(root, &["md", "yml"], &[]).unwrap();
        assert_eq!(names(&files, root), vec!["a.md", "b.md", "sub/c.yml"]);
        assert_eq!(files[2].extension, "yml");
        assert_eq!(files[2].dir, root.join("sub"));
    }

    #[test]
    fn honors_exclude_globs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "keep/a.md");
        touch(root, "node_modules/b.md");
        touch(root, "draft-c.md");

        let exclude = vec![
            glob::Pattern::new("node_modules").unwrap(),
            glob::Pattern::new("draft-*").unwrap(),
        ];
        let files = enumerate_content_files(root, &["md"], &exclude).unwrap();
        assert_eq!(names(&files, root), vec!["keep/a.md"]);
    }

    #[test]
    fn markdown_files_skip_ignored_directories() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "a.md");
        touch(root, "snippets/readme.md");
        touch(root, "deep/Snippets/x/readme.md");

        let files = markdown_files(root, &["snippets"], &[]).unwrap();
        assert_eq!(names(&files, root), vec!["a.md"]);
    }

    #[test]
    fn include_files_live_in_includes_or_shared() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "includes/a.md");
        touch(root, "core/_shared/b.md");
        touch(root, "core/Includes/c.md");
        touch(root, "includes/nested/d.md");
        touch(root, "core/e.md");

        let files = include_files(root, &[]).unwrap();
        assert_eq!(
            names(&files, root),
            vec!["core/Includes/c.md", "core/_shared/b.md", "includes/a.md"]
        );
    }

    #[test]
    fn toc_files_match_either_format() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "TOC.md");
        touch(root, "core/toc.yml");
        touch(root, "core/not-toc.yml");

        let files = toc_files(root, &[]).unwrap();
        assert_eq!(names(&files, root), vec!["TOC.md", "core/toc.yml"]);
    }

    #[test]
    fn finds_nearest_project_directory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "samples/ProjA/ProjA.csproj");
        touch(root, "samples/ProjA/src/foo.cs");
        touch(root, "samples/loose/bar.cs");

        let mut cache = HashMap::new();
        assert_eq!(
            find_project_dir(&root.join("samples/ProjA/src"), root, &mut cache),
            Some(root.join("samples/ProjA"))
        );
        assert_eq!(
            find_project_dir(&root.join("samples/loose"), root, &mut cache),
            None
        );
        assert!(cache.contains_key(&root.join("samples")));
    }

    #[test]
    fn parses_solution_project_directories() {
        let regex = Regex::new(r#"(?m)^Project\("\{[^}]*\}"\)\s*=\s*"[^"]*"\s*,\s*"([^"]+)""#).unwrap();
        let text = concat!(
            "Microsoft Visual Studio Solution File, Format Version 12.00\n",
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"ProjA\", \"ProjA\\ProjA.csproj\", \"{1}\"\n",
            "EndProject\n",
            "Project(\"{2150E333-8FDC-42A3-9474-1A3956D46DE8}\") = \"Folder\", \"Folder\", \"{2}\"\n",
            "EndProject\n",
            "Project(\"{F184B08F-C81C-45F6-A57F-5ABD9991F28F}\") = \"ProjB\", \"..\\ProjB\\ProjB.vbproj\", \"{3}\"\n",
            "EndProject\n",
        );
        let dirs = parse_solution(&regex, text, Path::new("/repo/samples/sln"));
        let dirs: Vec<_> = dirs.iter().map(|d| d.as_str()).collect();
        assert_eq!(dirs, vec!["/repo/samples/sln/proja", "/repo/samples/projb"]);
    }

    #[test]
    fn solutions_are_collected_from_disk() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("s")).unwrap();
        fs::write(
            root.join("s/All.sln"),
            "Project(\"{X}\") = \"P\", \"P\\P.csproj\", \"{Y}\"\nEndProject\n",
        )
        .unwrap();

        let found = solutions(root, &[]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].dir(), root.join("s"));
        assert_eq!(found[0].project_dirs, vec![ResourceId::new(&root.join("s/P"))]);
    }
}
