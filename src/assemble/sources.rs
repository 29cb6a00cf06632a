//! Source-file selection for the source archive.
//!
//! The whole project tree ships except VCS metadata, caches and build
//! output. `sdist-exclude` patterns from `pyproject.toml` remove more;
//! `sdist-include` patterns win over excludes. The project manifest
//! and build description are always kept.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use walkdir::{DirEntry, WalkDir};

/// Directory names never shipped in a source archive.
const PRUNED_DIRS: [&str; 9] = [
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "dist",
    "build",
];

/// Files the archive cannot function without.
const ALWAYS_KEPT: [&str; 2] = ["pyproject.toml", "meson.build"];

#[derive(Debug)]
pub struct SourceSelector {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl SourceSelector {
    pub fn new(include: &[String], exclude: &[String]) -> Result<SourceSelector> {
        Ok(SourceSelector {
            include: compile_patterns(include, "sdist-include")?,
            exclude: compile_patterns(exclude, "sdist-exclude")?,
        })
    }

    /// Collect the files to ship, as sorted source-relative paths.
    pub fn select(&self, source_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        let walker = WalkDir::new(source_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_pruned(e));
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(source_dir)
                .unwrap_or(entry.path())
                .to_path_buf();
            if self.is_selected(&rel) {
                out.push(rel);
            }
        }
        out.sort();
        Ok(out)
    }

    fn is_selected(&self, rel: &Path) -> bool {
        if ALWAYS_KEPT.iter().any(|name| rel == Path::new(name)) {
            return true;
        }
        let excluded = self.exclude.iter().any(|p| p.matches_path(rel));
        let included = self.include.iter().any(|p| p.matches_path(rel));
        !excluded || included
    }
}

fn compile_patterns(patterns: &[String], key: &str) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).with_context(|| format!("invalid {} pattern `{}`", key, p))
        })
        .collect()
}

fn is_pruned(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| PRUNED_DIRS.contains(&name) || name.ends_with(".egg-info"))
        .unwrap_or(false)
}
