//! Implementation of `slipway clean`.

use std::path::PathBuf;

use anyhow::Result;

use crate::util::fs;

/// Options for removing build state.
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Project directory. Defaults to the current directory.
    pub source_dir: Option<PathBuf>,
    /// Remove only this build directory instead of `build/` as a whole.
    pub build_dir: Option<PathBuf>,
    /// Also remove the `dist/` directory.
    pub dist: bool,
}

/// Remove build directories, and optionally built distributions.
///
/// Returns the directories that actually existed and were removed.
pub fn clean(opts: &CleanOptions) -> Result<Vec<PathBuf>> {
    let source_dir = super::resolve_source_dir(opts.source_dir.as_deref())?;

    let mut targets = Vec::new();
    match &opts.build_dir {
        Some(dir) => targets.push(fs::normalize_path(dir)),
        None => targets.push(source_dir.join("build")),
    }
    if opts.dist {
        targets.push(source_dir.join("dist"));
    }

    let mut removed = Vec::new();
    for dir in targets {
        if fs::remove_dir_all_if_exists(&dir)? {
            tracing::debug!("removed {}", dir.display());
            removed.push(dir);
        }
    }
    Ok(removed)
}
