//! High-level operations.
//!
//! This module contains the implementation of slipway commands.

pub mod build_sdist;
pub mod build_wheel;
pub mod clean;
pub mod develop;
pub mod doctor;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::pyproject::PYPROJECT_NAME;
use crate::util::fs;

pub use build_sdist::{build_sdist, SdistOptions};
pub use build_wheel::{build_wheel, WheelOptions};
pub use clean::{clean, CleanOptions};
pub use develop::{develop, DevelopOptions, DevelopOutcome};
pub use doctor::{doctor, format_report, CheckResult, CheckStatus, DoctorOptions, DoctorReport};

/// Resolve the project directory, defaulting to the current directory,
/// and verify it holds a project manifest.
pub(crate) fn resolve_source_dir(dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let dir = fs::normalize_path(&dir);
    if !dir.join(PYPROJECT_NAME).is_file() {
        bail!(
            "no {} found in {}\n\
             hint: run from the project root, or pass --source-dir",
            PYPROJECT_NAME,
            dir.display()
        );
    }
    Ok(dir)
}

/// Display a path relative to the current directory when possible.
pub fn display_path(path: &Path) -> String {
    match std::env::current_dir() {
        Ok(cwd) => fs::relative_path(&cwd, path).display().to_string(),
        Err(_) => path.display().to_string(),
    }
}
