//! Implementation of `slipway sdist`.

use std::path::PathBuf;

use anyhow::Result;

use crate::assemble::{self, SourceSelector};
use crate::core::metadata::ProjectId;
use crate::core::pyproject::PyProject;
use crate::meson::command::{resolve_meson, resolve_python};
use crate::meson::introspect;

/// Options for building a source archive.
#[derive(Debug, Clone, Default)]
pub struct SdistOptions {
    /// Project directory. Defaults to the current directory.
    pub source_dir: Option<PathBuf>,
    /// Output directory. Defaults to `dist/` in the project.
    pub out_dir: Option<PathBuf>,
}

/// Build a source archive and return its path.
///
/// No build directory is configured; the build tool is only consulted
/// when the project declares its version dynamic.
pub fn build_sdist(opts: &SdistOptions) -> Result<PathBuf> {
    let source_dir = super::resolve_source_dir(opts.source_dir.as_deref())?;
    let pyproject = PyProject::load(&source_dir)?;
    let config = pyproject.slipway();

    let version = match &pyproject.project.version {
        Some(version) => version.clone(),
        None => {
            let python = resolve_python(config)?;
            let meson = resolve_meson(config, &python)?;
            introspect::introspected_version(&meson, &source_dir)?
        }
    };
    let id = ProjectId::new(&pyproject.project.name, &version);

    let selector = SourceSelector::new(&config.sdist_include, &config.sdist_exclude)?;
    let out_dir = opts
        .out_dir
        .clone()
        .unwrap_or_else(|| source_dir.join("dist"));

    assemble::write_sdist(&out_dir, &id, &pyproject.project, &source_dir, &selector)
}
