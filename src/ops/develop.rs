//! Implementation of `slipway develop`.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::plan::DestCategory;
use crate::core::session::BuildSession;
use crate::editable;
use crate::ops::build_wheel::run_build_cycle;

/// Options for an editable install.
#[derive(Debug, Clone, Default)]
pub struct DevelopOptions {
    /// Project directory. Defaults to the current directory.
    pub source_dir: Option<PathBuf>,
    /// Build directory. Defaults to `build/<platform>` in the project.
    pub build_dir: Option<PathBuf>,
    /// Site directory to drop the redirection record into. Defaults to
    /// the configured interpreter's purelib directory.
    pub site_dir: Option<PathBuf>,
    pub setup_args: Vec<String>,
    pub compile_args: Vec<String>,
    pub install_args: Vec<String>,
}

/// What an editable install did.
#[derive(Debug)]
pub struct DevelopOutcome {
    /// The redirection record in the site directory.
    pub pth_path: PathBuf,
    /// The shadow directory the record points at.
    pub shadow_dir: PathBuf,
    pub copied: usize,
    pub removed: usize,
}

/// Build the project and link it into a Python environment.
pub fn develop(opts: &DevelopOptions) -> Result<DevelopOutcome> {
    let source_dir = super::resolve_source_dir(opts.source_dir.as_deref())?;
    let extra = crate::core::pyproject::MesonArgs {
        setup: opts.setup_args.clone(),
        compile: opts.compile_args.clone(),
        install: opts.install_args.clone(),
    };
    let session = BuildSession::new(&source_dir, opts.build_dir.as_deref(), &extra)?;

    let artifacts = run_build_cycle(&session)?;
    if artifacts.tree.has(DestCategory::Scripts)
        || artifacts.tree.has(DestCategory::Headers)
        || artifacts.tree.has(DestCategory::Data)
    {
        tracing::warn!("scripts, headers and data files are not linked in editable mode");
    }

    let (shadow_dir, outcome) = editable::sync_shadow_tree(&session.build_dir, &artifacts.tree)?;
    tracing::info!(
        "shadow tree: {} copied, {} removed, {} unchanged",
        outcome.copied,
        outcome.removed,
        outcome.unchanged
    );

    let site_dir = match &opts.site_dir {
        Some(dir) => dir.clone(),
        None => editable::resolve_site_dir(&session.python)?,
    };
    let python_source = match &session.config().python_source {
        Some(rel) => source_dir.join(rel),
        None => source_dir.clone(),
    };
    let pth_path =
        editable::write_redirect(&site_dir, &session.project_id, &shadow_dir, &python_source)?;

    session.finish()?;
    Ok(DevelopOutcome {
        pth_path,
        shadow_dir,
        copied: outcome.copied,
        removed: outcome.removed,
    })
}
