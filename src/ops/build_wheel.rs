//! Implementation of `slipway build`.

use std::path::PathBuf;

use anyhow::Result;

use crate::assemble;
use crate::core::pyproject::MesonArgs;
use crate::core::session::BuildSession;
use crate::mapper::tags::FreeThreadedLimitedApiError;
use crate::mapper::{ArtifactMapper, MappedArtifacts};
use crate::meson::introspect::{self, InstallFilter};
use crate::meson::{is_free_threaded, MesonDriver};

/// Options for building a wheel.
#[derive(Debug, Clone, Default)]
pub struct WheelOptions {
    /// Project directory. Defaults to the current directory.
    pub source_dir: Option<PathBuf>,
    /// Build directory. Defaults to `build/<platform>` in the project.
    pub build_dir: Option<PathBuf>,
    /// Output directory. Defaults to `dist/` in the project.
    pub out_dir: Option<PathBuf>,
    pub setup_args: Vec<String>,
    pub compile_args: Vec<String>,
    pub install_args: Vec<String>,
}

impl WheelOptions {
    pub(crate) fn extra_args(&self) -> MesonArgs {
        MesonArgs {
            setup: self.setup_args.clone(),
            compile: self.compile_args.clone(),
            install: self.install_args.clone(),
        }
    }
}

/// Build a wheel and return its path.
pub fn build_wheel(opts: &WheelOptions) -> Result<PathBuf> {
    let source_dir = super::resolve_source_dir(opts.source_dir.as_deref())?;
    let session = BuildSession::new(&source_dir, opts.build_dir.as_deref(), &opts.extra_args())?;

    let artifacts = run_build_cycle(&session)?;
    tracing::info!(
        "mapped {} staged files, wheel tag {}",
        artifacts.tree.len(),
        artifacts.tag
    );

    let out_dir = opts
        .out_dir
        .clone()
        .unwrap_or_else(|| source_dir.join("dist"));
    let wheel = assemble::write_wheel(
        &out_dir,
        &session.project_id,
        &session.pyproject.project,
        &source_dir,
        &artifacts,
    )?;

    session.finish()?;
    Ok(wheel)
}

/// Run the configure, compile, stage-install and mapping steps shared
/// by wheel builds and editable installs.
pub(crate) fn run_build_cycle(session: &BuildSession) -> Result<MappedArtifacts> {
    let driver = MesonDriver::new(session);
    driver.configure()?;
    let limited_api = effective_limited_api(session, &driver)?;
    driver.compile()?;
    driver.stage_install()?;

    let targets = driver.introspect_targets()?;
    let plan = driver.introspect_install_plan()?;
    let installed = driver.installed_map()?;
    let filter = InstallFilter::from_install_args(&session.config().args.install);
    let staged = introspect::staged_files(&plan, &installed, session.staging_root(), &filter)?;

    let mapper = ArtifactMapper::new(&targets, limited_api);
    mapper.map(staged)
}

/// The `limited-api` switch after the configured project has its say:
/// the `python.allow_limited_api` option vetoes the package default,
/// and a free-threaded interpreter cannot honor it at all.
fn effective_limited_api(session: &BuildSession, driver: &MesonDriver) -> Result<bool> {
    if !session.config().limited_api {
        return Ok(false);
    }
    let options = driver.introspect_buildoptions()?;
    if !introspect::allow_limited_api(&options) {
        tracing::debug!("`python.allow_limited_api` is off, building without the limited API");
        return Ok(false);
    }
    if is_free_threaded(&session.python)? {
        return Err(FreeThreadedLimitedApiError.into());
    }
    Ok(true)
}
