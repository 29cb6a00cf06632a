//! Per-invocation build session state.
//!
//! A `BuildSession` resolves the toolchain, fixes the directory layout,
//! computes the options fingerprint and takes the build-directory
//! sentinel. It owns the private staging directory the install step
//! writes into; both the staging directory and the sentinel are
//! cleaned up when the session ends, on success and failure alike.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::metadata::ProjectId;
use crate::core::pyproject::{MesonArgs, PyProject, SlipwayConfig};
use crate::mapper::tags::host_platform_tag;
use crate::meson::command::{resolve_meson, resolve_ninja, resolve_python, ResolvedTool};
use crate::meson::sentinel::{SentinelGuard, SentinelVerdict};
use crate::meson::{cross, introspect};
use crate::util::fs;
use crate::util::hash::Fingerprint;

pub struct BuildSession {
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub pyproject: PyProject,
    pub project_id: ProjectId,
    pub meson: ResolvedTool,
    pub ninja: ResolvedTool,
    pub python: PathBuf,
    pub verdict: SentinelVerdict,
    /// Cross-architecture request from `ARCHFLAGS`, macOS only.
    pub cross_arch: Option<String>,
    config: SlipwayConfig,
    staging: TempDir,
    sentinel: SentinelGuard,
}

impl BuildSession {
    /// Resolve tools and configuration and claim the build directory.
    ///
    /// `extra_args` are command-line step arguments; they are appended
    /// after the `pyproject.toml` ones so they take precedence.
    pub fn new(
        source_dir: &Path,
        build_dir_override: Option<&Path>,
        extra_args: &MesonArgs,
    ) -> Result<BuildSession> {
        let source_dir = fs::normalize_path(source_dir);
        let pyproject = PyProject::load(&source_dir)?;

        let mut config = pyproject.slipway().clone();
        config.args.setup.extend(extra_args.setup.iter().cloned());
        config
            .args
            .compile
            .extend(extra_args.compile.iter().cloned());
        config
            .args
            .install
            .extend(extra_args.install.iter().cloned());

        let python = resolve_python(&config)?;
        let meson = resolve_meson(&config, &python)?;
        let ninja = resolve_ninja()?;
        let cross_arch = cross::cross_arch()?;
        tracing::debug!("using meson {} and ninja {}", meson.version, ninja.version);
        if let Some(arch) = &cross_arch {
            tracing::info!("cross-compiling for {}", arch);
        }

        let version = match &pyproject.project.version {
            Some(version) => version.clone(),
            None => introspect::introspected_version(&meson, &source_dir)?,
        };
        let project_id = ProjectId::new(&pyproject.project.name, &version);

        let build_dir = match build_dir_override {
            Some(dir) => fs::normalize_path(dir),
            None => source_dir.join("build").join(host_platform_tag()),
        };

        let options_fingerprint = fingerprint_options(&config, &python, cross_arch.as_deref());
        fs::ensure_dir(&build_dir)?;
        let (sentinel, verdict) =
            SentinelGuard::acquire(&build_dir, &meson.version, &options_fingerprint)?;

        let staging = tempfile::Builder::new()
            .prefix("slipway-staging-")
            .tempdir()
            .context("failed to create the staging directory")?;

        Ok(BuildSession {
            source_dir,
            build_dir,
            pyproject,
            project_id,
            meson,
            ninja,
            python,
            verdict,
            cross_arch,
            config,
            staging,
            sentinel,
        })
    }

    /// Step arguments with command-line extras already merged in.
    pub fn config(&self) -> &SlipwayConfig {
        &self.config
    }

    /// Root of the private staging tree the install step fills.
    pub fn staging_root(&self) -> &Path {
        self.staging.path()
    }

    /// Rewrite the sentinel after the build directory was reset.
    pub fn reassert_sentinel(&self) -> Result<()> {
        self.sentinel.reassert()
    }

    /// Mark the build directory ready and drop the staging tree.
    pub fn finish(self) -> Result<()> {
        self.sentinel.release()?;
        self.staging
            .close()
            .context("failed to remove the staging directory")?;
        Ok(())
    }
}

/// Everything that invalidates an existing build directory when it
/// changes: the interpreter, the limited-API switch, the setup
/// arguments and a cross-architecture request. Compile and install
/// arguments do not reconfigure.
fn fingerprint_options(config: &SlipwayConfig, python: &Path, cross_arch: Option<&str>) -> String {
    let mut fp = Fingerprint::new();
    fp.update_str(&python.to_string_lossy());
    fp.update_opt(config.meson.as_deref());
    fp.update_bool(config.limited_api);
    fp.update_strs(&config.args.setup);
    fp.update_opt(cross_arch);
    fp.finish_short()
}
