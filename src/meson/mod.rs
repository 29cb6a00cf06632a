//! Driving the external build tool through the build cycle.
//!
//! The driver owns the four externally-visible steps: configure,
//! compile, staged install and introspection. Build steps stream their
//! output to the terminal; introspection runs captured. Every
//! invocation goes through [`crate::util::ProcessBuilder`].

pub mod command;
pub mod cross;
pub mod introspect;
pub mod sentinel;

use std::collections::BTreeMap;
use std::process::ExitStatus;

use anyhow::{Context, Result};
use miette::Diagnostic;
use thiserror::Error;

use crate::core::session::BuildSession;
use crate::core::target::BuildTarget;
use crate::mapper::tags::macos_deployment_target;
use crate::util::fs;
use crate::util::process::ProcessBuilder;

pub use command::{is_free_threaded, resolve_meson, resolve_ninja, resolve_python, ResolvedTool};
pub use introspect::{
    BuildOption, InstallFilter, InstallPlanDoc, IntrospectionSchemaError, StagedFile,
    StagingConsistencyError,
};
pub use sentinel::{ConcurrentBuildError, SentinelGuard, SentinelVerdict};

/// Name of the pinned-interpreter machine file written into the build
/// directory.
const NATIVE_FILE: &str = "slipway-native.ini";

/// Name of the cross machine file written for `ARCHFLAGS` builds.
const CROSS_FILE: &str = "slipway-cross.ini";

/// Build options applied before user setup arguments, so users can
/// override them.
const DEFAULT_SETUP_OPTIONS: [&str; 3] = [
    "-Dbuildtype=release",
    "-Db_ndebug=if-release",
    "-Db_vscrt=md",
];

/// A build-tool invocation that exited with failure.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildToolError {
    /// A step whose output was already streamed to the terminal.
    #[error("`{command}` failed ({status})")]
    #[diagnostic(
        code(slipway::meson::step_failed),
        help("the build output above has the full details")
    )]
    Step {
        command: String,
        status: String,
        output: String,
    },

    /// A captured invocation; its output was not shown yet.
    #[error("`{command}` failed ({status})\n{output}")]
    #[diagnostic(code(slipway::meson::introspect_failed))]
    Captured {
        command: String,
        status: String,
        output: String,
    },
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Drives the build tool against one [`BuildSession`].
pub struct MesonDriver<'a> {
    session: &'a BuildSession,
}

impl<'a> MesonDriver<'a> {
    pub fn new(session: &'a BuildSession) -> Self {
        MesonDriver { session }
    }

    /// Configure the build directory.
    ///
    /// An incompatible directory is deleted and configured from
    /// scratch; a compatible one with a prior configuration is
    /// reconfigured in place. A cross-architecture request adds a
    /// machine file for the requested architecture; the
    /// pinned-interpreter machine file is passed after all user
    /// arguments so it always wins.
    pub fn configure(&self) -> Result<()> {
        let build_dir = &self.session.build_dir;

        if self.session.verdict == SentinelVerdict::Incompatible {
            tracing::info!("build options changed, resetting {}", build_dir.display());
            fs::remove_dir_all_if_exists(build_dir)?;
            fs::ensure_dir(build_dir)?;
            self.session.reassert_sentinel()?;
        }

        let native_file = build_dir.join(NATIVE_FILE);
        fs::write_string(
            &native_file,
            &format!(
                "[binaries]\npython = '{}'\n",
                self.session.python.display()
            ),
        )?;

        let reconfigure = build_dir.join("meson-private").join("coredata.dat").is_file();

        let mut pb = self.session.meson.process().arg("setup");
        if reconfigure {
            pb = pb.arg("--reconfigure");
        }
        pb = pb
            .arg(build_dir)
            .arg(&self.session.source_dir)
            .args(DEFAULT_SETUP_OPTIONS)
            .args(&self.session.config().args.setup);
        if let Some(arch) = &self.session.cross_arch {
            let cross_file = build_dir.join(CROSS_FILE);
            fs::write_string(&cross_file, &cross::cross_file_contents(arch))?;
            pb = pb.arg(format!("--cross-file={}", cross_file.display()));
        }
        pb = pb.arg(format!("--native-file={}", native_file.display()));
        self.run_streamed(self.in_env(pb))
    }

    /// Compile the configured build directory.
    pub fn compile(&self) -> Result<()> {
        let pb = self
            .session
            .meson
            .process()
            .args(["compile", "-C"])
            .arg(&self.session.build_dir)
            .args(&self.session.config().args.compile);
        self.run_streamed(self.in_env(pb))
    }

    /// Install into the session's private staging tree.
    pub fn stage_install(&self) -> Result<()> {
        let pb = self
            .session
            .meson
            .process()
            .args(["install", "-C"])
            .arg(&self.session.build_dir)
            .arg("--destdir")
            .arg(self.session.staging_root())
            .arg("--no-rebuild")
            .args(&self.session.config().args.install);
        self.run_streamed(self.in_env(pb))
    }

    /// Read the target list from the configured build directory.
    pub fn introspect_targets(&self) -> Result<Vec<BuildTarget>> {
        let pb = self
            .session
            .meson
            .process()
            .args(["introspect", "--targets"])
            .arg(&self.session.build_dir);
        let json = self.run_captured(self.in_env(pb))?;
        Ok(introspect::parse_targets(&json)?)
    }

    /// Read the install plan from the configured build directory.
    pub fn introspect_install_plan(&self) -> Result<InstallPlanDoc> {
        let pb = self
            .session
            .meson
            .process()
            .args(["introspect", "--install-plan"])
            .arg(&self.session.build_dir);
        let json = self.run_captured(self.in_env(pb))?;
        Ok(introspect::parse_install_plan(&json)?)
    }

    /// Read the configured option values from the build directory.
    pub fn introspect_buildoptions(&self) -> Result<Vec<BuildOption>> {
        let pb = self
            .session
            .meson
            .process()
            .args(["introspect", "--buildoptions"])
            .arg(&self.session.build_dir);
        let json = self.run_captured(self.in_env(pb))?;
        Ok(introspect::parse_buildoptions(&json)?)
    }

    /// Read the installed-location map the configure step leaves in
    /// `meson-info/`.
    pub fn installed_map(&self) -> Result<BTreeMap<String, String>> {
        let path = self
            .session
            .build_dir
            .join("meson-info")
            .join("intro-installed.json");
        let text = fs::read_to_string(&path)?;
        Ok(introspect::parse_installed_map(&text)?)
    }

    fn in_env(&self, pb: ProcessBuilder) -> ProcessBuilder {
        // the backend is pinned for every step so meson's own lookup
        // cannot drift away from the doctor-checked one
        let pb = pb
            .cwd(&self.session.source_dir)
            .env("NINJA", self.session.ninja.path());
        // cross builds advertise the target platform to the
        // interpreter's sysconfig, the way setuptools does
        match &self.session.cross_arch {
            Some(arch) if std::env::var("_PYTHON_HOST_PLATFORM").is_err() => pb.env(
                "_PYTHON_HOST_PLATFORM",
                format!("macosx-{}-{}", macos_deployment_target(), arch),
            ),
            _ => pb,
        }
    }

    fn run_streamed(&self, pb: ProcessBuilder) -> Result<()> {
        eprintln!("+ {}", pb.display_command());
        let out = pb.exec_stream()?;
        if !out.status.success() {
            return Err(BuildToolError::Step {
                command: pb.display_command(),
                status: describe_status(out.status),
                output: out.text,
            }
            .into());
        }
        Ok(())
    }

    fn run_captured(&self, pb: ProcessBuilder) -> Result<String> {
        tracing::debug!("running {}", pb.display_command());
        let output = pb.exec()?;
        if !output.status.success() {
            return Err(BuildToolError::Captured {
                command: pb.display_command(),
                status: describe_status(output.status),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        String::from_utf8(output.stdout)
            .with_context(|| format!("`{}` produced invalid UTF-8", pb.display_command()))
    }
}
