//! Environment and toolchain health checks.
//!
//! `doctor` probes the Python interpreter, the build tools and the
//! project configuration without mutating anything, and renders the
//! findings as a pass/fail report. A failed required check means wheel
//! builds cannot work on this machine.
//!
//! ## Usage
//!
//! ```bash
//! slipway doctor           # Quick check
//! slipway doctor --verbose # Detailed output
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::pyproject::{PyProject, SlipwayConfig, PYPROJECT_NAME};
use crate::mapper::tags;
use crate::meson::command::{resolve_meson, resolve_ninja, resolve_python};
use crate::meson::sentinel::{self, SentinelState};

/// Verdict of a single health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Fail,
}

/// One health check with its verdict and supporting detail.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    /// One-line explanation shown on failure, and always in verbose
    /// mode.
    pub detail: String,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    /// Required checks gate the exit code; optional ones only inform.
    pub required: bool,
}

impl CheckResult {
    pub fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        CheckResult {
            name,
            status: CheckStatus::Pass,
            detail: detail.into(),
            path: None,
            version: None,
            required: true,
        }
    }

    pub fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        CheckResult {
            status: CheckStatus::Fail,
            ..Self::pass(name, detail)
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }

    fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Host facts shown in the verbose report header.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub platform_tag: String,
}

impl HostInfo {
    fn collect() -> Self {
        HostInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            platform_tag: tags::host_platform_tag(),
        }
    }
}

/// Every check result plus the host facts they ran under.
#[derive(Debug, Clone)]
pub struct DoctorReport {
    pub checks: Vec<CheckResult>,
    pub host: HostInfo,
}

impl DoctorReport {
    pub fn all_required_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed() || !c.required)
    }
}

/// Options for the doctor command.
#[derive(Debug, Clone, Default)]
pub struct DoctorOptions {
    /// Project directory to inspect. Defaults to the current directory.
    pub source_dir: Option<PathBuf>,
}

/// Run every health check.
pub fn doctor(options: &DoctorOptions) -> Result<DoctorReport> {
    let source_dir = match &options.source_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let project = load_project(&source_dir);
    let config = match &project {
        Some(Ok(pyproject)) => pyproject.slipway().clone(),
        _ => SlipwayConfig::default(),
    };

    let (python_check, python) = check_python(&config);
    let mut checks = vec![
        python_check,
        check_meson(&config, &python),
        check_ninja(),
        check_project(&source_dir, &project),
    ];
    if project.is_some() {
        checks.push(check_build_dir(&source_dir));
    }

    Ok(DoctorReport {
        checks,
        host: HostInfo::collect(),
    })
}

/// Load `pyproject.toml` if the directory has one. `None` means the
/// directory is not a project at all.
fn load_project(source_dir: &Path) -> Option<Result<PyProject>> {
    if source_dir.join(PYPROJECT_NAME).is_file() {
        Some(PyProject::load(source_dir))
    } else {
        None
    }
}

/// Check for a Python interpreter. Also returns the path so the meson
/// check can resolve `.py` entry points through it.
fn check_python(config: &SlipwayConfig) -> (CheckResult, PathBuf) {
    match resolve_python(config) {
        Ok(path) => {
            let check = CheckResult::pass("Python", format!("Found {}", path.display()))
                .with_path(path.clone());
            (check, path)
        }
        Err(err) => {
            let check = CheckResult::fail("Python", format!("{:#}", err));
            (check, PathBuf::from("python3"))
        }
    }
}

/// Check for meson and its minimum version.
fn check_meson(config: &SlipwayConfig, python: &Path) -> CheckResult {
    match resolve_meson(config, python) {
        Ok(tool) => CheckResult::pass("Meson", format!("meson {} is available", tool.version))
            .with_path(PathBuf::from(tool.path()))
            .with_version(tool.version.to_string()),
        Err(err) => CheckResult::fail("Meson", format!("{:#}", err)),
    }
}

/// Check for a ninja-compatible backend and its minimum version.
fn check_ninja() -> CheckResult {
    match resolve_ninja() {
        Ok(tool) => CheckResult::pass("Ninja", format!("ninja {} is available", tool.version))
            .with_path(PathBuf::from(tool.path()))
            .with_version(tool.version.to_string()),
        Err(err) => CheckResult::fail("Ninja", format!("{:#}", err)),
    }
}

/// Check the project configuration, when there is one.
fn check_project(source_dir: &Path, project: &Option<Result<PyProject>>) -> CheckResult {
    match project {
        None => CheckResult::pass(
            "Project",
            format!("no {} in {}", PYPROJECT_NAME, source_dir.display()),
        )
        .optional(),
        Some(Ok(pyproject)) => {
            let version = pyproject
                .project
                .version
                .clone()
                .unwrap_or_else(|| "dynamic".to_string());
            CheckResult::pass(
                "Project",
                format!("{} {}", pyproject.project.name, version),
            )
        }
        Some(Err(err)) => CheckResult::fail("Project", format!("{:#}", err)),
    }
}

/// Report the state of the default build directory.
fn check_build_dir(source_dir: &Path) -> CheckResult {
    let build_dir = source_dir.join("build").join(tags::host_platform_tag());
    let check = match sentinel::peek(&build_dir) {
        Some(record) => {
            let state = match record.state {
                SentinelState::Building => "a build is in progress or crashed",
                SentinelState::Ready => "ready",
            };
            CheckResult::pass(
                "Build Directory",
                format!(
                    "configured by slipway {} with meson {}, {}",
                    record.slipway_version, record.meson_version, state
                ),
            )
        }
        None => CheckResult::pass("Build Directory", "not configured yet"),
    };
    check.with_path(build_dir).optional()
}

/// Format the doctor report for display.
pub fn format_report(report: &DoctorReport, verbose: bool) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    writeln!(out, "Slipway Doctor").unwrap();
    writeln!(out, "==============\n").unwrap();

    if verbose {
        writeln!(out, "Host:").unwrap();
        writeln!(out, "  OS: {} ({})", report.host.os, report.host.arch).unwrap();
        writeln!(out, "  Platform tag: {}\n", report.host.platform_tag).unwrap();
    }

    writeln!(out, "Checks:").unwrap();
    for check in &report.checks {
        let marker = if check.passed() { "[OK]" } else { "[!!]" };
        let suffix = if check.required { "" } else { " (optional)" };
        writeln!(out, "  {} {}{}", marker, check.name, suffix).unwrap();

        if verbose || !check.passed() {
            writeln!(out, "      {}", check.detail).unwrap();
        }
        if verbose {
            if let Some(path) = &check.path {
                writeln!(out, "      Path: {}", path.display()).unwrap();
            }
            if let Some(version) = &check.version {
                writeln!(out, "      Version: {}", version).unwrap();
            }
        }
    }

    let passed = report.checks.iter().filter(|c| c.passed()).count();
    let failed = report.checks.len() - passed;
    let blocking = report
        .checks
        .iter()
        .filter(|c| c.required && !c.passed())
        .count();

    writeln!(out, "\nSummary: {} passed, {} failed", passed, failed).unwrap();

    if blocking > 0 {
        writeln!(
            out,
            "\nWarning: {} required check(s) failed. Builds will not work.",
            blocking
        )
        .unwrap();
    } else if failed > 0 {
        writeln!(
            out,
            "\nAll required checks passed. {} optional check(s) failed.",
            failed
        )
        .unwrap();
    } else {
        writeln!(out, "\nAll checks passed. Slipway is ready to use.").unwrap();
    }

    out
}
