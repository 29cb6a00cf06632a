//! Locating the build tools and checking their versions.
//!
//! Resolution order for the main build tool: the `MESON` environment
//! variable, then `tool.slipway.meson` from `pyproject.toml`, then
//! `meson` on PATH. A value ending in `.py` is run through the
//! configured Python interpreter. The companion backend comes from the
//! `NINJA` environment variable or the first of `ninja`, `ninja-build`
//! and `samu` on PATH that is new enough.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use semver::Version;

use crate::core::pyproject::SlipwayConfig;
use crate::util::process::ProcessBuilder;

fn meson_floor() -> Version {
    Version::new(0, 64, 0)
}

fn ninja_floor() -> Version {
    Version::new(1, 8, 2)
}

/// A build tool resolved to a concrete command line and version.
#[derive(Debug, Clone)]
pub struct ResolvedTool {
    /// Program plus any interpreter prefix.
    command: Vec<String>,
    pub version: Version,
}

impl ResolvedTool {
    /// Start building an invocation of this tool.
    pub fn process(&self) -> ProcessBuilder {
        let mut pb = ProcessBuilder::new(&self.command[0]);
        for arg in &self.command[1..] {
            pb = pb.arg(arg);
        }
        pb
    }

    /// The executable path, without any interpreter prefix.
    pub fn path(&self) -> &str {
        self.command.last().map(String::as_str).unwrap_or_default()
    }
}

/// Find the Python interpreter the build is pinned to.
pub fn resolve_python(config: &SlipwayConfig) -> Result<PathBuf> {
    if let Some(python) = &config.python {
        return which::which(python)
            .with_context(|| format!("configured python `{}` was not found", python));
    }
    for candidate in ["python3", "python"] {
        if let Ok(path) = which::which(candidate) {
            return Ok(path);
        }
    }
    bail!(
        "no python interpreter found on PATH\n\
         hint: set `tool.slipway.python` in pyproject.toml"
    )
}

/// Whether the interpreter is a free-threaded CPython build.
pub fn is_free_threaded(python: &Path) -> Result<bool> {
    let output = ProcessBuilder::new(python)
        .args([
            "-c",
            "import sysconfig; print(int(bool(sysconfig.get_config_var('Py_GIL_DISABLED'))))",
        ])
        .exec_and_check()?;
    Ok(String::from_utf8_lossy(&output.stdout).trim() == "1")
}

/// Find the main build tool and verify it is new enough.
pub fn resolve_meson(config: &SlipwayConfig, python: &Path) -> Result<ResolvedTool> {
    let configured = std::env::var("MESON")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| config.meson.clone())
        .unwrap_or_else(|| "meson".to_string());

    let command = if configured.ends_with(".py") {
        let script = Path::new(&configured);
        if !script.is_file() {
            bail!("could not find the configured meson script `{}`", configured);
        }
        vec![
            python.to_string_lossy().into_owned(),
            script.to_string_lossy().into_owned(),
        ]
    } else {
        let path = which::which(&configured)
            .with_context(|| format!("meson executable `{}` was not found", configured))?;
        vec![path.to_string_lossy().into_owned()]
    };

    let tool = probe_version(command)?;
    if tool.version < meson_floor() {
        bail!(
            "meson {} is too old, {} or newer is required",
            tool.version,
            meson_floor()
        );
    }
    Ok(tool)
}

/// Find a usable ninja-compatible backend.
pub fn resolve_ninja() -> Result<ResolvedTool> {
    let candidates: Vec<String> = match std::env::var("NINJA") {
        Ok(v) if !v.is_empty() => vec![v],
        _ => vec!["ninja", "ninja-build", "samu"]
            .into_iter()
            .map(String::from)
            .collect(),
    };

    for candidate in &candidates {
        let Ok(path) = which::which(candidate) else {
            continue;
        };
        let Ok(tool) = probe_version(vec![path.to_string_lossy().into_owned()]) else {
            continue;
        };
        if tool.version >= ninja_floor() {
            return Ok(tool);
        }
        tracing::debug!(
            "skipping {} {}: older than {}",
            candidate,
            tool.version,
            ninja_floor()
        );
    }

    bail!(
        "could not find ninja {} or newer (tried {})\n\
         hint: install ninja, or point the NINJA environment variable at it",
        ninja_floor(),
        candidates.join(", ")
    )
}

fn probe_version(command: Vec<String>) -> Result<ResolvedTool> {
    let mut pb = ProcessBuilder::new(&command[0]);
    for arg in &command[1..] {
        pb = pb.arg(arg);
    }
    let output = pb.arg("--version").exec_and_check()?;
    let raw = String::from_utf8_lossy(&output.stdout);
    let version = parse_tool_version(&raw);
    Ok(ResolvedTool { command, version })
}

/// Parse a tool's version output leniently: take the leading run of
/// digits and dots, use the first three components, ignore the rest
/// (`1.11.1.git.kitware.jobserver-1` parses as 1.11.1).
pub fn parse_tool_version(raw: &str) -> Version {
    let cleaned: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts = cleaned.split('.');
    let major = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let minor = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let patch = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    Version::new(major, minor, patch)
}
