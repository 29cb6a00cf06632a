//! Wheel tag derivation.
//!
//! Pure trees tag as `py3-none-any`. Platform-dependent trees without
//! extension modules keep `py3-none` but pin the platform. Extension
//! modules pin the interpreter too, read from the module filename
//! suffix, or tag `cp38-abi3` when the project builds against the
//! limited C API.

use std::sync::LazyLock;

use anyhow::Result;
use miette::Diagnostic;
use regex::Regex;
use thiserror::Error;

use crate::core::plan::{ArtifactTree, DestCategory};
use crate::meson::cross;

/// Extension-module filename: `name.<abi>.so`, `name.so`, `name.pyd`
/// and friends.
static EXTENSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^.]+\.(?:(?P<abi>[^.]+)\.)?(?:so|pyd|dll)$").unwrap());

/// The project targets the limited C API but ships a version-specific
/// extension module.
#[derive(Debug, Error, Diagnostic)]
#[error(
    "`{module}` is tagged for a specific Python version but the project targets the limited API"
)]
#[diagnostic(
    code(slipway::mapper::limited_api_conflict),
    help("build the module with `limited_api:` in meson.build, or drop `limited-api` from [tool.slipway]")
)]
pub struct LimitedApiConflictError {
    pub module: String,
}

/// The project targets the limited C API but the interpreter is a
/// free-threaded CPython build, which has no limited API.
#[derive(Debug, Error, Diagnostic)]
#[error("the project targets the limited API, which free-threaded CPython does not support")]
#[diagnostic(
    code(slipway::mapper::limited_api_free_threaded),
    help(
        "set `python.allow_limited_api` to false in meson.build, or build \
         with a GIL-enabled interpreter"
    )
)]
pub struct FreeThreadedLimitedApiError;

/// Platform tag for the machine slipway runs on, or for the
/// architecture an `ARCHFLAGS` cross request names on macOS.
pub fn host_platform_tag() -> String {
    let arch = std::env::consts::ARCH;
    if cfg!(target_os = "windows") {
        match arch {
            "x86_64" => "win_amd64".to_string(),
            "x86" => "win32".to_string(),
            "aarch64" => "win_arm64".to_string(),
            other => format!("win_{}", other),
        }
    } else if cfg!(target_os = "macos") {
        let arch = cross::cross_arch()
            .ok()
            .flatten()
            .unwrap_or_else(|| cross::native_arch().to_string());
        macos_platform_tag(&macos_deployment_target(), &arch)
    } else {
        format!("{}_{}", std::env::consts::OS, arch)
    }
}

/// Deployment target macOS artifacts are tagged with, `11.0` unless
/// `MACOSX_DEPLOYMENT_TARGET` says otherwise.
pub fn macos_deployment_target() -> String {
    std::env::var("MACOSX_DEPLOYMENT_TARGET").unwrap_or_else(|_| "11.0".to_string())
}

fn macos_platform_tag(target: &str, arch: &str) -> String {
    let mut parts = target.split('.');
    let major = parts.next().unwrap_or("11");
    let minor = parts.next().unwrap_or("0");
    format!("macosx_{}_{}_{}", major, minor, arch)
}

/// Derive the full wheel tag from the mapped tree.
pub fn wheel_tag(tree: &ArtifactTree, limited_api: bool) -> Result<String> {
    if tree.is_pure() {
        return Ok("py3-none-any".to_string());
    }
    let platform = host_platform_tag();
    if !tree.has(DestCategory::PlatformCode) {
        // native scripts only: platform-dependent, ABI-independent
        return Ok(format!("py3-none-{}", platform));
    }
    if limited_api {
        verify_stable_abi(tree)?;
        return Ok(format!("cp38-abi3-{}", platform));
    }
    match interpreter_tag(tree) {
        Some(cp) => Ok(format!("{}-{}-{}", cp, cp, platform)),
        None => Ok(format!("py3-none-{}", platform)),
    }
}

/// Interpreter tag read from the first extension-module suffix that
/// names one, e.g. `demo.cpython-312-x86_64-linux-gnu.so` -> `cp312`.
fn interpreter_tag(tree: &ArtifactTree) -> Option<String> {
    for entry in tree.category(DestCategory::PlatformCode) {
        let Some(abi) = extension_abi(&entry.dest) else {
            continue;
        };
        if let Some(rest) = abi.strip_prefix("cpython-") {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            if !digits.is_empty() {
                return Some(format!("cp{}", digits));
            }
        } else if let Some(rest) = abi.strip_prefix("cp") {
            // windows form, e.g. `cp312-win_amd64`
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            if !digits.is_empty() {
                return Some(format!("cp{}", digits));
            }
        }
    }
    None
}

/// With the limited API every extension module must be suffix-tagged
/// `abi3` or carry no ABI suffix at all.
fn verify_stable_abi(tree: &ArtifactTree) -> Result<(), LimitedApiConflictError> {
    for entry in tree.category(DestCategory::PlatformCode) {
        if let Some(abi) = extension_abi(&entry.dest) {
            if abi != "abi3" {
                return Err(LimitedApiConflictError {
                    module: entry.dest.clone(),
                });
            }
        }
    }
    Ok(())
}

fn extension_abi(dest: &str) -> Option<&str> {
    let name = dest.rsplit('/').next().unwrap_or(dest);
    EXTENSION_SUFFIX
        .captures(name)
        .and_then(|caps| caps.name("abi"))
        .map(|m| m.as_str())
}
