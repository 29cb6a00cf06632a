//! macOS cross-architecture builds requested through `ARCHFLAGS`.
//!
//! Apple toolchains take `-arch` flags, and the setuptools convention
//! for requesting a cross build is `ARCHFLAGS="-arch arm64"`. When the
//! requested architecture differs from the running machine's, the
//! configure step gains a machine file that points the compilers at
//! the requested architecture, and the wheel platform tag follows it.

use std::collections::BTreeSet;

use miette::Diagnostic;
use thiserror::Error;

/// An `ARCHFLAGS` request slipway cannot honor.
#[derive(Debug, Error, Diagnostic)]
pub enum ArchFlagsError {
    #[error("cannot parse ARCHFLAGS `{0}`")]
    #[diagnostic(
        code(slipway::meson::archflags),
        help("expected one or more `-arch <name>` pairs")
    )]
    Unparseable(String),

    #[error("ARCHFLAGS `{0}` requests a multi-architecture build")]
    #[diagnostic(
        code(slipway::meson::archflags_multiarch),
        help("universal wheels are not supported; build one architecture at a time")
    )]
    MultiArch(String),

    #[error("ARCHFLAGS `{archflags}` and _PYTHON_HOST_PLATFORM `{host_platform}` disagree")]
    #[diagnostic(code(slipway::meson::archflags_host_platform))]
    HostPlatformMismatch {
        archflags: String,
        host_platform: String,
    },
}

/// Architecture requested through `ARCHFLAGS` when it differs from the
/// running machine's. Always `None` off macOS.
pub fn cross_arch() -> Result<Option<String>, ArchFlagsError> {
    if !cfg!(target_os = "macos") {
        return Ok(None);
    }
    let Some(flags) = std::env::var("ARCHFLAGS")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    else {
        return Ok(None);
    };
    let arch = parse_archflags(&flags)?;
    if arch == native_arch() {
        return Ok(None);
    }
    check_host_platform(
        &flags,
        &arch,
        std::env::var("_PYTHON_HOST_PLATFORM").ok().as_deref(),
    )?;
    Ok(Some(arch))
}

/// The running machine's architecture, in Apple naming.
pub fn native_arch() -> &'static str {
    match std::env::consts::ARCH {
        "aarch64" => "arm64",
        other => other,
    }
}

/// The single architecture an `ARCHFLAGS` value names.
fn parse_archflags(flags: &str) -> Result<String, ArchFlagsError> {
    let mut archs = BTreeSet::new();
    let mut tokens = flags.split_whitespace();
    while let Some(token) = tokens.next() {
        if token != "-arch" {
            return Err(ArchFlagsError::Unparseable(flags.to_string()));
        }
        match tokens.next() {
            Some(arch) => archs.insert(arch.to_string()),
            None => return Err(ArchFlagsError::Unparseable(flags.to_string())),
        };
    }
    let mut archs = archs.into_iter();
    let Some(arch) = archs.next() else {
        return Err(ArchFlagsError::Unparseable(flags.to_string()));
    };
    if archs.next().is_some() {
        return Err(ArchFlagsError::MultiArch(flags.to_string()));
    }
    Ok(arch)
}

/// A pre-set `_PYTHON_HOST_PLATFORM` must name the same architecture.
fn check_host_platform(
    flags: &str,
    arch: &str,
    host_platform: Option<&str>,
) -> Result<(), ArchFlagsError> {
    match host_platform {
        Some(hp) if !hp.ends_with(arch) => Err(ArchFlagsError::HostPlatformMismatch {
            archflags: flags.to_string(),
            host_platform: hp.to_string(),
        }),
        _ => Ok(()),
    }
}

fn cpu_family(arch: &str) -> &str {
    if arch == "arm64" {
        "aarch64"
    } else {
        arch
    }
}

/// Machine-file contents pointing the Apple compilers at `arch`.
pub fn cross_file_contents(arch: &str) -> String {
    format!(
        "[binaries]\n\
         c = ['cc', '-arch', '{arch}']\n\
         cpp = ['c++', '-arch', '{arch}']\n\
         objc = ['cc', '-arch', '{arch}']\n\
         objcpp = ['c++', '-arch', '{arch}']\n\
         [host_machine]\n\
         system = 'darwin'\n\
         cpu = '{arch}'\n\
         cpu_family = '{family}'\n\
         endian = 'little'\n",
        arch = arch,
        family = cpu_family(arch)
    )
}
