//! The build-directory sentinel.
//!
//! A small JSON record in the build directory remembers which tool
//! versions and options produced it, and whether a build is currently
//! running. Drift in any recorded value forces a reconfigure from
//! scratch; a `building` state left behind by a concurrent invocation
//! aborts the session.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use miette::Diagnostic;
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SENTINEL_FILE: &str = "slipway-sentinel.json";

/// A second build session found the sentinel in `building` state.
#[derive(Debug, Error, Diagnostic)]
#[error("another build is already running in `{build_dir}`")]
#[diagnostic(
    code(slipway::session::concurrent_build),
    help("wait for it to finish, or run `slipway clean` if a previous build crashed")
)]
pub struct ConcurrentBuildError {
    pub build_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentinelState {
    Building,
    Ready,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelRecord {
    pub slipway_version: String,
    pub meson_version: String,
    pub options: String,
    pub state: SentinelState,
}

/// How the existing build directory relates to this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelVerdict {
    /// No prior configuration.
    Fresh,
    /// Prior configuration matches and can be reused.
    Compatible,
    /// Prior configuration differs; the directory must be reset.
    Incompatible,
}

/// Holds the sentinel in `building` state for the lifetime of a build.
///
/// Dropping the guard rewrites the record as `ready` on every exit
/// path; [`SentinelGuard::release`] does the same with the write error
/// surfaced.
#[derive(Debug)]
pub struct SentinelGuard {
    path: PathBuf,
    record: SentinelRecord,
    released: bool,
}

impl SentinelGuard {
    /// Inspect the prior record, refuse to run next to a live build,
    /// and mark the directory as building.
    ///
    /// The build directory must already exist.
    pub fn acquire(
        build_dir: &Path,
        meson_version: &Version,
        options_fingerprint: &str,
    ) -> Result<(SentinelGuard, SentinelVerdict)> {
        let path = build_dir.join(SENTINEL_FILE);
        let meson_version = meson_version.to_string();

        let verdict = if !path.exists() {
            SentinelVerdict::Fresh
        } else {
            match read_record(&path) {
                // present but unreadable, only a reset is safe
                None => SentinelVerdict::Incompatible,
                Some(prior) => {
                    if prior.state == SentinelState::Building {
                        return Err(ConcurrentBuildError {
                            build_dir: build_dir.display().to_string(),
                        }
                        .into());
                    }
                    if prior.slipway_version == env!("CARGO_PKG_VERSION")
                        && prior.meson_version == meson_version
                        && prior.options == options_fingerprint
                    {
                        SentinelVerdict::Compatible
                    } else {
                        SentinelVerdict::Incompatible
                    }
                }
            }
        };

        let guard = SentinelGuard {
            path,
            record: SentinelRecord {
                slipway_version: env!("CARGO_PKG_VERSION").to_string(),
                meson_version,
                options: options_fingerprint.to_string(),
                state: SentinelState::Building,
            },
            released: false,
        };
        guard.write()?;
        Ok((guard, verdict))
    }

    /// Rewrite the `building` record, needed after the build directory
    /// was reset underneath the guard.
    pub fn reassert(&self) -> Result<()> {
        self.write()
    }

    /// Mark the build directory ready.
    pub fn release(mut self) -> Result<()> {
        self.record.state = SentinelState::Ready;
        self.write()?;
        self.released = true;
        Ok(())
    }

    fn write(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.record)
            .context("failed to serialize build sentinel")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

impl Drop for SentinelGuard {
    fn drop(&mut self) {
        if !self.released {
            self.record.state = SentinelState::Ready;
            let json = match serde_json::to_string_pretty(&self.record) {
                Ok(json) => json,
                Err(_) => return,
            };
            let _ = std::fs::write(&self.path, json);
        }
    }
}

/// Read the sentinel from a build directory without touching it.
/// Missing or unreadable records come back as `None`.
pub fn read_record(path: &Path) -> Option<SentinelRecord> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

/// Peek at a build directory's sentinel.
pub fn peek(build_dir: &Path) -> Option<SentinelRecord> {
    read_record(&build_dir.join(SENTINEL_FILE))
}
