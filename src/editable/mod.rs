//! Editable installs: shadow-tree sync plus a redirection record.
//!
//! Instead of packing a wheel, the mapped code entries are copied into
//! a shadow directory inside the build directory, and a `.pth` record
//! in the interpreter's site directory points at the shadow tree and
//! the project's Python sources. Re-running after a rebuild copies
//! only entries whose content changed and removes entries that left
//! the install plan, so the environment immediately reflects the
//! build.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::metadata::ProjectId;
use crate::core::plan::{ArtifactTree, DestCategory};
use crate::util::fs;
use crate::util::hash::sha256_file;
use crate::util::process::ProcessBuilder;

pub const SHADOW_DIR: &str = "slipway-editable";
const STATE_FILE: &str = "shadow-state.json";

/// Content digests of the shadow tree from the last sync.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ShadowState {
    files: BTreeMap<String, String>,
}

impl ShadowState {
    fn load(path: &Path) -> ShadowState {
        let Ok(text) = std::fs::read_to_string(path) else {
            return ShadowState::default();
        };
        serde_json::from_str(&text).unwrap_or_default()
    }

    fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("failed to serialize shadow state")?;
        fs::write_string(path, &json)
    }
}

/// What one sync pass did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub copied: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// Copy the tree's code entries into the shadow directory.
///
/// Returns the shadow directory path and what changed. Entries outside
/// purelib and platlib are not part of the shadow tree.
pub fn sync_shadow_tree(build_dir: &Path, tree: &ArtifactTree) -> Result<(PathBuf, SyncOutcome)> {
    let shadow = build_dir.join(SHADOW_DIR);
    fs::ensure_dir(&shadow)?;
    let state_path = shadow.join(STATE_FILE);
    let state = ShadowState::load(&state_path);

    let mut next = ShadowState::default();
    let mut outcome = SyncOutcome::default();

    for entry in tree.iter() {
        if !matches!(
            entry.category,
            DestCategory::PureCode | DestCategory::PlatformCode
        ) {
            continue;
        }
        let digest = sha256_file(&entry.source)?;
        let target = shadow.join(&entry.dest);
        let current = state.files.get(&entry.dest);
        if current == Some(&digest) && target.is_file() {
            outcome.unchanged += 1;
        } else {
            fs::copy_file(&entry.source, &target)?;
            outcome.copied += 1;
        }
        next.files.insert(entry.dest.clone(), digest);
    }

    for rel in state.files.keys() {
        if !next.files.contains_key(rel) {
            let stale = shadow.join(rel);
            if stale.is_file() {
                std::fs::remove_file(&stale)
                    .with_context(|| format!("failed to remove {}", stale.display()))?;
            }
            outcome.removed += 1;
        }
    }

    next.save(&state_path)?;
    Ok((shadow, outcome))
}

/// Write the redirection record into the interpreter's site directory.
///
/// The record lists the shadow directory first so built artifacts win
/// over same-named files in the Python source tree.
pub fn write_redirect(
    site_dir: &Path,
    id: &ProjectId,
    shadow_dir: &Path,
    python_source: &Path,
) -> Result<PathBuf> {
    fs::ensure_dir(site_dir)?;
    let path = site_dir.join(format!("_{}_editable.pth", id.escaped_name()));
    let body = format!("{}\n{}\n", shadow_dir.display(), python_source.display());
    // interpreters may scan the site directory mid-write
    fs::write_atomic(&path, body.as_bytes())?;
    Ok(path)
}

/// Ask an interpreter where purelib packages go.
pub fn resolve_site_dir(python: &Path) -> Result<PathBuf> {
    let output = ProcessBuilder::new(python)
        .args(["-c", "import sysconfig; print(sysconfig.get_path('purelib'))"])
        .exec_and_check()?;
    let line = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if line.is_empty() {
        bail!(
            "`{}` did not report a site directory\n\
             hint: pass --site-dir explicitly",
            python.display()
        );
    }
    Ok(PathBuf::from(line))
}
