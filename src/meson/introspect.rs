//! Readers for the build tool's machine-readable introspection output.
//!
//! The documents that matter: the target list (`--targets`), the
//! install plan (`--install-plan`), the configured options
//! (`--buildoptions`) and the installed-location map the build tool
//! leaves in `meson-info/intro-installed.json`. Parsing is strict
//! about the fields slipway relies on and silent about everything
//! else, so newer build tools can add fields freely.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Result};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::target::BuildTarget;
use crate::meson::command::ResolvedTool;
use crate::util::fs::forward_slashes;

/// Malformed or incomplete introspection output.
#[derive(Debug, Error, Diagnostic)]
#[error("unexpected {document} introspection data: {detail}")]
#[diagnostic(
    code(slipway::introspect::schema),
    help("the build tool may be too old; `slipway doctor` shows the detected version")
)]
pub struct IntrospectionSchemaError {
    pub document: &'static str,
    pub detail: String,
}

/// A plan entry whose staged file vanished between install and
/// packaging.
#[derive(Debug, Error, Diagnostic)]
#[error("the install plan lists `{path}` but nothing was staged there")]
#[diagnostic(code(slipway::introspect::missing_staged_file))]
pub struct StagingConsistencyError {
    pub path: String,
}

/// Project identity from `introspect meson.build --projectinfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectInfo {
    pub descriptive_name: String,
    pub version: String,
}

/// One configured option from the `--buildoptions` document.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildOption {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Parsed `--install-plan` document: group name to build-tree path to
/// entry details.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct InstallPlanDoc(BTreeMap<String, BTreeMap<String, PlanFileEntry>>);

#[derive(Debug, Clone, Deserialize)]
pub struct PlanFileEntry {
    pub destination: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub subproject: Option<String>,
}

impl InstallPlanDoc {
    pub fn groups(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, PlanFileEntry>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|g| g.is_empty())
    }
}

/// One file from the install plan, located in the staging tree but not
/// yet mapped onto the wheel layout.
#[derive(Debug, Clone)]
pub struct StagedFile {
    /// Absolute path inside the staging tree.
    pub staged: PathBuf,
    /// Raw destination template, e.g. `{py_platlib}/pkg/mod.so`.
    pub destination: String,
    pub tag: Option<String>,
    pub subproject: Option<String>,
    /// Install-plan group the file came from.
    pub group: String,
    /// Build- or source-tree path the plan keyed the file by.
    pub build_path: String,
}

pub fn parse_targets(json: &str) -> Result<Vec<BuildTarget>, IntrospectionSchemaError> {
    serde_json::from_str(json).map_err(|e| IntrospectionSchemaError {
        document: "target list",
        detail: e.to_string(),
    })
}

pub fn parse_install_plan(json: &str) -> Result<InstallPlanDoc, IntrospectionSchemaError> {
    serde_json::from_str(json).map_err(|e| IntrospectionSchemaError {
        document: "install plan",
        detail: e.to_string(),
    })
}

pub fn parse_installed_map(json: &str) -> Result<BTreeMap<String, String>, IntrospectionSchemaError> {
    serde_json::from_str(json).map_err(|e| IntrospectionSchemaError {
        document: "installed-location map",
        detail: e.to_string(),
    })
}

pub fn parse_project_info(json: &str) -> Result<ProjectInfo, IntrospectionSchemaError> {
    serde_json::from_str(json).map_err(|e| IntrospectionSchemaError {
        document: "project info",
        detail: e.to_string(),
    })
}

pub fn parse_buildoptions(json: &str) -> Result<Vec<BuildOption>, IntrospectionSchemaError> {
    serde_json::from_str(json).map_err(|e| IntrospectionSchemaError {
        document: "build options",
        detail: e.to_string(),
    })
}

/// Whether `python.allow_limited_api` permits limited-API builds. A
/// missing or disabled option is a project-level veto of the
/// `limited-api` package default.
pub fn allow_limited_api(options: &[BuildOption]) -> bool {
    options
        .iter()
        .find(|o| o.name == "python.allow_limited_api")
        .map(|o| o.value == serde_json::Value::Bool(true))
        .unwrap_or(false)
}

/// Read the project name and version straight from the build
/// description. Works before any build directory exists.
pub fn project_info(meson: &ResolvedTool, source_dir: &Path) -> Result<ProjectInfo> {
    let pb = meson
        .process()
        .args(["introspect", "meson.build", "--projectinfo"])
        .cwd(source_dir);
    let output = pb.exec_and_check()?;
    let json = String::from_utf8_lossy(&output.stdout);
    Ok(parse_project_info(&json)?)
}

/// Project version from the build description, for projects that
/// declare their version dynamic.
pub fn introspected_version(meson: &ResolvedTool, source_dir: &Path) -> Result<String> {
    let info = project_info(meson, source_dir)?;
    if info.version == "undefined" {
        bail!(
            "the project version is dynamic but project() in meson.build does not set one"
        );
    }
    Ok(info.version)
}

/// The `--tags` / `--skip-subprojects` subset recognized inside user
/// install arguments, mirrored here so the wheel sees exactly the
/// files `meson install` staged.
#[derive(Debug, Default, Clone)]
pub struct InstallFilter {
    tags: Option<BTreeSet<String>>,
    skip_subprojects: BTreeSet<String>,
}

impl InstallFilter {
    pub fn from_install_args(args: &[String]) -> InstallFilter {
        let mut filter = InstallFilter::default();
        let mut iter = args.iter().peekable();
        while let Some(arg) = iter.next() {
            if let Some(value) = arg.strip_prefix("--tags=") {
                filter.set_tags(value);
            } else if arg == "--tags" {
                if let Some(value) = iter.next() {
                    filter.set_tags(value);
                }
            } else if let Some(value) = arg.strip_prefix("--skip-subprojects=") {
                filter.set_skips(value);
            } else if arg == "--skip-subprojects" {
                // the value is optional; the bare flag skips every
                // subproject
                match iter.peek() {
                    Some(next) if !next.starts_with('-') => {
                        if let Some(value) = iter.next() {
                            filter.set_skips(value);
                        }
                    }
                    _ => {
                        filter.skip_subprojects.insert("*".to_string());
                    }
                }
            }
        }
        filter
    }

    fn set_tags(&mut self, value: &str) {
        self.tags = Some(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        );
    }

    fn set_skips(&mut self, value: &str) {
        for part in value.split(',') {
            let part = part.trim();
            if !part.is_empty() {
                self.skip_subprojects.insert(part.to_string());
            }
        }
    }

    pub fn admits(&self, entry: &PlanFileEntry) -> bool {
        if let Some(tags) = &self.tags {
            let tagged = entry
                .tag
                .as_deref()
                .map(|t| tags.contains(t))
                .unwrap_or(false);
            if !tagged {
                return false;
            }
        }
        if let Some(subproject) = &entry.subproject {
            if self.skip_subprojects.contains("*") || self.skip_subprojects.contains(subproject) {
                return false;
            }
        }
        true
    }
}

/// Join the filtered plan with the installed-location map and rebase
/// each destination into the staging tree. Directory payloads are
/// expanded to one entry per contained file, in sorted order.
pub fn staged_files(
    plan: &InstallPlanDoc,
    installed: &BTreeMap<String, String>,
    staging_root: &Path,
    filter: &InstallFilter,
) -> Result<Vec<StagedFile>> {
    let mut files = Vec::new();
    for (group, entries) in plan.groups() {
        for (build_path, entry) in entries {
            if !filter.admits(entry) {
                tracing::debug!("install filter skips {}", build_path);
                continue;
            }
            let Some(installed_path) = installed.get(build_path) else {
                return Err(IntrospectionSchemaError {
                    document: "installed-location map",
                    detail: format!("`{}` has no installed location", build_path),
                }
                .into());
            };
            let staged = destdir_join(staging_root, Path::new(installed_path));
            if staged.is_dir() {
                for file in walk_sorted(&staged)? {
                    let rel = file.strip_prefix(&staged).unwrap_or(&file).to_path_buf();
                    files.push(StagedFile {
                        destination: format!("{}/{}", entry.destination, forward_slashes(&rel)),
                        staged: file,
                        tag: entry.tag.clone(),
                        subproject: entry.subproject.clone(),
                        group: group.clone(),
                        build_path: build_path.clone(),
                    });
                }
            } else if staged.is_file() {
                files.push(StagedFile {
                    staged,
                    destination: entry.destination.clone(),
                    tag: entry.tag.clone(),
                    subproject: entry.subproject.clone(),
                    group: group.clone(),
                    build_path: build_path.clone(),
                });
            } else {
                return Err(StagingConsistencyError {
                    path: installed_path.clone(),
                }
                .into());
            }
        }
    }
    Ok(files)
}

/// Rebase an absolute installed path under `root`, the way DESTDIR
/// installs do: root and drive prefixes are stripped, the rest is
/// appended.
pub fn destdir_join(root: &Path, installed: &Path) -> PathBuf {
    let mut out = root.to_path_buf();
    for component in installed.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn walk_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}
