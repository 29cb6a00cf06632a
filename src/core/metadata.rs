//! Project identity and core-metadata rendering.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::core::pyproject::ProjectTable;

static NAME_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-_.]+").unwrap());

/// Normalized project identity used for artifact naming.
///
/// The distribution name is normalized once at construction: runs of
/// `-`, `_` and `.` collapse to a single `-` and the result is
/// lowercased. Filenames additionally escape `-` to `_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectId {
    name: String,
    version: String,
}

impl ProjectId {
    pub fn new(raw_name: &str, version: &str) -> Self {
        let name = NAME_SEPARATORS.replace_all(raw_name, "-").to_lowercase();
        ProjectId {
            name,
            version: version.to_string(),
        }
    }

    /// Normalized distribution name, e.g. `demo-pkg`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Filename-safe form of the name, e.g. `demo_pkg`.
    pub fn escaped_name(&self) -> String {
        self.name.replace('-', "_")
    }

    /// Name of the wheel's metadata directory.
    pub fn dist_info_dir(&self) -> String {
        format!("{}-{}.dist-info", self.escaped_name(), self.version)
    }

    /// Name of the wheel's data directory for scripts, headers and
    /// data files.
    pub fn data_dir(&self) -> String {
        format!("{}-{}.data", self.escaped_name(), self.version)
    }

    pub fn wheel_filename(&self, tag: &str) -> String {
        format!("{}-{}-{}.whl", self.escaped_name(), self.version, tag)
    }

    /// Stem of the source archive and of its single top-level
    /// directory, e.g. `demo_pkg-1.0.0`.
    pub fn sdist_stem(&self) -> String {
        format!("{}-{}", self.escaped_name(), self.version)
    }

    pub fn sdist_filename(&self) -> String {
        format!("{}.tar.gz", self.sdist_stem())
    }
}

/// Render the core-metadata body shared by a wheel's `METADATA` file
/// and an sdist's `PKG-INFO` file.
pub fn render_core_metadata(
    project: &ProjectTable,
    id: &ProjectId,
    source_dir: &Path,
) -> Result<String> {
    let mut out = String::new();
    out.push_str("Metadata-Version: 2.1\n");
    out.push_str(&format!("Name: {}\n", project.name));
    out.push_str(&format!("Version: {}\n", id.version()));

    if let Some(description) = &project.description {
        out.push_str(&format!("Summary: {}\n", single_line(description)));
    }
    if let Some(license) = project.license_text(source_dir)? {
        // multi-line license bodies are folded with the RFC 822
        // continuation convention
        out.push_str(&format!("License: {}\n", fold_lines(&license)));
    }
    for author in &project.authors {
        match (&author.name, &author.email) {
            (Some(name), Some(email)) => {
                out.push_str(&format!("Author-email: {} <{}>\n", name, email));
            }
            (Some(name), None) => out.push_str(&format!("Author: {}\n", name)),
            (None, Some(email)) => out.push_str(&format!("Author-email: {}\n", email)),
            (None, None) => {}
        }
    }
    if let Some(requires) = &project.requires_python {
        out.push_str(&format!("Requires-Python: {}\n", requires));
    }
    for (label, url) in &project.urls {
        out.push_str(&format!("Project-URL: {}, {}\n", label, url));
    }
    for classifier in &project.classifiers {
        out.push_str(&format!("Classifier: {}\n", classifier));
    }
    for dep in &project.dependencies {
        out.push_str(&format!("Requires-Dist: {}\n", dep));
    }

    if let Some((body, content_type)) = project.readme_content(source_dir)? {
        out.push_str(&format!("Description-Content-Type: {}\n", content_type));
        out.push('\n');
        out.push_str(&body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
    }

    Ok(out)
}

/// Render the wheel's `WHEEL` metadata file.
pub fn render_wheel_metadata(tag: &str, root_is_purelib: bool) -> String {
    format!(
        "Wheel-Version: 1.0\nGenerator: slipway {}\nRoot-Is-Purelib: {}\nTag: {}\n",
        env!("CARGO_PKG_VERSION"),
        root_is_purelib,
        tag
    )
}

fn single_line(s: &str) -> String {
    s.lines().collect::<Vec<_>>().join(" ")
}

fn fold_lines(s: &str) -> String {
    s.trim_end().lines().collect::<Vec<_>>().join("\n        ")
}
