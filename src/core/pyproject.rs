//! `pyproject.toml` parsing: the standard `[project]` table plus
//! slipway's own `[tool.slipway]` table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::util::fs;

pub const PYPROJECT_NAME: &str = "pyproject.toml";

/// Parsed `pyproject.toml`, reduced to the tables slipway reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PyProject {
    pub project: ProjectTable,
    #[serde(default)]
    tool: ToolTable,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ToolTable {
    #[serde(default)]
    slipway: SlipwayConfig,
}

/// The `[project]` table, reduced to the fields slipway renders into
/// core metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectTable {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requires_python: Option<String>,
    #[serde(default)]
    pub license: Option<License>,
    #[serde(default)]
    pub readme: Option<Readme>,
    #[serde(default)]
    pub authors: Vec<Contact>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub classifiers: Vec<String>,
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
    #[serde(default)]
    pub dynamic: Vec<String>,
}

/// The `license` key accepts either an SPDX expression string or the
/// older table form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum License {
    Expression(String),
    Table {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        file: Option<String>,
    },
}

/// The `readme` key accepts a bare path or a table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Readme {
    Path(String),
    Table {
        #[serde(default)]
        file: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default, rename = "content-type")]
        content_type: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// The `[tool.slipway]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SlipwayConfig {
    /// Build-tool override: an executable name, an absolute path, or a
    /// `meson.py` script run through the configured Python.
    #[serde(default)]
    pub meson: Option<String>,
    /// Python interpreter the build is pinned to.
    #[serde(default)]
    pub python: Option<String>,
    /// Build extension modules against the limited C API.
    #[serde(default)]
    pub limited_api: bool,
    /// Directory holding the project's importable Python sources,
    /// relative to the project root. Used by editable installs.
    #[serde(default)]
    pub python_source: Option<PathBuf>,
    /// Glob patterns re-including files in the source archive.
    #[serde(default)]
    pub sdist_include: Vec<String>,
    /// Glob patterns excluding files from the source archive.
    #[serde(default)]
    pub sdist_exclude: Vec<String>,
    #[serde(default)]
    pub args: MesonArgs,
}

/// Extra arguments forwarded to the individual build steps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MesonArgs {
    #[serde(default)]
    pub setup: Vec<String>,
    #[serde(default)]
    pub compile: Vec<String>,
    #[serde(default)]
    pub install: Vec<String>,
}

impl PyProject {
    /// Load and validate `pyproject.toml` from a project directory.
    pub fn load(source_dir: &Path) -> Result<Self> {
        let path = source_dir.join(PYPROJECT_NAME);
        let text = fs::read_to_string(&path)?;
        let doc: PyProject = toml::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        doc.validate()?;
        Ok(doc)
    }

    fn validate(&self) -> Result<()> {
        if self.project.name.trim().is_empty() {
            bail!("project.name must not be empty in pyproject.toml");
        }
        match (&self.project.version, self.has_dynamic_version()) {
            (Some(_), true) => {
                bail!("project.version is both set and declared dynamic in pyproject.toml")
            }
            (None, false) => bail!(
                "project.version is missing in pyproject.toml\n\
                 hint: set it, or add \"version\" to project.dynamic to read it from meson.build"
            ),
            _ => Ok(()),
        }
    }

    pub fn slipway(&self) -> &SlipwayConfig {
        &self.tool.slipway
    }

    /// Whether the version is declared dynamic and must be read from
    /// the build description.
    pub fn has_dynamic_version(&self) -> bool {
        self.project.dynamic.iter().any(|d| d == "version")
    }
}

impl ProjectTable {
    /// Resolve the readme to its text and content type, reading the
    /// referenced file when needed.
    pub fn readme_content(&self, source_dir: &Path) -> Result<Option<(String, String)>> {
        let Some(readme) = &self.readme else {
            return Ok(None);
        };
        match readme {
            Readme::Path(file) => {
                let text = fs::read_to_string(&source_dir.join(file))?;
                Ok(Some((text, content_type_for(file))))
            }
            Readme::Table {
                file,
                text,
                content_type,
            } => {
                let body = match (text, file) {
                    (Some(text), _) => text.clone(),
                    (None, Some(file)) => fs::read_to_string(&source_dir.join(file))?,
                    (None, None) => bail!("project.readme table needs either `file` or `text`"),
                };
                let ct = match (content_type, file) {
                    (Some(ct), _) => ct.clone(),
                    (None, Some(file)) => content_type_for(file),
                    (None, None) => "text/plain".to_string(),
                };
                Ok(Some((body, ct)))
            }
        }
    }

    /// The license as a single metadata line, if expressible as one.
    pub fn license_text(&self, source_dir: &Path) -> Result<Option<String>> {
        match &self.license {
            None => Ok(None),
            Some(License::Expression(expr)) => Ok(Some(expr.clone())),
            Some(License::Table { text, file }) => match (text, file) {
                (Some(text), _) => Ok(Some(text.clone())),
                (None, Some(file)) => Ok(Some(fs::read_to_string(&source_dir.join(file))?)),
                (None, None) => Ok(None),
            },
        }
    }
}

fn content_type_for(file: &str) -> String {
    let lower = file.to_lowercase();
    if lower.ends_with(".md") {
        "text/markdown".to_string()
    } else if lower.ends_with(".rst") {
        "text/x-rst".to_string()
    } else {
        "text/plain".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<PyProject> {
        let doc: PyProject = toml::from_str(text)?;
        doc.validate()?;
        Ok(doc)
    }

    #[test]
    fn test_minimal_pyproject() {
        let doc = parse(
            r#"
            [project]
            name = "demo"
            version = "1.0.0"
            "#,
        )
        .unwrap();
        assert_eq!(doc.project.name, "demo");
        assert_eq!(doc.project.version.as_deref(), Some("1.0.0"));
        assert!(!doc.slipway().limited_api);
        assert!(doc.slipway().args.setup.is_empty());
    }

    #[test]
    fn test_tool_table() {
        let doc = parse(
            r#"
            [project]
            name = "demo"
            version = "0.2.0"

            [tool.slipway]
            meson = "/opt/meson/meson.py"
            limited-api = true
            python-source = "python"
            sdist-exclude = ["*.orig"]

            [tool.slipway.args]
            setup = ["-Doptimization=3"]
            install = ["--tags=runtime"]
            "#,
        )
        .unwrap();
        let config = doc.slipway();
        assert_eq!(config.meson.as_deref(), Some("/opt/meson/meson.py"));
        assert!(config.limited_api);
        assert_eq!(config.python_source.as_deref(), Some(Path::new("python")));
        assert_eq!(config.args.setup, vec!["-Doptimization=3"]);
        assert_eq!(config.args.install, vec!["--tags=runtime"]);
    }

    #[test]
    fn test_dynamic_version() {
        let doc = parse(
            r#"
            [project]
            name = "demo"
            dynamic = ["version"]
            "#,
        )
        .unwrap();
        assert!(doc.has_dynamic_version());
        assert!(doc.project.version.is_none());
    }

    #[test]
    fn test_version_missing_and_not_dynamic() {
        let err = parse(
            r#"
            [project]
            name = "demo"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("project.version is missing"));
    }

    #[test]
    fn test_version_both_set_and_dynamic() {
        let err = parse(
            r#"
            [project]
            name = "demo"
            version = "1.0"
            dynamic = ["version"]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("both set and declared dynamic"));
    }

    #[test]
    fn test_license_forms() {
        let expr = parse(
            r#"
            [project]
            name = "demo"
            version = "1.0"
            license = "MIT"
            "#,
        )
        .unwrap();
        assert_eq!(
            expr.project.license_text(Path::new(".")).unwrap().as_deref(),
            Some("MIT")
        );

        let table = parse(
            r#"
            [project]
            name = "demo"
            version = "1.0"
            license = { text = "BSD-3-Clause" }
            "#,
        )
        .unwrap();
        assert_eq!(
            table
                .project
                .license_text(Path::new("."))
                .unwrap()
                .as_deref(),
            Some("BSD-3-Clause")
        );
    }

    #[test]
    fn test_readme_content_type() {
        assert_eq!(content_type_for("README.md"), "text/markdown");
        assert_eq!(content_type_for("README.rst"), "text/x-rst");
        assert_eq!(content_type_for("README"), "text/plain");
    }
}
