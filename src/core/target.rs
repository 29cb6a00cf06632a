//! Build-target descriptions - what the build system produces.
//!
//! A `BuildTarget` is one entry from the build system's target list,
//! used to decide whether an installed file carries machine code.

use serde::Deserialize;

/// The kind of target being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum TargetKind {
    #[serde(rename = "executable")]
    Executable,

    #[serde(rename = "shared library")]
    SharedLibrary,

    #[serde(rename = "static library")]
    StaticLibrary,

    /// Loadable module, the usual kind for Python extension modules
    #[serde(rename = "shared module")]
    SharedModule,

    #[serde(rename = "jar")]
    Jar,

    #[serde(rename = "run")]
    Run,

    /// Custom targets and any kind newer build tools add
    #[serde(other)]
    Custom,
}

impl TargetKind {
    /// Compiled kinds carry machine code, which forces a
    /// platform-specific wheel when their output lands in it.
    pub fn is_compiled(self) -> bool {
        matches!(
            self,
            TargetKind::Executable
                | TargetKind::SharedLibrary
                | TargetKind::StaticLibrary
                | TargetKind::SharedModule
        )
    }
}

/// One entry from the build system's `--targets` introspection list.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildTarget {
    pub name: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TargetKind,
    #[serde(default)]
    pub installed: bool,
    /// Output files in the build tree.
    #[serde(default)]
    pub filename: Vec<String>,
    #[serde(default)]
    pub subproject: Option<String>,
}
