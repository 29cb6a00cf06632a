//! Install-plan entries and the collision-checked artifact tree.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Wheel destination category an install-plan entry maps into.
///
/// The ordering is the order entries are written into the archive:
/// code first, then the data-directory categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DestCategory {
    /// Architecture-independent package code.
    PureCode,
    /// ABI-dependent package code (extension modules).
    PlatformCode,
    /// Command-line entry points.
    Scripts,
    /// C headers shipped for downstream builds.
    Headers,
    /// Arbitrary data files.
    Data,
}

impl DestCategory {
    pub fn describe(self) -> &'static str {
        match self {
            DestCategory::PureCode => "purelib",
            DestCategory::PlatformCode => "platlib",
            DestCategory::Scripts => "scripts",
            DestCategory::Headers => "headers",
            DestCategory::Data => "data",
        }
    }
}

impl fmt::Display for DestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A single staged file mapped onto the wheel layout.
#[derive(Debug, Clone)]
pub struct InstallPlanEntry {
    /// Absolute path of the staged file.
    pub source: PathBuf,
    pub category: DestCategory,
    /// Destination relative to the category root, forward slashes.
    pub dest: String,
    /// Install tag the build system assigned, if any.
    pub tag: Option<String>,
    pub subproject: Option<String>,
    /// Install-plan group the entry came from.
    pub group: String,
    /// Whether the staged content is a native binary.
    pub native: bool,
}

/// Two distinct files claiming the same wheel path.
#[derive(Debug, Error, Diagnostic)]
#[error("two files map to the same {category} path `{dest}`")]
#[diagnostic(
    code(slipway::plan::duplicate_destination),
    help("rename one of the install targets, or give them distinct install directories")
)]
pub struct DuplicateDestinationError {
    pub category: DestCategory,
    pub dest: String,
    pub first: PathBuf,
    pub second: PathBuf,
}

/// Collision-checked collection of mapped entries.
///
/// Entries are keyed by `(category, destination)` so iteration order is
/// deterministic and archive writes are reproducible.
#[derive(Debug, Default)]
pub struct ArtifactTree {
    entries: BTreeMap<(DestCategory, String), InstallPlanEntry>,
}

impl ArtifactTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. A second entry for the same destination is
    /// collapsed when it names the same staged file and rejected when
    /// it does not.
    pub fn insert(&mut self, entry: InstallPlanEntry) -> Result<(), DuplicateDestinationError> {
        let key = (entry.category, entry.dest.clone());
        match self.entries.entry(key) {
            Entry::Occupied(existing) => {
                if existing.get().source != entry.source {
                    return Err(DuplicateDestinationError {
                        category: entry.category,
                        dest: entry.dest,
                        first: existing.get().source.clone(),
                        second: entry.source,
                    });
                }
                Ok(())
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    /// All entries in `(category, destination)` order.
    pub fn iter(&self) -> impl Iterator<Item = &InstallPlanEntry> {
        self.entries.values()
    }

    /// Entries of one category, in destination order.
    pub fn category(&self, category: DestCategory) -> impl Iterator<Item = &InstallPlanEntry> {
        self.entries
            .values()
            .filter(move |e| e.category == category)
    }

    pub fn has(&self, category: DestCategory) -> bool {
        self.category(category).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Architecture independence: no platform code and no native
    /// scripts anywhere in the tree.
    pub fn is_pure(&self) -> bool {
        !self.has(DestCategory::PlatformCode) && !self.iter().any(|e| e.native)
    }
}
