//! Core data structures for slipway.
//!
//! This module contains the foundational types used throughout slipway:
//! - Project configuration read from `pyproject.toml`
//! - Project identity and core-metadata rendering
//! - Build targets and the mapped install plan
//! - The per-invocation build session

pub mod metadata;
pub mod plan;
pub mod pyproject;
pub mod session;
pub mod target;

pub use metadata::ProjectId;
pub use plan::{ArtifactTree, DestCategory, DuplicateDestinationError, InstallPlanEntry};
pub use pyproject::{PyProject, SlipwayConfig, PYPROJECT_NAME};
pub use session::BuildSession;
pub use target::{BuildTarget, TargetKind};
