//! Slipway - a build bridge that drives Meson to produce Python wheels
//!
//! Slipway runs the configure, compile and staged-install steps of a
//! Meson project, reads the machine-readable install plan back out,
//! maps every staged file onto the wheel layout, and packs the result
//! into reproducible wheel and sdist archives. It can also link a
//! project into a Python environment in editable mode.
//!
//! The library is organized around the build cycle:
//!
//! - [`core`] - project configuration, metadata and the build session
//! - [`meson`] - locating and driving the external build tool
//! - [`mapper`] - turning the install plan into a wheel file tree
//! - [`assemble`] - writing wheel and sdist archives
//! - [`editable`] - shadow-tree sync for editable installs
//! - [`ops`] - the high-level operations behind each CLI command

pub mod assemble;
pub mod core;
pub mod editable;
pub mod mapper;
pub mod meson;
pub mod ops;
pub mod util;

pub use core::metadata::ProjectId;
pub use core::plan::{ArtifactTree, DestCategory, InstallPlanEntry};
pub use core::pyproject::PyProject;
pub use core::session::BuildSession;
pub use meson::MesonDriver;
