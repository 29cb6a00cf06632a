//! Subcommand implementations.

pub mod build;
pub mod clean;
pub mod completions;
pub mod develop;
pub mod doctor;
pub mod sdist;
