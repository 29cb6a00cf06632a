//! Shared filesystem, hashing and process plumbing.

pub mod fs;
pub mod hash;
pub mod process;

pub use hash::Fingerprint;
pub use process::ProcessBuilder;
