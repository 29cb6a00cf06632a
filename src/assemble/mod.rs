//! Turning mapped artifacts into distributable archives.

pub mod record;
pub mod sdist;
pub mod sources;
pub mod wheel;

pub use record::{Record, RecordEntry};
pub use sdist::write_sdist;
pub use sources::SourceSelector;
pub use wheel::{write_wheel, AssemblyIoError, WheelWriter};
