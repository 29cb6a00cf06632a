//! Argument parsing for the slipway CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Slipway - Build Python wheels from Meson projects
#[derive(Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print debug-level detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a wheel from the current project
    Build(BuildArgs),

    /// Build a source distribution
    Sdist(SdistArgs),

    /// Build and link the project into a Python environment
    Develop(DevelopArgs),

    /// Remove build directories
    Clean(CleanArgs),

    /// Check that the build environment is usable
    Doctor(DoctorArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Build directory (defaults to build/<platform> in the project)
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Directory to write the wheel into (defaults to dist/)
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Extra argument for `meson setup` (repeatable)
    #[arg(long = "setup-arg", value_name = "ARG")]
    pub setup_args: Vec<String>,

    /// Extra argument for `meson compile` (repeatable)
    #[arg(long = "compile-arg", value_name = "ARG")]
    pub compile_args: Vec<String>,

    /// Extra argument for `meson install` (repeatable)
    #[arg(long = "install-arg", value_name = "ARG")]
    pub install_args: Vec<String>,
}

#[derive(Args)]
pub struct SdistArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Directory to write the sdist into (defaults to dist/)
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct DevelopArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Build directory (defaults to build/<platform> in the project)
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Site directory to install the redirection into (defaults to the
    /// interpreter's purelib directory)
    #[arg(long, value_name = "DIR")]
    pub site_dir: Option<PathBuf>,

    /// Extra argument for `meson setup` (repeatable)
    #[arg(long = "setup-arg", value_name = "ARG")]
    pub setup_args: Vec<String>,

    /// Extra argument for `meson compile` (repeatable)
    #[arg(long = "compile-arg", value_name = "ARG")]
    pub compile_args: Vec<String>,

    /// Extra argument for `meson install` (repeatable)
    #[arg(long = "install-arg", value_name = "ARG")]
    pub install_args: Vec<String>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Remove only this build directory instead of build/ as a whole
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Also remove built distributions in dist/
    #[arg(long)]
    pub dist: bool,
}

#[derive(Args)]
pub struct DoctorArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
