//! `slipway clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use slipway::ops::{self, clean, CleanOptions};

pub fn execute(args: CleanArgs) -> Result<()> {
    let opts = CleanOptions {
        source_dir: args.source_dir,
        build_dir: args.build_dir,
        dist: args.dist,
    };

    let removed = clean(&opts)?;
    if removed.is_empty() {
        eprintln!("     Nothing to remove");
    }
    for dir in removed {
        eprintln!("     Removed {}", ops::display_path(&dir));
    }

    Ok(())
}
