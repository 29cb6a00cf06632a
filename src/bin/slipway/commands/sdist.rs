//! `slipway sdist` command

use anyhow::Result;

use crate::cli::SdistArgs;
use slipway::ops::{self, build_sdist, SdistOptions};

pub fn execute(args: SdistArgs) -> Result<()> {
    let opts = SdistOptions {
        source_dir: args.source_dir,
        out_dir: args.out,
    };

    let sdist = build_sdist(&opts)?;
    eprintln!("    Finished {}", ops::display_path(&sdist));

    Ok(())
}
