//! `slipway build` command

use anyhow::Result;

use crate::cli::BuildArgs;
use slipway::ops::{self, build_wheel, WheelOptions};

pub fn execute(args: BuildArgs) -> Result<()> {
    let opts = WheelOptions {
        source_dir: args.source_dir,
        build_dir: args.build_dir,
        out_dir: args.out,
        setup_args: args.setup_args,
        compile_args: args.compile_args,
        install_args: args.install_args,
    };

    let wheel = build_wheel(&opts)?;
    eprintln!("    Finished {}", ops::display_path(&wheel));

    Ok(())
}
