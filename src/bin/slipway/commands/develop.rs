//! `slipway develop` command

use anyhow::Result;

use crate::cli::DevelopArgs;
use slipway::ops::{self, develop, DevelopOptions};

pub fn execute(args: DevelopArgs) -> Result<()> {
    let opts = DevelopOptions {
        source_dir: args.source_dir,
        build_dir: args.build_dir,
        site_dir: args.site_dir,
        setup_args: args.setup_args,
        compile_args: args.compile_args,
        install_args: args.install_args,
    };

    let outcome = develop(&opts)?;
    eprintln!(
        "      Linked {} ({} copied, {} removed)",
        ops::display_path(&outcome.pth_path),
        outcome.copied,
        outcome.removed
    );

    Ok(())
}
