//! `slipway doctor` command

use anyhow::Result;

use crate::cli::DoctorArgs;
use slipway::ops::{doctor, format_report, DoctorOptions};

pub fn execute(args: DoctorArgs, verbose: bool) -> Result<()> {
    let report = doctor(&DoctorOptions {
        source_dir: args.source_dir,
    })?;
    print!("{}", format_report(&report, verbose));

    // a failed required check means builds cannot work
    if !report.all_required_passed() {
        std::process::exit(1);
    }
    Ok(())
}
