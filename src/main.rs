use anyhow::Result;
use clap::Parser;
use tracing::error;

use dnscl::{analyze_log_file, print_report, utils, Args, RenderOptions, ScanOptions};

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose);
    utils::validate_args(&args)?;

    let mode = args.command.to_mode();
    let options = RenderOptions {
        quiet: args.quiet,
        top: args.top,
    };
    let scan = ScanOptions {
        last_lines: args.lines,
    };

    match analyze_log_file(&args.file, &mode, &scan) {
        Ok(report) => print_report(&report, &options, args.json),
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
