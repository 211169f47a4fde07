use anyhow::Result;
use clap::Parser;
use gvrender::cli::{self, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Routes log::info!() etc. to the debug log file, mirrored to stderr when RUST_LOG is set.
    // --log-level takes precedence over RUST_LOG.
    gvrender::debug::init_log_bridge(cli.log_level);
    log::info!("gvrender {} starting", gvrender::VERSION);

    if let Err(e) = cli::run(&cli) {
        eprintln!("gvrender: error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
