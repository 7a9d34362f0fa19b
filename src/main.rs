// main.rs uses items from lib.rs

use anyhow::Result;
use chainweave::{cli, commands};
use log::error;

fn main() -> Result<()> {
    let matches = cli::parse_cli();

    if let Err(e) = commands::dispatch_command(matches.command, matches.threads, matches.verbose) {
        error!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
