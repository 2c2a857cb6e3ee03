//! Command-line front end for importing and querying regulatory interaction
//! tables.

use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().run()
}
