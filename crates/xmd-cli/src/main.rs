//! `xmd` binary entry point (§6): parses arguments, initializes
//! `tracing-subscriber` from `RUST_LOG`, and hands off to
//! [`xmd_cli::run`].

use clap::Parser;
use xmd_cli::Cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    std::process::exit(xmd_cli::run(&cli));
}
