mod cli;
mod error;
mod exit;

use clap::Parser;

fn main() {
    let parsed = cli::Cli::parse();
    if let Err(error) = cli::run(parsed) {
        exit::with_code(error.exit_code(), &error.to_string());
    }
}
