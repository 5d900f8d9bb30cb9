use clap::Parser;
use relbeacon_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init(cli.command.log_target(), cli.verbose) {
        eprintln!("relbeacon: logging disabled: {:#}", err);
    }

    if let Err(err) = cli.run().await {
        eprintln!("relbeacon error: {:#}", err);
        std::process::exit(1);
    }
}
