use clap::Parser;
use bx_lang::cli::{init_tracing, Cli, CliHandler};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let handler = CliHandler::new();

    if let Err(e) = handler.handle(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
