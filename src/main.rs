use brc_processor::cli::{run, Cli};
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error[{}]: {}", e.kind(), e);
        std::process::exit(e.exit_code());
    }
}
