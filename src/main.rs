use clap::Parser;
use growth_model::api::{Cli, run_cli};

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run_cli(cli).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
