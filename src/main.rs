use clap::Parser;
use ollama_relay::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    ollama_relay::init_tracing(cli.debug);

    if let Err(e) = ollama_relay::run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}
