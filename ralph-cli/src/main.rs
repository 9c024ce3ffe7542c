use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = ralph_cli::Cli::parse();
    ralph_cli::dispatch(cli).await
}
