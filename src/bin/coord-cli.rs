//! Command-line interface for inspecting a running coordination core: fetching a
//! conversation's trace and pinging its health endpoint.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the running API Boundary Adapter.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    base_url: String,
}

#[derive(Subcommand)]
enum Command {
    /// Pings `GET /health`.
    Health,
    /// Fetches `GET /conversation/{id}`.
    Trace {
        /// The conversation id to fetch.
        conversation_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = reqwest::Client::new();

    match args.command {
        Command::Health => {
            let response = client.get(format!("{}/health", args.base_url)).send().await?;
            println!("{}", response.text().await?);
        }
        Command::Trace { conversation_id } => {
            let response = client
                .get(format!("{}/conversation/{conversation_id}", args.base_url))
                .send()
                .await?;
            println!("{}", response.text().await?);
        }
    }

    Ok(())
}
