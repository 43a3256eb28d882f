use anyhow::{Context, Result};
use ask_bot_relay::app::App;
use ask_bot_relay::function::FunctionEvent;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ask-bot-relay")]
#[command(about = "Relay tutoring chat messages to a hosted completion provider")]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Run one serverless-function event and print the response.
    Invoke {
        /// Event JSON file; reads stdin when omitted.
        #[arg(long, value_name = "FILE")]
        event: Option<PathBuf>,
    },
}

fn read_event(path: Option<&PathBuf>) -> Result<FunctionEvent> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read event from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Event is not a valid function event")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ask_bot_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let app = match App::new() {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize relay: {}", e);
            std::process::exit(1);
        }
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting ask-bot-relay server");
            if let Err(e) = app.serve().await {
                error!("Server failed: {}", e);
                std::process::exit(1);
            }
        }
        Command::Invoke { event } => {
            let event = read_event(event.as_ref())?;
            let response = app.invoke(event).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
