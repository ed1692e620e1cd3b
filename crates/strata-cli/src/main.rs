//! `strata` binary: serve the orchestration API or check a workflow file.

mod config;

use clap::{Parser, Subcommand};
use config::StrataConfig;
use std::path::PathBuf;
use std::sync::Arc;
use strata_gateway::GatewayServer;
use strata_orchestrator::{CreateWorkflowRequest, GraphValidator};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata", about = "Strata — DAG workflow orchestration engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "strata.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Validate a workflow definition (JSON) and print its execution order
    Validate {
        /// Path to a JSON file shaped like the create-workflow request body
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            let config = StrataConfig::load(&cli.config).await?;
            let host = host.unwrap_or(config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let engine = Arc::new(config.build_engine().await?);
            let app = GatewayServer::build(engine);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(addr = %addr, "Strata gateway listening");
            axum::serve(listener, app).await?;
        }
        Commands::Validate { file } => {
            let raw = tokio::fs::read_to_string(&file).await.map_err(|e| {
                anyhow::anyhow!("Failed to read workflow file '{}': {}", file.display(), e)
            })?;
            let request: CreateWorkflowRequest = serde_json::from_str(&raw)?;
            let topology = GraphValidator::new().validate(&request.tasks)?;

            println!(
                "Workflow '{}' is valid: {} task(s)",
                request.name,
                topology.len()
            );
            println!("Execution order:");
            for (step, id) in topology.ordered_ids().into_iter().enumerate() {
                println!("  {}. {id}", step + 1);
            }
        }
    }

    Ok(())
}
