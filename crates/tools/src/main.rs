use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kagent_tools::{config::Config, default_registry};

#[derive(Parser)]
#[command(author, version, about = "Function-calling tools for Cilium, Istio, Prometheus and Grafana", long_about = None)]
struct Cli {
    /// Log level (debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every tool definition as JSON
    List,

    /// Invoke a single tool
    Call {
        /// Tool name, e.g. cilium_status
        name: String,

        /// JSON object with the tool arguments
        #[arg(short, long)]
        args: Option<String>,
    },

    /// Serve the tools over HTTP
    #[cfg(feature = "server")]
    Serve {
        /// Listen address (defaults to SERVER_ADDR)
        #[arg(long)]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so tool output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().context("failed to load configuration")?;
    let registry = default_registry(&config)?;

    match cli.command {
        Commands::List => {
            println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
        }
        Commands::Call { name, args } => {
            let args = match args {
                Some(raw) => serde_json::from_str(&raw).context("--args must be a JSON object")?,
                None => serde_json::Value::Null,
            };
            let result = registry.invoke(&name, args).await;
            if !result.success {
                anyhow::bail!(result.error.unwrap_or_else(|| format!("{} failed", name)));
            }
            println!("{}", result.output);
        }
        #[cfg(feature = "server")]
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.server.addr.clone());
            tracing::info!("Starting tool server on {}", addr);
            kagent_tools::server::Server::new(registry).start(&addr).await?;
        }
    }

    Ok(())
}
