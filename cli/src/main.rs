//! LAC Node CLI
//!
//! # Usage
//!
//! ```bash
//! # Start a node
//! lac run --datadir ./lac-data/n1 --port 38400
//!
//! # Start and sync from a bootstrap peer
//! lac run --port 38401 --bootstrap http://127.0.0.1:38400
//!
//! # Start with local peer discovery
//! lac run --discover
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lac_node::{Node, NodeConfig};
use tracing::error;

mod logging;

/// LAC anonymous ledger node
#[derive(Parser)]
#[command(name = "lac")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "LAC: anonymous privacy-preserving ledger node", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node
    Run {
        /// Data directory
        #[arg(long, default_value = "./lac-data/n1", env = "LAC_DATADIR")]
        datadir: PathBuf,

        /// HTTP port
        #[arg(long, default_value_t = 38400)]
        port: u16,

        /// Bootstrap peer URL (e.g. http://127.0.0.1:38400)
        #[arg(long)]
        bootstrap: Option<String>,

        /// Auto-discover peers in the local network
        #[arg(long)]
        discover: bool,

        /// Use development parameters (commitment interval 10, 3 witnesses)
        #[arg(long)]
        dev: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level, cli.json_logs) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Commands::Run {
            datadir,
            port,
            bootstrap,
            discover,
            dev,
        } => {
            let mut config = if dev {
                NodeConfig::dev(datadir, port)
            } else {
                NodeConfig::prod(datadir, port)
            };
            config.bootstrap = bootstrap;
            config.discover = discover;

            let node = match Node::new(config) {
                Ok(node) => node,
                Err(e) => {
                    error!("node startup failed: {e}");
                    return ExitCode::FAILURE;
                }
            };
            match node.run().await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("node shut down with error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
