use clap::{Parser, Subcommand};

/// Taskrelay — run-task approval relay for Microsoft Teams
#[derive(Parser)]
#[command(name = "taskrelay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay server
    Serve {
        /// Port to bind (overrides RELAY_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}
