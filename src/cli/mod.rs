pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "netpath")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Traceroute-style network path scheduler for host telemetry agents", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the scheduler against the targets of a config file")]
    Run {
        #[arg(short, long, help = "Path to a YAML config file")]
        config: Option<String>,
    },
    #[command(about = "Run a single probe and print the resulting path as JSON")]
    Probe {
        #[arg(help = "Destination IPv4 address")]
        hostname: String,

        #[arg(short, long, default_value_t = 80, help = "Destination port")]
        port: u16,

        #[arg(long, default_value_t = 1000, help = "Per-hop timeout in milliseconds")]
        timeout_ms: u64,
    },
}
