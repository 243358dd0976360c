pub mod config;
pub mod daemon;
pub mod discover;
pub mod inventory;
pub mod job;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use netinv_core::discovery::ScanRequest;

#[derive(Parser)]
#[command(name = "netinv")]
#[command(about = "Network inventory with subnet discovery.")]
pub struct CommandLine {
    /// Configuration file (defaults to $NETINV_CONFIG, then ./netinv.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Inventory database, overriding `database_path`
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Subnet in CIDR notation (defaults to `default_subnet`)
    pub subnet: Option<String>,

    /// Per-host probe timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Report what would change without writing to the inventory
    #[arg(long)]
    pub dry_run: bool,
}

impl From<ScanArgs> for ScanRequest {
    fn from(args: ScanArgs) -> Self {
        Self {
            subnet: args.subnet,
            timeout_seconds: args.timeout,
            dry_run: args.dry_run,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover hosts and reconcile them into the inventory
    #[command(alias = "d")]
    Discover(ScanArgs),
    /// Run one discovery as a background job with structured logs
    #[command(alias = "j")]
    Job {
        #[command(flatten)]
        scan: ScanArgs,
        /// Attempts before the job is reported as failed
        #[arg(long, default_value_t = 3)]
        attempts: u32,
    },
    /// Run discovery on the configured schedule until interrupted
    Daemon,
    /// Show devices with their addresses and services
    #[command(alias = "i")]
    Inventory,
    /// Print the effective configuration
    Config,
}

impl Commands {
    /// Background commands log JSON instead of drawing to the terminal.
    pub fn is_background(&self) -> bool {
        matches!(self, Self::Job { .. } | Self::Daemon)
    }
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
