mod commands;
mod terminal;

use std::sync::{Arc, Mutex};

use commands::{CommandLine, Commands, config, daemon, discover, inventory, job};
use netinv_common::config::DiscoveryConfig;
use netinv_core::discovery::DiscoveryService;
use netinv_core::inventory::SqliteInventory;
use terminal::logging::LogMode;
use terminal::{print, spinner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    let mode = if commands.command.is_background() {
        LogMode::Json
    } else {
        LogMode::Interactive
    };
    spinner::init_logging(mode)?;

    let mut cfg = DiscoveryConfig::load(commands.config.as_deref())?;
    if let Some(db) = commands.db {
        cfg.database_path = db;
    }

    match commands.command {
        Commands::Discover(args) => {
            print::header("getting ready for discovery");
            let service = open_service(&cfg)?;
            discover::discover(&service, args.into()).await
        }
        Commands::Job { scan, attempts } => {
            let service = Arc::new(open_service(&cfg)?);
            job::job(service, scan.into(), attempts).await
        }
        Commands::Daemon => {
            let service = Arc::new(open_service(&cfg)?);
            daemon::daemon(service, &cfg).await
        }
        Commands::Inventory => {
            print::header("inventory");
            let store = SqliteInventory::open(&cfg.database_path)?;
            inventory::inventory(&store)
        }
        Commands::Config => config::config(&cfg),
    }
}

fn open_service(cfg: &DiscoveryConfig) -> anyhow::Result<DiscoveryService<SqliteInventory>> {
    let store = SqliteInventory::open(&cfg.database_path)?;
    DiscoveryService::from_config(cfg, Arc::new(Mutex::new(store)))
}
