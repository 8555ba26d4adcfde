mod adapters;
mod commands;
mod detect;
mod health;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use devdeck_core::config::LauncherConfig;
use devdeck_core::lifecycle::Launcher;
use devdeck_core::storage::FileStore;

use adapters::{LocalProcessHost, SystemBrowser};

#[derive(Parser)]
#[command(name = "devdeck")]
#[command(about = "Register, create and monitor local full-stack projects", long_about = None)]
struct Cli {
    /// Config file (skips discovery)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered projects (default)
    List,
    /// Show the next free frontend/backend ports
    Ports,
    /// List hidden built-in projects
    Removed,
    /// Scaffold a new frontend + backend project and register it
    Create {
        name: String,
        #[arg(short, long)]
        path: PathBuf,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Register an existing project folder
    Import {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Remove a project (built-ins are hidden, not deleted)
    Remove { id: String },
    /// Show a hidden built-in project again
    Restore { id: String },
    /// Run one health check round
    Status,
    /// Keep checking health until Ctrl-C
    Watch,
    /// Start a project's services and watch them until Ctrl-C
    Up { id: String },
    /// Open a project's frontend in the browser
    Open { id: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(explicit: Option<PathBuf>) -> Result<LauncherConfig> {
    if let Some(path) = explicit {
        return LauncherConfig::load(&path)
            .with_context(|| format!("failed to load {}", path.display()));
    }

    let cwd = std::env::current_dir().context("failed to get current directory")?;
    let (path, config) = LauncherConfig::discover(&cwd)?;
    match path {
        Some(path) => debug!(config = %path.display(), "loaded config"),
        None => debug!("no config file found, using defaults"),
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(cli.config)?;
    let store = FileStore::open_in(&config.resolved_data_dir());
    debug!(store = %store.path().display(), "using store");

    let mut launcher = Launcher::new(
        store,
        config,
        Arc::new(LocalProcessHost::new()),
        Arc::new(SystemBrowser),
    );
    let prober = health::default_prober();

    match cli.command.unwrap_or(Commands::List) {
        Commands::List => commands::run_list(&launcher),
        Commands::Ports => commands::run_ports(&launcher),
        Commands::Removed => commands::run_removed(&launcher),
        Commands::Create {
            name,
            path,
            description,
        } => commands::run_create(&mut launcher, name, path, description).await,
        Commands::Import {
            path,
            name,
            description,
        } => commands::run_import(&mut launcher, path, name, description),
        Commands::Remove { id } => commands::run_remove(&mut launcher, &id),
        Commands::Restore { id } => commands::run_restore(&mut launcher, &id),
        Commands::Status => commands::run_status(&launcher, prober).await,
        Commands::Watch => commands::run_watch(&launcher, prober).await,
        Commands::Up { id } => commands::run_up(&launcher, &id, prober).await,
        Commands::Open { id } => commands::run_open(&launcher, &id).await,
    }
}
