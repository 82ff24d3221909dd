//! vmclone CLI - template-based VM provisioning

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod util;

/// vmclone - Clone VM templates into nested inventory folders
#[derive(Parser)]
#[command(name = "vmclone")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone a template as described by a request file
    Provision {
        /// Inventory snapshot (JSON)
        #[arg(long)]
        inventory: PathBuf,
        /// Provisioning request (JSON)
        #[arg(long)]
        request: PathBuf,
        /// Write the updated inventory back to the snapshot
        #[arg(long)]
        save: bool,
    },
    /// Resolve a folder path, creating missing levels
    Resolve {
        /// Inventory snapshot (JSON)
        #[arg(long)]
        inventory: PathBuf,
        /// Datacenter whose VM folder anchors the path
        #[arg(long)]
        datacenter: String,
        /// Folder names from the top level down
        #[arg(required = true)]
        segments: Vec<String>,
        /// Write the updated inventory back to the snapshot
        #[arg(long)]
        save: bool,
    },
    /// Pick placement recommendations covering a set of disks
    Select {
        /// Recommendations (JSON array)
        #[arg(long)]
        recommendations: PathBuf,
        /// Number of placement groups allowed
        #[arg(long)]
        groups: usize,
        /// Disk ids to cover (repeatable)
        #[arg(long = "disk", allow_negative_numbers = true)]
        disks: Vec<i32>,
    },
    /// Move existing VMs into a folder path
    Relocate {
        /// Inventory snapshot (JSON)
        #[arg(long)]
        inventory: PathBuf,
        /// Datacenter whose VM folder anchors the path
        #[arg(long)]
        datacenter: String,
        /// Folder names from the top level down (repeatable)
        #[arg(long = "folder", required = true)]
        folder: Vec<String>,
        /// VM names to move
        #[arg(required = true)]
        vms: Vec<String>,
        /// Write the updated inventory back to the snapshot
        #[arg(long)]
        save: bool,
    },
    /// Set custom attribute values on a VM
    Attributes {
        /// Inventory snapshot (JSON)
        #[arg(long)]
        inventory: PathBuf,
        /// VM name
        #[arg(long)]
        guest: String,
        /// Attributes as key=value
        #[arg(required = true)]
        values: Vec<String>,
        /// Write the updated inventory back to the snapshot
        #[arg(long)]
        save: bool,
    },
    /// View and edit timing configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show all configuration values
    List,
    /// Print a single value
    Get {
        /// Key, e.g. timing.retry_backoff_secs
        key: String,
    },
    /// Change a value
    Set {
        /// Key, e.g. timing.retry_backoff_secs
        key: String,
        value: String,
    },
    /// Show the config file location
    Path {
        /// Create the file with defaults if missing
        #[arg(long)]
        create: bool,
    },
    /// Print an example configuration
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout carries the JSON results
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Provision { inventory, request, save } => cmd::provision::run(&inventory, &request, save).await,
        Commands::Resolve { inventory, datacenter, segments, save } => {
            cmd::resolve::run(&inventory, &datacenter, &segments, save).await
        }
        Commands::Select { recommendations, groups, disks } => cmd::select::run(&recommendations, groups, &disks).await,
        Commands::Relocate { inventory, datacenter, folder, vms, save } => {
            cmd::relocate::run(&inventory, &datacenter, &folder, &vms, save).await
        }
        Commands::Attributes { inventory, guest, values, save } => {
            cmd::attributes::run(&inventory, &guest, &values, save).await
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list().await,
            ConfigCommands::Get { key } => cmd::config::run_get(&key).await,
            ConfigCommands::Set { key, value } => cmd::config::run_set(&key, &value).await,
            ConfigCommands::Path { create } => cmd::config::run_path(create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}
