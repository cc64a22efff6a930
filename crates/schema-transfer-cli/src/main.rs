//! schema-transfer CLI
//!
//! Synchronizes schema and collection data from the local (master) instance to
//! a remote one.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    activity, collections, folders, instances, provision,
    schema::{self, SchemaCommand},
    transfer::{self, TransferArgs},
    Context,
};

#[derive(Parser, Debug)]
#[command(name = "schema-transfer")]
#[command(about = "Schema and data sync between two Directus instances", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (defaults to $SCHEMA_TRANSFER_CONFIG, then the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Remote instance id for this invocation only
    #[arg(short, long, global = true)]
    remote: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List configured instances
    Instances,

    /// Remember which instance is the remote
    SelectRemote {
        /// Instance id
        id: String,
    },

    /// Compare and apply schemas
    #[command(subcommand)]
    Schema(SchemaCommand),

    /// List user collections with their sync state
    Collections,

    /// Summarize changed items from the activity log
    Activity {
        /// Only this collection
        #[arg(long)]
        collection: Option<String>,
    },

    /// Copy a collection's data from master to remote
    Transfer(TransferArgs),

    /// Create the bookkeeping collection where it is missing
    Provision,

    /// Print the master's folder tree
    Folders,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = Context::load(cli.config.as_deref(), cli.remote)?;

    match cli.command {
        Commands::Instances => instances::list(&ctx)?,
        Commands::SelectRemote { id } => instances::select_remote(&ctx, &id)?,
        Commands::Schema(cmd) => schema::handle_schema_command(cmd, &ctx).await?,
        Commands::Collections => collections::run(&ctx).await?,
        Commands::Activity { collection } => activity::run(&ctx, collection.as_deref()).await?,
        Commands::Transfer(args) => transfer::run(args, &ctx).await?,
        Commands::Provision => provision::run(&ctx).await?,
        Commands::Folders => folders::run(&ctx).await?,
    }

    Ok(())
}
