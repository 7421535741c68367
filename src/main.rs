use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod binder;
pub mod cloudformation;
pub mod commands;
pub mod config;
pub mod connect;
pub mod document;
pub mod export;
pub mod logical_id;
pub mod orchestrator;
pub mod stack;
pub mod store;
pub mod templatise;

use commands::Workspace;

#[derive(Parser)]
#[command(name = "callback-provisioner")]
#[command(about = "Provisions the Amazon Connect callback flows and their stacks")]
#[command(version)]
struct Cli {
    /// Path to the deploy file
    #[arg(long, global = true, default_value = "deploy.yaml")]
    config: PathBuf,

    /// Path to the operator parameters
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the configured contact flows from the Connect instance
    Export,

    /// Replace resource references in exported flows with placeholders
    Templatise,

    /// Deploy every configured stack in order
    Deploy,

    /// Deploy, then route the private number and the agent to the callback flows
    Setup,

    /// Restore the private number and the agent routing profile
    Teardown,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let workspace = Workspace::load(&cli.config, &cli.env_file)?;

    match cli.command {
        Commands::Export => commands::export(&workspace).await?,
        Commands::Templatise => commands::templatise(&workspace)?,
        Commands::Deploy => commands::deploy(&workspace).await?,
        Commands::Setup => commands::setup(&workspace).await?,
        Commands::Teardown => commands::teardown(&workspace).await?,
    }

    return Ok(());
}
