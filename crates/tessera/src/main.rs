//! Tessera CLI - static site compiler for HTML components.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Overrides;

mod commands;
mod config;
mod watcher;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Static site compiler for HTML components")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to tessera.toml config file
    #[arg(short, long, default_value = "tessera.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a site in the current directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Build the site
    Build {
        /// Output directory (defaults to config or "dist")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip minification
        #[arg(long)]
        no_minify: bool,
    },

    /// Build the site, then rebuild affected pages on change
    Watch {
        /// Output directory (defaults to config or "dist")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip minification
        #[arg(long)]
        no_minify: bool,
    },
}

fn overrides(output: Option<PathBuf>, no_minify: bool) -> Overrides {
    Overrides {
        output,
        minify: if no_minify { Some(false) } else { None },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(Path::new("."), yes).await?;
        }
        Commands::Build { output, no_minify } => {
            commands::build::run(&cli.config, overrides(output, no_minify)).await?;
        }
        Commands::Watch { output, no_minify } => {
            commands::watch::run(&cli.config, overrides(output, no_minify)).await?;
        }
    }

    Ok(())
}
