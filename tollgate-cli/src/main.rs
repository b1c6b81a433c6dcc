//! Tollgate CLI
//!
//! Runs the Tollgate API server and inspects its effective configuration.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tollgate_api::{ApiConfig, ApiServer};
use tollgate_core::types::FailurePolicy;

/// Tollgate - response caching and tiered admission control
#[derive(Parser)]
#[command(name = "tollgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "TOLLGATE_PORT", default_value = "3001")]
        port: u16,
        /// Bind address
        #[arg(short, long, env = "TOLLGATE_BIND", default_value = "0.0.0.0")]
        bind: String,
    },

    /// Show the per-tier admission budgets
    Tiers,

    /// Print the effective configuration as JSON
    Config {
        /// Single-line output
        #[arg(long)]
        compact: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "tollgate=debug,info"
    } else {
        "tollgate=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve { port, bind } => cmd_serve(port, &bind).await,
        Commands::Tiers => cmd_tiers(),
        Commands::Config { compact } => cmd_config(compact),
    }
}

fn load_config() -> Result<ApiConfig> {
    let config = ApiConfig::from_env().context("Invalid TOLLGATE_* configuration")?;
    debug!(
        cache = config.enable_cache,
        ttl_secs = config.cache.default_ttl_seconds,
        tiers = config.admission.tiers.len(),
        "loaded configuration"
    );
    Ok(config)
}

/// Run API server
async fn cmd_serve(port: u16, bind: &str) -> Result<()> {
    let config = load_config()?;
    let cache_enabled = config.enable_cache;
    let server = ApiServer::new(config).context("Failed to initialize server state")?;

    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {bind}:{port}"))?;

    println!("{}", "🚧 Starting Tollgate API server...".cyan().bold());
    println!("   {} http://{}", "Listening on:".green(), addr);
    println!("   {} http://{}/health", "Health check:".dimmed(), addr);
    println!(
        "   {} {}",
        "Response cache:".dimmed(),
        if cache_enabled { "on".green() } else { "off".yellow() }
    );
    println!("\n   Press Ctrl+C to stop.\n");

    server.run(addr).await.context("Server terminated")?;

    Ok(())
}

/// Show tier budgets
fn cmd_tiers() -> Result<()> {
    let config = load_config()?;

    println!("{}", "🎟  Admission tiers".cyan().bold());
    println!();
    println!(
        "   {:<16} {:>8} {:>10}  {}",
        "TIER".dimmed(),
        "BUDGET".dimmed(),
        "WINDOW".dimmed(),
        "ON FAILURE".dimmed()
    );

    for tier in &config.admission.tiers {
        let policy = match tier.failure_policy {
            FailurePolicy::Open => "open".green(),
            FailurePolicy::Closed => "closed".red(),
        };
        println!(
            "   {:<16} {:>8} {:>10}  {}",
            tier.tier.to_string().bold(),
            tier.max_requests,
            format_window(tier.window_seconds),
            policy
        );
    }

    Ok(())
}

/// Print effective configuration
fn cmd_config(compact: bool) -> Result<()> {
    let config = load_config()?;
    let json = if compact {
        serde_json::to_string(&config)?
    } else {
        serde_json::to_string_pretty(&config)?
    };
    println!("{json}");
    Ok(())
}

fn format_window(secs: u64) -> String {
    match secs {
        s if s >= 3600 && s % 3600 == 0 => format!("{} h", s / 3600),
        s if s >= 60 && s % 60 == 0 => format!("{} min", s / 60),
        s => format!("{s} s"),
    }
}
