//! Grades API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use grades_api::api::handlers::NO_GRADES;
use grades_api::api::{create_router, AppState};
use grades_api::auth::TokenIssuer;
use grades_api::config::Config;
use grades_api::grade::summarize;
use grades_api::metrics;
use grades_api::store::open_store;
use grades_api::utils::shutdown_signal;

/// Student grade records API.
#[derive(Parser, Debug)]
#[command(name = "grades-api")]
#[command(about = "Authenticated CRUD and summary statistics for student grades")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Print summary statistics for the configured database.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Config is needed for the log format, so load it before logging starts
    // and report failures once the subscriber exists.
    let config = Config::load();
    init_logging(args.verbose, config.as_ref().ok());

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(config),
        Some(Command::Stats) => cmd_stats(config),
        Some(Command::Serve { port }) => cmd_serve(config, port.or(args.port)).await,
        None => cmd_serve(config, args.port).await,
    }
}

fn init_logging(verbose: bool, config: Option<&Config>) {
    let filter = if verbose {
        EnvFilter::new("grades_api=debug,tower_http=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(config.map_or("info", |c| c.rust_log.as_str()))
        })
    };

    let json = config.is_some_and(|c| c.log_json);
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Check configuration validity.
fn cmd_check_config(config: Config) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("GRADES API - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    print!("Opening grade store... ");
    match open_store(config.database_url.as_deref()) {
        Ok(store) => {
            println!("OK");
            println!("  Stored grades: {}", store.list()?.len());
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Grade store could not be opened"));
        }
    }

    let users: Vec<String> = config
        .accounts()
        .unwrap_or_default()
        .into_iter()
        .map(|(user, _)| user)
        .collect();

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Listen: {}:{}", config.bind_address, config.port);
    println!(
        "  Storage: {}",
        match config.database_url.as_deref() {
            Some(path) if !config.is_in_memory() => path,
            _ => "in-memory (records are lost on exit)",
        }
    );
    println!("  Users: {}", users.join(", "));
    println!("  Access token TTL: {}s", config.access_token_ttl_seconds);
    println!("  Refresh token TTL: {}s", config.refresh_token_ttl_seconds);
    println!("  Metrics: {}", if config.enable_metrics { "Enabled" } else { "Disabled" });
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Print the stats endpoint body for the configured database.
fn cmd_stats(config: Config) -> anyhow::Result<()> {
    let store = open_store(config.database_url.as_deref()).context("opening grade store")?;
    let scores = store.scores()?;

    let body = match summarize(&scores) {
        Some(summary) => serde_json::to_string_pretty(&summary)?,
        None => serde_json::json!({ "error": NO_GRADES }).to_string(),
    };
    println!("{}", body);

    Ok(())
}

/// Run the HTTP server until a shutdown signal arrives.
async fn cmd_serve(mut config: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.port = port;
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    info!("Configuration loaded successfully");
    if config.is_in_memory() {
        warn!("DATABASE_URL not set; grades are kept in memory only");
    }

    let store = open_store(config.database_url.as_deref()).context("opening grade store")?;
    let tokens = Arc::new(TokenIssuer::new(
        config.accounts().map_err(anyhow::Error::msg)?,
        config.access_ttl(),
        config.refresh_ttl(),
    ));

    let mut app_state = AppState::new(store, tokens);
    if config.enable_metrics {
        let handle = metrics::install_recorder().context("installing metrics recorder")?;
        app_state = app_state.with_metrics(handle);
    }

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address))?;
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
