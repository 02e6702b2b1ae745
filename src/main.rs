//! aws-infra-mcp: MCP server exposing cloud infrastructure to AI agents
//!
//! Serves EC2 resources and tools over stdin/stdout. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use infra_mcp::config;
use infra_mcp::ec2;
use infra_mcp::error::ServeError;
use infra_mcp::infra::{InMemoryFleet, InfraClient};
use infra_mcp::mcp::{McpServer, ServerInfo, Shutdown, ShutdownTrigger, StdioTransport};

/// MCP server exposing cloud infrastructure resources and actions to AI agents.
#[derive(Parser, Debug)]
#[command(name = "infra-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)]
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Fires `trigger` on SIGINT or SIGTERM.
#[cfg(unix)]
async fn wait_for_signal(trigger: ShutdownTrigger) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "failed to listen for SIGINT");
                return;
            }
            info!("received SIGINT");
        }
        _ = terminate.recv() => info!("received SIGTERM"),
    }
    trigger.trigger();
}

/// Fires `trigger` on Ctrl+C.
#[cfg(not(unix))]
async fn wait_for_signal(trigger: ShutdownTrigger) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received Ctrl+C");
            trigger.trigger();
        }
        Err(e) => error!(error = %e, "failed to listen for Ctrl+C"),
    }
}

/// Entry point for the infra-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nConfig read from: {}", default_path.display());
                }
            }
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        name = %cfg.server.name,
        version = %cfg.server.version,
        region = %cfg.aws.region,
        "Starting MCP server"
    );

    let client: Arc<dyn InfraClient> = Arc::new(InMemoryFleet::new(cfg.aws.region.clone()));
    let info = ServerInfo {
        name: cfg.server.name,
        version: cfg.server.version,
    };
    let dispatcher = match ec2::build_dispatcher(info, client) {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(e) => {
            error!(error = %e, "Failed to register handlers");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async move {
        let (trigger, shutdown) = Shutdown::channel();
        tokio::spawn(wait_for_signal(trigger));

        info!("MCP server ready, waiting for client connection...");
        let mut server = McpServer::new(dispatcher, StdioTransport::stdio());
        server.run(shutdown).await
    });
    // A cancelled stdin read is parked on a blocking thread; don't wait for it.
    runtime.shutdown_background();

    match result {
        Ok(()) | Err(ServeError::Cancelled) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
