//! Runixo Agent - remote management agent guarded by an authentication gateway.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use runixo_agent::auth::Gateway;
use runixo_agent::config::Settings;
use runixo_agent::socket::SocketListener;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

const DEFAULT_CONFIG_PATH: &str = "/etc/runixo/agent.toml";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    // Load configuration
    let config_path = get_config_path(&args);

    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging based on configuration
    init_logging(&settings);

    // Print startup banner
    info!("Starting {} v{}", NAME, VERSION);
    info!("Configuration loaded from: {}", config_path);
    info!("Listen address: {}", settings.server.listen_address);
    info!("Log level: {}", settings.logging.level);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    // Run the async main
    match runtime.block_on(async_main(settings, config_path)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Agent failed");
            ExitCode::FAILURE
        }
    }
}

async fn async_main(
    settings: Settings,
    config_path: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Arc::new(settings);

    // Build the gateway; this also starts the attempt reaper
    let gateway = Arc::new(Gateway::from_config(&settings.security)?);

    // Create and bind the listener
    let listener = SocketListener::bind(Arc::clone(&settings), Arc::clone(&gateway)).await?;

    // Create shutdown notification
    let shutdown = Arc::new(Notify::new());
    let shutdown_for_run = Arc::clone(&shutdown);
    let run = listener.run(shutdown_for_run);
    tokio::pin!(run);

    loop {
        tokio::select! {
            result = &mut run => {
                if let Err(e) = result {
                    error!(error = %e, "RPC listener failed");
                    gateway.shutdown().await;
                    return Err(e.into());
                }
                break;
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, initiating graceful shutdown...");
                shutdown.notify_waiters();

                match tokio::time::timeout(DRAIN_TIMEOUT, listener.wait_for_drain()).await {
                    Ok(()) => info!("Graceful shutdown complete"),
                    Err(_) => warn!(
                        "Shutdown timeout after {}s, some connections may be terminated",
                        DRAIN_TIMEOUT.as_secs()
                    ),
                }
                break;
            }
            _ = reload_signal() => {
                // Settings are fixed at startup; SIGHUP only re-validates the file.
                match Settings::load(&config_path) {
                    Ok(_) => info!("Configuration file valid; restart to apply changes"),
                    Err(e) => error!(error = %e, "Configuration file invalid"),
                }
            }
        }
    }

    gateway.shutdown().await;
    info!("Agent stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Wait for SIGHUP.
#[cfg(unix)]
async fn reload_signal() {
    match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGHUP handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn reload_signal() {
    std::future::pending::<()>().await;
}

fn print_help() {
    println!(
        r#"{} {}
Runixo server agent with an authenticated RPC interface.

USAGE:
    {} [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file
                           [default: {}]
    -h, --help             Print help information
    -V, --version          Print version information
"#,
        NAME, VERSION, NAME, DEFAULT_CONFIG_PATH
    );
}

fn get_config_path(args: &[String]) -> String {
    for (i, arg) in args.iter().enumerate() {
        if (arg == "--config" || arg == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    DEFAULT_CONFIG_PATH.to_string()
}

fn init_logging(settings: &Settings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}
