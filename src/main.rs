//! Servman Daemon - HTTP management plane for single-host services.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use servman_daemon::config::Settings;
use servman_daemon::control::build_control;
use servman_daemon::host::shutdown_signal;
use servman_daemon::http;
use servman_daemon::manager::Manager;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_CONFIG: &str = "/etc/servman/daemon.toml";

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

    let config_path = get_config_path(&args);

    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting {} v{}", NAME, VERSION);
    info!("Configuration loaded from: {}", config_path);
    info!("Installation root: {}", settings.paths.root.display());
    info!("Log level: {}", settings.logging.level);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Daemon failed");
            ExitCode::FAILURE
        }
    }
}

async fn async_main(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let control = build_control(&settings.control)?;
    let layout = settings.layout();

    let manager = tokio::task::spawn_blocking(move || Manager::load(layout, control)).await??;
    let router = http::router(Arc::new(manager), settings.http_directory());

    let address = format!("{}:{}", settings.http.address, settings.http.port);
    let listener = TcpListener::bind(&address).await?;
    info!(address = %address, ui = %settings.http_directory().display(), "Listening");

    http::serve(listener, router, async {
        shutdown_signal().await;
        info!("Shutdown signal received, draining requests...");
    })
    .await?;

    info!("Daemon stopped");
    Ok(())
}

fn print_help() {
    println!(
        r#"{} {}
Single-host service manager: registry, lifecycle control and upgrades over HTTP.

USAGE:
    {} [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file
                           [default: {}]
    -h, --help             Print help information
    -V, --version          Print version information
"#,
        NAME, VERSION, NAME, DEFAULT_CONFIG
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
    DEFAULT_CONFIG.to_string()
}

fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .try_init()?;
        }
    }

    Ok(())
}
