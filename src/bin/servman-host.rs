//! Servman Host - runs one managed module as an OS service.
//!
//! Usage: `servman-host <root> --service.lib=<path> [--service.config=<path>] [--log.*=...]`

use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::thread;

use tracing::{error, info, warn};

use servman_daemon::host::{logging, run_module, shutdown_signal, HostArgs, ModuleRegistry, StopEvent};

const NAME: &str = env!("CARGO_PKG_NAME");

fn exe_name() -> String {
    env::args()
        .next()
        .and_then(|p| {
            Path::new(&p)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| NAME.to_string())
}

fn spawn_signal_bridge(stop: StopEvent) {
    let spawned = thread::Builder::new()
        .name("signal-bridge".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!(error = %e, "Signal handling unavailable");
                    return;
                }
            };
            runtime.block_on(shutdown_signal());
            info!("Stop requested");
            stop.signal();
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start signal thread");
    }
}

fn main() -> ExitCode {
    let args = match HostArgs::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("usage: {} <root> --service.lib=<path> [--key=value ...]", exe_name());
            return ExitCode::FAILURE;
        }
    };

    let setup = logging::resolve(&args, &exe_name());
    let _guard = match logging::init(&setup) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(root = %args.root.display(), "Service host starting");
    for (key, value) in &args.params {
        info!(key = %key, value = %value, "Parameter");
    }

    let stop = StopEvent::new();
    spawn_signal_bridge(stop.clone());

    let modules = ModuleRegistry::new();
    match run_module(&args, &modules, &stop) {
        Ok(()) => {
            info!("Service host stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Service host failed");
            ExitCode::FAILURE
        }
    }
}
