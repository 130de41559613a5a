//! Module lifecycle driver.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, info_span};

use crate::error::DaemonError;
use crate::options::{SERVICE_CONFIG, SERVICE_LIB};

use super::args::HostArgs;
use super::modules::ModuleRegistry;
use super::traits::ServiceContext;

/// Stop request shared between the signal handler and the module loop.
#[derive(Debug, Clone, Default)]
pub struct StopEvent(Arc<AtomicBool>);

impl StopEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_signaled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn param_key(flag: &str) -> &str {
    flag.trim_start_matches('-')
}

/// Resolve the `service.config` parameter against the installation root.
///
/// An empty value or a directory means the instance has no configuration.
pub fn resolve_config(args: &HostArgs) -> Result<Option<PathBuf>, DaemonError> {
    let value = match args.get(param_key(SERVICE_CONFIG)) {
        Some(v) if !v.trim().is_empty() => v.trim(),
        _ => return Ok(None),
    };
    let path = args.root.join(value);
    if path.is_dir() {
        return Ok(None);
    }
    if !path.is_file() {
        return Err(DaemonError::Host {
            message: format!("Service configuration {} does not exist", path.display()),
        });
    }
    Ok(Some(path))
}

/// Create, run and destroy the module named by `service.lib`.
///
/// Returns once the module's run loop exits, which happens after `stop`
/// is signaled.
pub fn run_module(
    args: &HostArgs,
    modules: &ModuleRegistry,
    stop: &StopEvent,
) -> Result<(), DaemonError> {
    let library = args
        .get(param_key(SERVICE_LIB))
        .filter(|l| !l.is_empty())
        .ok_or_else(|| DaemonError::missing_parameter(param_key(SERVICE_LIB)))?;

    let mut module = modules.create(library)?;
    let config_path = resolve_config(args)?;
    let span = info_span!("service", name = module.name());
    let ctx = ServiceContext {
        span: span.clone(),
        root: args.root.clone(),
        config_path,
    };

    let _entered = span.enter();
    info!(library = %library, config = ?ctx.config_path, "Creating module");
    if let Err(e) = module.create(&ctx) {
        error!(error = %e, "Module creation failed");
        return Err(e);
    }

    info!("Module running");
    let probe = stop.clone();
    module.run(&move || !probe.is_signaled());

    info!("Module stopping");
    module.destroy();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManagedService;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    static EVENTS: Mutex<Vec<String>> = Mutex::new(Vec::new());

    struct Recorder;

    impl ManagedService for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn create(&mut self, ctx: &ServiceContext) -> Result<(), DaemonError> {
            EVENTS
                .lock()
                .unwrap()
                .push(format!("create {:?}", ctx.config_path.is_some()));
            Ok(())
        }

        fn run(&mut self, is_running: &dyn Fn() -> bool) {
            let mut ticks = 0;
            while is_running() && ticks < 1000 {
                ticks += 1;
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            EVENTS.lock().unwrap().push("run".to_string());
        }

        fn destroy(&mut self) {
            EVENTS.lock().unwrap().push("destroy".to_string());
        }
    }

    fn modules() -> ModuleRegistry {
        let mut modules = ModuleRegistry::empty();
        modules.register("recorder", || -> Box<dyn ManagedService> { Box::new(Recorder) });
        modules
    }

    #[test]
    fn test_stop_event() {
        let stop = StopEvent::new();
        let other = stop.clone();
        assert!(!other.is_signaled());
        stop.signal();
        assert!(other.is_signaled());
    }

    #[test]
    fn test_lifecycle_order() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("conf")).unwrap();
        fs::write(dir.path().join("conf/rec.toml"), "").unwrap();

        let args = HostArgs::parse([
            dir.path().to_string_lossy().to_string(),
            "--service.lib=services/recorder/recorder.so".to_string(),
            "--service.config=conf/rec.toml".to_string(),
        ])
        .unwrap();

        let stop = StopEvent::new();
        stop.signal();
        EVENTS.lock().unwrap().clear();
        run_module(&args, &modules(), &stop).unwrap();

        assert_eq!(
            *EVENTS.lock().unwrap(),
            vec!["create true".to_string(), "run".to_string(), "destroy".to_string()]
        );
    }

    #[test]
    fn test_missing_library() {
        let args = HostArgs::parse(["/opt/servman", "--log.level=info"]).unwrap();
        let result = run_module(&args, &modules(), &StopEvent::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_config_resolution() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("conf")).unwrap();
        let root = dir.path().to_string_lossy().to_string();

        let empty = HostArgs::parse([root.clone(), "--service.config=".to_string()]).unwrap();
        assert_eq!(resolve_config(&empty).unwrap(), None);

        let directory = HostArgs::parse([root.clone(), "--service.config=conf/".to_string()]).unwrap();
        assert_eq!(resolve_config(&directory).unwrap(), None);

        let missing = HostArgs::parse([root, "--service.config=conf/none.toml".to_string()]).unwrap();
        assert!(resolve_config(&missing).is_err());
    }
}
