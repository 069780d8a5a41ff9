//! Elevators: pkexec with a helper process, or in-process when already root.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{Config, PrivilegeConfig};
use crate::engine::execute::execute_grouped;
use crate::engine::privilege::{BatchDescriptor, ElevatedHandle, ElevationError, Elevator};
use crate::plugin::{CancellationToken, CleanContext, CleanOutcome, FailureKind, PluginRegistry};

/// Hidden subcommand the helper process runs under pkexec.
pub const HELPER_COMMAND: &str = "clean-as-root";

/// pkexec: the authentication dialog was dismissed.
const EXIT_DISMISSED: i32 = 126;
/// pkexec: not authorized, or the program could not be run.
const EXIT_NOT_AUTHORIZED: i32 = 127;

const WAIT_INTERVAL: Duration = Duration::from_millis(50);

/// Runs batches through `pkexec <helper> clean-as-root`.
///
/// The batch travels as JSON on the helper's stdin, outcomes come back as
/// JSON on its stdout.
pub struct PkexecElevator {
    program: PathBuf,
    helper: PathBuf,
    timeout: Duration,
}

impl PkexecElevator {
    pub fn new(program: PathBuf, helper: PathBuf, timeout: Duration) -> Self {
        Self {
            program,
            helper,
            timeout,
        }
    }

    /// Use the running executable as the helper.
    pub fn from_config(config: &PrivilegeConfig) -> Result<Self, ElevationError> {
        let helper = std::env::current_exe()
            .map_err(|e| ElevationError::Unavailable(format!("cannot locate executable: {}", e)))?;
        Ok(Self::new(
            config.pkexec.clone(),
            helper,
            Duration::from_secs(config.helper_timeout),
        ))
    }
}

impl Elevator for PkexecElevator {
    fn request_elevation(
        &self,
        batch: &BatchDescriptor,
    ) -> Result<Box<dyn ElevatedHandle>, ElevationError> {
        let payload = serde_json::to_vec(batch)
            .map_err(|e| ElevationError::Failed(format!("cannot encode batch: {}", e)))?;

        tracing::debug!(
            "Spawning {} {} {}",
            self.program.display(),
            self.helper.display(),
            HELPER_COMMAND
        );
        let mut child = Command::new(&self.program)
            .arg(&self.helper)
            .arg(HELPER_COMMAND)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ElevationError::Unavailable(format!(
                    "{} not found",
                    self.program.display()
                )),
                _ => ElevationError::Failed(e.to_string()),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&payload) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ElevationError::Failed(format!("cannot send batch: {}", e)));
            }
        }

        Ok(Box::new(HelperProcess {
            child,
            timeout: self.timeout,
        }))
    }
}

struct HelperProcess {
    child: Child,
    timeout: Duration,
}

impl ElevatedHandle for HelperProcess {
    fn execute(
        mut self: Box<Self>,
        _batch: &BatchDescriptor,
    ) -> Result<Vec<CleanOutcome>, ElevationError> {
        let mut stdout = self
            .child
            .stdout
            .take()
            .ok_or_else(|| ElevationError::Failed("helper has no stdout".into()))?;
        let reader = thread::spawn(move || {
            let mut buf = String::new();
            stdout.read_to_string(&mut buf).map(|_| buf)
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match self.child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    tracing::warn!("Privileged helper exceeded {:?}, killing it", self.timeout);
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    return Err(ElevationError::Timeout(self.timeout));
                }
                Ok(None) => thread::sleep(WAIT_INTERVAL),
                Err(e) => return Err(ElevationError::Failed(e.to_string())),
            }
        };

        match status.code() {
            Some(0) => {}
            Some(EXIT_DISMISSED) => return Err(ElevationError::Declined),
            Some(EXIT_NOT_AUTHORIZED) => return Err(ElevationError::Denied),
            Some(code) => {
                return Err(ElevationError::Failed(format!("helper exited with code {}", code)))
            }
            None => return Err(ElevationError::Failed("helper killed by a signal".into())),
        }

        let output = reader
            .join()
            .map_err(|_| ElevationError::Failed("stdout reader panicked".into()))?
            .map_err(|e| ElevationError::Failed(format!("cannot read helper output: {}", e)))?;

        serde_json::from_str(&output)
            .map_err(|e| ElevationError::Failed(format!("malformed helper output: {}", e)))
    }
}

/// Runs batches directly, for a process that is already root.
pub struct InProcessElevator {
    registry: Arc<PluginRegistry>,
    parallelism: usize,
}

impl InProcessElevator {
    pub fn new(registry: Arc<PluginRegistry>, parallelism: usize) -> Self {
        Self {
            registry,
            parallelism,
        }
    }
}

impl Elevator for InProcessElevator {
    fn request_elevation(
        &self,
        _batch: &BatchDescriptor,
    ) -> Result<Box<dyn ElevatedHandle>, ElevationError> {
        Ok(Box::new(InProcessHandle {
            registry: Arc::clone(&self.registry),
            parallelism: self.parallelism,
        }))
    }
}

struct InProcessHandle {
    registry: Arc<PluginRegistry>,
    parallelism: usize,
}

impl ElevatedHandle for InProcessHandle {
    fn execute(
        self: Box<Self>,
        batch: &BatchDescriptor,
    ) -> Result<Vec<CleanOutcome>, ElevationError> {
        Ok(run_elevated_batch(&self.registry, batch, self.parallelism))
    }
}

/// Perform a privileged batch in this process.
///
/// Items naming a plugin the registry does not know are refused.
pub fn run_elevated_batch(
    registry: &PluginRegistry,
    batch: &BatchDescriptor,
    parallelism: usize,
) -> Vec<CleanOutcome> {
    let (known, unknown): (Vec<_>, Vec<_>) = batch
        .items
        .iter()
        .cloned()
        .partition(|f| registry.contains(&f.plugin_id));

    let ctx = CleanContext::elevated(CancellationToken::new());
    let mut outcomes = execute_grouped(registry, &known, &ctx, parallelism, None);
    outcomes.extend(unknown.iter().map(|f| {
        tracing::warn!("Refusing privileged removal for unknown plugin '{}'", f.plugin_id);
        CleanOutcome::failure(f, FailureKind::PermissionDenied, "unknown plugin")
    }));
    outcomes
}

/// Pick the elevator for this process.
pub fn default_elevator(config: &Config, registry: &Arc<PluginRegistry>) -> Arc<dyn Elevator> {
    if nix::unistd::geteuid().is_root() {
        tracing::debug!("Running as root, privileged items run in-process");
        return Arc::new(InProcessElevator::new(
            Arc::clone(registry),
            config.clean.parallel_jobs,
        ));
    }

    match PkexecElevator::from_config(&config.privilege) {
        Ok(elevator) => Arc::new(elevator),
        Err(e) => Arc::new(Unavailable(e.to_string())),
    }
}

/// Elevator that always reports elevation as unavailable.
pub struct Unavailable(pub String);

impl Elevator for Unavailable {
    fn request_elevation(
        &self,
        _batch: &BatchDescriptor,
    ) -> Result<Box<dyn ElevatedHandle>, ElevationError> {
        Err(ElevationError::Unavailable(self.0.clone()))
    }
}
