//! Supervision of a running stunnel process.
//!
//! stunnel is started with the config file path as its only argument. With
//! `foreground = yes` it logs to stderr, and once every service is set up it
//! prints a line containing [`READY_SENTINEL`]. [`StunnelProcess::start`]
//! blocks until that line shows up, so a successful return means the tunnels
//! accept connections.
//!
//! # States
//!
//! ```text
//! NotStarted -> Starting -> Ready  -> Closed
//!                        -> Failed -> Closed
//! ```
//!
//! There is no timeout: a stunnel that neither prints the sentinel nor closes
//! stderr blocks `start` forever.

use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::error::StunnelError;

/// Substring of the stderr line stunnel prints once its config is applied.
pub const READY_SENTINEL: &str = "Configuration successful";

/// How long `close` waits after SIGTERM before falling back to SIGKILL.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Poll interval while waiting for a terminated process.
const TERMINATE_POLL: Duration = Duration::from_millis(20);

/// Tracing target for lines relayed from stunnel's stderr.
const STUNNEL_LOG_TARGET: &str = "stunnel";

/// Lifecycle state of a [`StunnelProcess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// `start` has not been called.
    NotStarted,
    /// The process is spawned and its output is being scanned.
    Starting,
    /// Startup finished (see [`Readiness`] for how).
    Ready,
    /// Spawning or reading the output failed.
    Failed,
    /// The process was terminated through `close`.
    Closed,
}

/// How a successful `start` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The readiness sentinel was seen.
    Ready,
    /// stderr closed without the sentinel. stunnel may have exited early or
    /// stopped logging; check [`StunnelProcess::try_wait`].
    StreamClosed,
}

/// Read `reader` line by line until a line contains [`READY_SENTINEL`] or the
/// stream ends.
///
/// Nothing past the sentinel line is consumed. Lines are relayed at debug
/// level; invalid UTF-8 is replaced rather than treated as an error.
pub fn wait_for_ready<R: BufRead>(reader: &mut R) -> io::Result<Readiness> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(Readiness::StreamClosed);
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end();
        debug!(target: STUNNEL_LOG_TARGET, "{}", line);

        if line.contains(READY_SENTINEL) {
            return Ok(Readiness::Ready);
        }
    }
}

type StartHook = Box<dyn FnOnce() + Send + 'static>;

/// Runs the wrapped hook when dropped, however the enclosing scope exits.
struct RunOnDrop(Option<StartHook>);

impl Drop for RunOnDrop {
    fn drop(&mut self) {
        if let Some(hook) = self.0.take() {
            hook();
        }
    }
}

/// Handle to one stunnel process.
///
/// Dropping the handle terminates the process.
pub struct StunnelProcess {
    binary: PathBuf,
    config_path: PathBuf,
    child: Option<Child>,
    state: ProcessState,
    readiness: Option<Readiness>,
    start_hook: Option<StartHook>,
}

impl StunnelProcess {
    /// Prepare a process for `binary config_path`. Nothing is spawned yet.
    pub fn new(binary: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config_path: config_path.into(),
            child: None,
            state: ProcessState::NotStarted,
            readiness: None,
            start_hook: None,
        }
    }

    /// Run `hook` once `start` returns, whether it succeeded or not.
    pub fn with_start_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.start_hook = Some(Box::new(hook));
        self
    }

    /// Path of the stunnel binary.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Path of the config file passed to stunnel.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// How the last successful `start` ended.
    pub fn readiness(&self) -> Option<Readiness> {
        self.readiness
    }

    /// PID of the spawned process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Spawn stunnel and block until it reports readiness or closes stderr.
    ///
    /// # Errors
    ///
    /// - [`StunnelError::AlreadyStarted`] if `start` was called before
    /// - [`StunnelError::Launch`] if the binary cannot be spawned
    /// - [`StunnelError::ReadinessStream`] if reading stderr fails
    pub fn start(&mut self) -> Result<Readiness, StunnelError> {
        let _finally = RunOnDrop(self.start_hook.take());

        if self.state != ProcessState::NotStarted {
            return Err(StunnelError::AlreadyStarted);
        }
        self.state = ProcessState::Starting;

        info!(
            "Starting stunnel {:?} with config {:?}",
            self.binary, self.config_path
        );

        let mut child = match Command::new(&self.binary)
            .arg(&self.config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                self.state = ProcessState::Failed;
                return Err(StunnelError::Launch {
                    binary: self.binary.clone(),
                    source,
                });
            }
        };

        debug!("stunnel spawned with PID {}", child.id());
        let stderr = child.stderr.take();
        self.child = Some(child);

        let Some(stderr) = stderr else {
            self.state = ProcessState::Ready;
            self.readiness = Some(Readiness::StreamClosed);
            return Ok(Readiness::StreamClosed);
        };

        let mut reader = BufReader::new(stderr);
        match wait_for_ready(&mut reader) {
            Ok(readiness) => {
                self.state = ProcessState::Ready;
                self.readiness = Some(readiness);
                match readiness {
                    Readiness::Ready => {
                        info!("stunnel is ready (PID {:?})", self.pid());
                        spawn_stderr_drain(reader);
                    }
                    Readiness::StreamClosed => {
                        warn!("stunnel closed its output without reporting readiness");
                    }
                }
                Ok(readiness)
            }
            Err(e) => {
                self.state = ProcessState::Failed;
                Err(StunnelError::ReadinessStream(e))
            }
        }
    }

    /// Terminate the process if one is running.
    ///
    /// Never fails and may be called any number of times; termination errors
    /// are logged and dropped.
    pub fn close(&mut self) {
        if let Some(mut child) = self.child.take() {
            terminate(&mut child);
        }
        if self.state != ProcessState::NotStarted {
            self.state = ProcessState::Closed;
        }
    }

    /// Block until the process exits. Returns `None` if nothing was spawned.
    pub fn wait(&mut self) -> Result<Option<ExitStatus>, StunnelError> {
        self.child
            .as_mut()
            .map(Child::wait)
            .transpose()
            .map_err(StunnelError::Wait)
    }

    /// Exit status if the process has exited, without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, StunnelError> {
        match self.child.as_mut() {
            Some(child) => child.try_wait().map_err(StunnelError::Wait),
            None => Ok(None),
        }
    }

    /// Check if the process is still running.
    pub fn is_running(&mut self) -> bool {
        self.child.is_some() && matches!(self.try_wait(), Ok(None))
    }
}

impl fmt::Debug for StunnelProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StunnelProcess")
            .field("binary", &self.binary)
            .field("config_path", &self.config_path)
            .field("pid", &self.pid())
            .field("state", &self.state)
            .field("readiness", &self.readiness)
            .finish()
    }
}

impl Drop for StunnelProcess {
    fn drop(&mut self) {
        self.close();
    }
}

/// Keep reading stderr after readiness so stunnel never blocks on a full pipe
/// or dies of SIGPIPE.
fn spawn_stderr_drain(mut reader: BufReader<ChildStderr>) {
    let spawned = thread::Builder::new()
        .name("stunnel-stderr".to_string())
        .spawn(move || {
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        debug!(target: STUNNEL_LOG_TARGET, "{}", line.trim_end());
                    }
                    Err(e) => {
                        debug!("Stopped reading stunnel output: {}", e);
                        break;
                    }
                }
            }
        });

    if let Err(e) = spawned {
        warn!("Failed to spawn stunnel output reader: {}", e);
    }
}

/// SIGTERM, a short grace period, then SIGKILL. Always reaps the child.
fn terminate(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    if let Ok(Some(status)) = child.try_wait() {
        debug!("stunnel already exited with {}", status);
        return;
    }

    let pid = child.id();
    debug!("Sending SIGTERM to stunnel (PID {})", pid);
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!("Failed to signal stunnel (PID {}): {}", pid, e);
    }

    let deadline = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(status)) => {
                info!("stunnel (PID {}) exited with {}", pid, status);
                return;
            }
            Ok(None) => thread::sleep(TERMINATE_POLL),
            Err(e) => {
                warn!("Failed to poll stunnel (PID {}): {}", pid, e);
                break;
            }
        }
    }

    warn!("stunnel (PID {}) ignored SIGTERM, killing it", pid);
    if let Err(e) = child.kill() {
        warn!("Failed to kill stunnel (PID {}): {}", pid, e);
    }
    if let Err(e) = child.wait() {
        warn!("Failed to reap stunnel (PID {}): {}", pid, e);
    }
}

/// Ask `binary` for its version banner (`stunnel -version`).
///
/// stunnel prints the banner on stderr; both streams are searched for the
/// first line mentioning stunnel.
pub fn stunnel_version(binary: &Path) -> Option<String> {
    let output = Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .ok()?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    stderr
        .lines()
        .chain(stdout.lines())
        .map(|line| line.trim().trim_start_matches("[ ]").trim())
        .find(|line| line.to_ascii_lowercase().contains("stunnel"))
        .map(str::to_string)
}

/// Check if `binary` can be run and identifies as stunnel.
pub fn stunnel_available(binary: &Path) -> bool {
    stunnel_version(binary).is_some()
}
