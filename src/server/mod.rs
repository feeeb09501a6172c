//! Local backend process supervision.
//!
//! [`LocalServer`] owns the full lifecycle of the generated backend:
//! write the runtime configuration, verify the toolchain, run the
//! generation pipeline, install dependencies, spawn the process, and wait
//! for a readiness signal on its output streams. Shutdown escalates from
//! SIGTERM to SIGKILL and resolves only on the child's confirmed exit.
//!
//! Readiness is detected by substring-matching the child's unstructured
//! output (see [`READINESS_MARKERS`]). This is a known reliability gap: a
//! reworded log line or stream buffering silently breaks detection. The
//! backend offers no structured health signal at spawn time, so the
//! heuristic stands as-is rather than being replaced with a poll that
//! would change observable timing.

use crate::codegen::CodeGenerator;
use crate::config::{DatabaseConfig, ServerOptions};
use crate::error::ServerError;
use crate::schema::ModelRegistry;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Substrings on stdout or stderr that mark the backend as ready.
pub const READINESS_MARKERS: &[&str] = &["Server started", "listening"];

/// Wall-clock window for the readiness race. Fixed, not caller-tunable.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Window between SIGTERM and the SIGKILL escalation.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const JWT_SECRET_LEN: usize = 48;

/// Supervisor lifecycle phase.
///
/// Any startup failure exits directly to `Stopped`; both `Idle` and
/// `Stopped` are restartable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    Idle,
    Preparing,
    ToolchainCheck,
    InstallingDependencies,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for ServerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerPhase::Idle => write!(f, "idle"),
            ServerPhase::Preparing => write!(f, "preparing"),
            ServerPhase::ToolchainCheck => write!(f, "toolchain_check"),
            ServerPhase::InstallingDependencies => write!(f, "installing_dependencies"),
            ServerPhase::Starting => write!(f, "starting"),
            ServerPhase::Running => write!(f, "running"),
            ServerPhase::Stopping => write!(f, "stopping"),
            ServerPhase::Stopped => write!(f, "stopped"),
        }
    }
}

/// Supervises exactly one backend process built from the generated source.
///
/// Concurrent `start()` calls against the same instance are unsupported;
/// callers must serialize them. A `start()` while running is a logged
/// no-op, never a second spawn.
pub struct LocalServer {
    registry: Arc<ModelRegistry>,
    generator: CodeGenerator,
    database: DatabaseConfig,
    options: ServerOptions,
    base_path: PathBuf,
    child: Option<Child>,
    phase: ServerPhase,
}

impl LocalServer {
    pub fn new(
        registry: Arc<ModelRegistry>,
        generator: CodeGenerator,
        database: DatabaseConfig,
        options: ServerOptions,
        base_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            generator,
            database,
            options,
            base_path: base_path.into(),
            child: None,
            phase: ServerPhase::Idle,
        }
    }

    pub fn phase(&self) -> ServerPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == ServerPhase::Running && self.child.is_some()
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Whether a previously started backend has exited on its own.
    ///
    /// Returns `Ok(None)` while the child is still running or when nothing
    /// was started.
    pub fn try_status(&mut self) -> Result<Option<ExitStatus>, ServerError> {
        match self.child.as_mut() {
            Some(child) => child
                .try_wait()
                .map_err(|source| ServerError::io("failed to poll backend status", source)),
            None => Ok(None),
        }
    }

    /// Run the full startup sequence and leave the backend running.
    ///
    /// No-op with a warning when already running. On any failure the
    /// supervisor returns to `Stopped` with no child left behind, and the
    /// triggering error propagates to the caller.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        if self.is_running() {
            warn!("backend already running, ignoring start request");
            return Ok(());
        }

        match self.run_startup().await {
            Ok(child) => {
                self.child = Some(child);
                self.set_phase(ServerPhase::Running);
                info!(base = %self.base_path.display(), "backend is running");
                Ok(())
            }
            Err(err) => {
                self.child = None;
                self.set_phase(ServerPhase::Stopped);
                Err(err)
            }
        }
    }

    /// Stop the running backend.
    ///
    /// No-op with a warning when not running. Sends SIGTERM, waits up to
    /// the graceful window, then escalates to SIGKILL; resolves only once
    /// the child's exit is confirmed. Never fails from the caller's
    /// perspective.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            warn!("backend not running, ignoring stop request");
            return;
        };
        self.set_phase(ServerPhase::Stopping);

        signal_graceful_shutdown(&mut child);
        match timeout(GRACEFUL_SHUTDOWN_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => {
                info!(%status, "backend exited after graceful termination");
            }
            Ok(Err(error)) => {
                warn!(%error, "failed to await backend exit");
            }
            Err(_) => {
                warn!(
                    timeout_secs = GRACEFUL_SHUTDOWN_TIMEOUT.as_secs(),
                    "graceful termination window elapsed, force-killing backend"
                );
                if let Err(error) = child.start_kill() {
                    warn!(%error, "force kill delivery failed");
                }
                match child.wait().await {
                    Ok(status) => info!(%status, "backend exited after force kill"),
                    Err(error) => warn!(%error, "failed to await backend exit"),
                }
            }
        }

        self.set_phase(ServerPhase::Stopped);
    }

    async fn run_startup(&mut self) -> Result<Child, ServerError> {
        self.set_phase(ServerPhase::Preparing);
        let out_dir = self.base_path.join("generated");
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|source| {
                ServerError::io(format!("failed to create {}", out_dir.display()), source)
            })?;

        let jwt_secret = self
            .options
            .jwt_secret
            .clone()
            .unwrap_or_else(generate_secret);
        let env = runtime_env(&self.database, &self.options, &jwt_secret);
        let env_path = out_dir.join(".env");
        tokio::fs::write(&env_path, render_env_file(&env))
            .await
            .map_err(|source| {
                ServerError::io(format!("failed to write {}", env_path.display()), source)
            })?;
        debug!(path = %env_path.display(), "wrote runtime configuration");

        self.set_phase(ServerPhase::ToolchainCheck);
        self.check_toolchain().await?;

        self.generator.generate(&self.registry, &self.base_path).await?;

        self.set_phase(ServerPhase::InstallingDependencies);
        self.install_dependencies(&out_dir).await?;

        self.set_phase(ServerPhase::Starting);
        self.spawn_backend(&out_dir, &env).await
    }

    async fn check_toolchain(&self) -> Result<(), ServerError> {
        let program = &self.options.toolchain;
        match Command::new(program).arg("version").output().await {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                debug!(toolchain = %program, version = %version.trim(), "toolchain available");
                Ok(())
            }
            Ok(output) => Err(ServerError::ToolchainNotFound {
                program: program.clone(),
                reason: format!("version check exited with {}", output.status),
            }),
            Err(error) => Err(ServerError::ToolchainNotFound {
                program: program.clone(),
                reason: error.to_string(),
            }),
        }
    }

    async fn install_dependencies(&self, out_dir: &Path) -> Result<(), ServerError> {
        info!(dir = %out_dir.display(), "installing backend dependencies");
        let output = Command::new(&self.options.toolchain)
            .args(["mod", "tidy"])
            .current_dir(out_dir)
            .output()
            .await
            .map_err(|source| ServerError::io("failed to invoke dependency install", source))?;

        if !output.status.success() {
            error!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "dependency install failed"
            );
            return Err(ServerError::DependencyInstall {
                status: output.status,
            });
        }
        Ok(())
    }

    /// Spawn the backend and race readiness against the startup timeout.
    ///
    /// Three outcomes: a readiness marker on either stream resolves the
    /// start; the child exiting first rejects with its exit status; the
    /// timeout elapsing first force-kills the child and rejects. The
    /// losing branches of the race are simply ignored, not cancelled.
    async fn spawn_backend(
        &self,
        out_dir: &Path,
        env: &[(String, String)],
    ) -> Result<Child, ServerError> {
        info!(dir = %out_dir.display(), "spawning backend process");
        let mut child = Command::new(&self.options.toolchain)
            .args(["run", "."])
            .current_dir(out_dir)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ServerError::io("failed to spawn backend process", source))?;

        let (ready_tx, mut ready_rx) = mpsc::channel::<String>(2);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(watch_stream(stdout, "stdout", ready_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(watch_stream(stderr, "stderr", ready_tx));
        }

        tokio::select! {
            marker = ready_rx.recv() => match marker {
                Some(line) => {
                    info!(line = %line.trim(), "backend signaled readiness");
                    Ok(child)
                }
                // Both streams closed without a marker: the child is gone
                // or going; surface its exit status.
                None => {
                    let status = child
                        .wait()
                        .await
                        .map_err(|source| ServerError::io("failed to await backend exit", source))?;
                    Err(ServerError::PrematureExit { status })
                }
            },
            status = child.wait() => {
                let status = status
                    .map_err(|source| ServerError::io("failed to await backend exit", source))?;
                Err(ServerError::PrematureExit { status })
            }
            _ = tokio::time::sleep(STARTUP_TIMEOUT) => {
                warn!(
                    timeout_secs = STARTUP_TIMEOUT.as_secs(),
                    "backend never signaled readiness, killing it"
                );
                if let Err(error) = child.start_kill() {
                    warn!(%error, "kill after startup timeout failed");
                }
                let _ = child.wait().await;
                Err(ServerError::StartupTimeout {
                    timeout_secs: STARTUP_TIMEOUT.as_secs(),
                })
            }
        }
    }

    fn set_phase(&mut self, phase: ServerPhase) {
        debug!(from = %self.phase, to = %phase, "supervisor phase transition");
        self.phase = phase;
    }
}

/// Follow one output stream: forward every line into tracing and send the
/// first readiness marker through `ready`. Keeps draining after readiness
/// so the child never blocks on a full pipe.
async fn watch_stream<R>(stream: R, stream_name: &'static str, ready: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    let mut signaled = false;
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(stream = stream_name, line = %line, "backend output");
        if !signaled && READINESS_MARKERS.iter().any(|marker| line.contains(marker)) {
            signaled = true;
            let _ = ready.try_send(line);
        }
    }
}

#[cfg(unix)]
fn signal_graceful_shutdown(child: &mut Child) {
    match child.id() {
        Some(pid) => {
            let delivered = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } == 0;
            if delivered {
                debug!(pid, "delivered SIGTERM to backend");
            } else {
                warn!(pid, "SIGTERM delivery failed");
            }
        }
        None => warn!("backend has no pid, skipping SIGTERM"),
    }
}

#[cfg(not(unix))]
fn signal_graceful_shutdown(child: &mut Child) {
    // No SIGTERM equivalent here; go straight to the forced kill.
    if let Err(error) = child.start_kill() {
        warn!(%error, "kill delivery failed");
    }
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(JWT_SECRET_LEN)
        .map(char::from)
        .collect()
}

/// Fixed-order runtime environment for the backend process. Written to
/// `.env` and passed verbatim as the spawn environment.
fn runtime_env(
    database: &DatabaseConfig,
    options: &ServerOptions,
    jwt_secret: &str,
) -> Vec<(String, String)> {
    let entries: Vec<(&str, String)> = vec![
        ("DB_HOST", database.host.clone()),
        ("DB_PORT", database.port.to_string()),
        ("DB_USER", database.user.clone()),
        ("DB_PASSWORD", database.password.clone()),
        ("DB_NAME", database.name.clone()),
        ("JWT_SECRET_KEY", jwt_secret.to_string()),
        (
            "JWT_EXPIRATION_HOURS",
            options.jwt_expiration_hours.to_string(),
        ),
        ("PORT", options.port.to_string()),
        ("ENV", "development".to_string()),
        ("ALLOWED_ORIGINS", options.allowed_origins.clone()),
        ("LOG_LEVEL", options.log_level.clone()),
        ("ENABLE_SWAGGER", "true".to_string()),
        ("UI_TEST_MODE", options.disable_auth.to_string()),
        ("SEED_TEST_DATA", options.seed_test_data.to_string()),
    ];
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn render_env_file(entries: &[(String, String)]) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}
