//! Child process supervision: spawn, console draining, exit tracking, kill.

use crate::error::{LauncherError, Result};
use crate::game::installer::types::{ConsoleStream, EventSink, LauncherEvent, OsType};
use crate::game::launcher::arguments::LaunchCommand;
use crate::utils::process::{ensure_executable, quote_arg, KilnCommandExt};
use crate::utils::task::SupervisedTask;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use uuid::Uuid;

/// How long the reaper waits for the output pipes to reach EOF after exit
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Longest console line forwarded as a single event
const MAX_CONSOLE_LINE: usize = 8 * 1024;

/// Platform-specific part of starting a child.
pub trait ProcessLauncher: Send + Sync {
    /// Make `executable` runnable. Called after its existence was checked.
    fn prepare(&self, executable: &Path) -> Result<()>;

    /// Command with piped stdout/stderr, ready to spawn.
    fn command(&self, executable: &Path, args: &[String], working_dir: &Path) -> Command;
}

fn piped_command(executable: &Path, args: &[String], working_dir: &Path) -> Command {
    let mut command = Command::new(executable);
    command
        .args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

/// Linux and macOS: the executable bit is set before the first launch.
pub struct PosixLauncher;

impl ProcessLauncher for PosixLauncher {
    fn prepare(&self, executable: &Path) -> Result<()> {
        ensure_executable(executable)?;
        Ok(())
    }

    fn command(&self, executable: &Path, args: &[String], working_dir: &Path) -> Command {
        piped_command(executable, args, working_dir)
    }
}

/// Windows: no permission bits, but the console window is suppressed.
pub struct WindowsLauncher;

impl ProcessLauncher for WindowsLauncher {
    fn prepare(&self, _executable: &Path) -> Result<()> {
        Ok(())
    }

    fn command(&self, executable: &Path, args: &[String], working_dir: &Path) -> Command {
        let mut command = piped_command(executable, args, working_dir);
        command.suppress_console();
        command
    }
}

pub fn launcher_for(os: OsType) -> Arc<dyn ProcessLauncher> {
    match os {
        OsType::Windows => Arc::new(WindowsLauncher),
        OsType::Linux | OsType::MacOS => Arc::new(PosixLauncher),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "code", rename_all = "snake_case")]
pub enum ProcessState {
    Idle,
    Starting,
    Running,
    Exited(Option<i32>),
    Terminated,
}

impl ProcessState {
    /// Starting or Running
    pub fn is_active(&self) -> bool {
        matches!(self, ProcessState::Starting | ProcessState::Running)
    }
}

/// Reference to the one tracked child process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHandle {
    pub id: Uuid,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

struct Tracked {
    handle: ProcessHandle,
    reaper: SupervisedTask,
}

struct Shared {
    sink: Arc<dyn EventSink>,
    state: watch::Sender<ProcessState>,
    tracked: Mutex<Option<Tracked>>,
}

impl Shared {
    fn tracked(&self) -> MutexGuard<'_, Option<Tracked>> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.tracked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Tracks at most one child process at a time.
pub struct ProcessSupervisor {
    launcher: Arc<dyn ProcessLauncher>,
    shared: Arc<Shared>,
}

impl ProcessSupervisor {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, sink: Arc<dyn EventSink>) -> Self {
        let (state, _) = watch::channel(ProcessState::Idle);
        Self {
            launcher,
            shared: Arc::new(Shared {
                sink,
                state,
                tracked: Mutex::new(None),
            }),
        }
    }

    pub fn for_platform(os: OsType, sink: Arc<dyn EventSink>) -> Self {
        Self::new(launcher_for(os), sink)
    }

    pub fn state(&self) -> ProcessState {
        *self.shared.state.borrow()
    }

    /// Handle of the tracked process, if one is running
    pub fn current(&self) -> Option<ProcessHandle> {
        self.shared.tracked().as_ref().map(|t| t.handle.clone())
    }

    /// Spawn `executable` and start draining its output.
    ///
    /// Returns as soon as the child is running. Fails with a process error
    /// while another child is still tracked.
    pub async fn start(
        &self,
        executable: &Path,
        args: &[String],
        working_dir: &Path,
    ) -> Result<ProcessHandle> {
        let mut tracked = self.shared.tracked();
        if tracked.is_some() || self.state().is_active() {
            return Err(LauncherError::Process(
                "a process is already running".to_string(),
            ));
        }
        if !executable.is_file() {
            return Err(LauncherError::Process(format!(
                "executable not found: {}",
                executable.display()
            )));
        }

        self.shared.state.send_replace(ProcessState::Starting);
        if let Err(e) = self.launcher.prepare(executable) {
            self.shared.state.send_replace(ProcessState::Idle);
            return Err(e);
        }

        let mut command = self.launcher.command(executable, args, working_dir);
        log::info!(
            "Exec command: {} {}",
            quote_arg(&executable.to_string_lossy()),
            args.iter().map(|a| quote_arg(a)).collect::<Vec<_>>().join(" ")
        );
        log::debug!("Working directory: {:?}", working_dir);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.shared.state.send_replace(ProcessState::Idle);
                return Err(LauncherError::Process(format!(
                    "failed to spawn {}: {}",
                    executable.display(),
                    e
                )));
            }
        };
        let Some(pid) = child.id() else {
            self.shared.state.send_replace(ProcessState::Idle);
            return Err(LauncherError::Process(
                "child exited before its pid was read".to_string(),
            ));
        };

        let handle = ProcessHandle {
            id: Uuid::new_v4(),
            pid,
            started_at: Utc::now(),
        };
        log::info!("Process started with PID: {}", pid);

        let mut drains = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            let sink = self.shared.sink.clone();
            drains.push(SupervisedTask::spawn("stdout-drain", move |cancel| {
                drain(stdout, ConsoleStream::Stdout, sink, cancel)
            }));
        }
        if let Some(stderr) = child.stderr.take() {
            let sink = self.shared.sink.clone();
            drains.push(SupervisedTask::spawn("stderr-drain", move |cancel| {
                drain(stderr, ConsoleStream::Stderr, sink, cancel)
            }));
        }

        // The reaper removes the tracked entry itself, so the entry has to be
        // in place before the reaper can observe an exit.
        self.shared.state.send_replace(ProcessState::Running);
        let shared = self.shared.clone();
        let id = handle.id;
        let reaper = SupervisedTask::spawn("reaper", move |cancel| {
            reap(child, pid, id, drains, shared, cancel)
        });
        *tracked = Some(Tracked {
            handle: handle.clone(),
            reaper,
        });

        Ok(handle)
    }

    /// Start a composed [`LaunchCommand`] with `java`.
    pub async fn launch(&self, java: &Path, command: &LaunchCommand) -> Result<ProcessHandle> {
        self.start(java, &command.args(), &command.working_dir).await
    }

    /// Forcibly terminate the tracked process. Returns false when `handle`
    /// is not the tracked process.
    pub fn stop(&self, handle: &ProcessHandle) -> bool {
        let tracked = self.shared.tracked();
        match tracked.as_ref() {
            Some(t) if t.handle.id == handle.id => {
                log::info!("Stopping process {}", t.handle.pid);
                t.reaper.cancel();
                true
            }
            _ => false,
        }
    }

    /// Wait for the tracked process to finish and return the final state.
    pub async fn wait(&self) -> ProcessState {
        let mut rx = self.shared.state.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            if !state.is_active() {
                return state;
            }
            if rx.changed().await.is_err() {
                return self.state();
            }
        }
    }

    /// Stop whatever is running and wait until every task it owns has ended.
    pub async fn shutdown(&self) -> ProcessState {
        let tracked = self.shared.tracked().take();
        if let Some(t) = tracked {
            t.reaper.cancel();
            t.reaper.join().await;
        }
        self.state()
    }
}

fn emit_console(sink: &dyn EventSink, stream: ConsoleStream, bytes: &[u8]) {
    let text = String::from_utf8_lossy(bytes)
        .trim_end_matches(|c: char| c == '\r' || c == '\n')
        .to_string();
    sink.emit(LauncherEvent::Console { stream, text });
}

/// Forward a pipe to the sink one line at a time. A line longer than
/// [`MAX_CONSOLE_LINE`] is forwarded in pieces as it arrives.
async fn drain<R>(
    mut reader: R,
    stream: ConsoleStream,
    sink: Arc<dyn EventSink>,
    mut cancel: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut chunk = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::with_capacity(256);
    loop {
        tokio::select! {
            read = reader.read(&mut chunk) => match read {
                Ok(0) => break,
                Ok(n) => {
                    pending.extend_from_slice(&chunk[..n]);
                    while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = pending.drain(..=pos).collect();
                        emit_console(sink.as_ref(), stream, &line);
                    }
                    while pending.len() >= MAX_CONSOLE_LINE {
                        let piece: Vec<u8> = pending.drain(..MAX_CONSOLE_LINE).collect();
                        emit_console(sink.as_ref(), stream, &piece);
                    }
                }
                Err(e) => {
                    log::warn!("Failed to read {}: {}", stream.as_str(), e);
                    break;
                }
            },
            Ok(()) = cancel.changed() => break,
        }
    }
    if !pending.is_empty() {
        emit_console(sink.as_ref(), stream, &pending);
    }
    log::trace!("{} drain finished", stream.as_str());
}

async fn reap(
    mut child: Child,
    pid: u32,
    id: Uuid,
    drains: Vec<SupervisedTask>,
    shared: Arc<Shared>,
    mut cancel: watch::Receiver<bool>,
) {
    let (status, terminated) = tokio::select! {
        status = child.wait() => (status, false),
        Ok(()) = cancel.changed() => {
            if let Err(e) = child.start_kill() {
                log::warn!("Failed to kill process {}: {}", pid, e);
            }
            (child.wait().await, true)
        }
    };

    let code = match &status {
        Ok(status) => {
            if status.success() {
                log::info!("Process {} exited successfully", pid);
            } else {
                log::error!("Process {} exited with error: {}", pid, status);
            }
            status.code()
        }
        Err(e) => {
            log::error!("Failed to wait for process {}: {}", pid, e);
            None
        }
    };

    for task in drains {
        task.join_within(DRAIN_GRACE).await;
    }

    {
        let mut tracked = shared.tracked();
        if tracked.as_ref().is_some_and(|t| t.handle.id == id) {
            tracked.take();
        }
    }

    shared.sink.emit(LauncherEvent::ProcessExited {
        code,
        terminated,
        at: Utc::now(),
    });
    shared.state.send_replace(if terminated {
        ProcessState::Terminated
    } else {
        ProcessState::Exited(code)
    });
}
