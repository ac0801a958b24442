use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::sync::mpsc;

/// Operating system a launch is prepared for.
///
/// This is the *target* platform, which does not have to match the host: the
/// installer happily resolves Windows natives while running on Linux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Windows,
    Linux,
    #[serde(alias = "macos", alias = "osx")]
    MacOS,
}

impl OsType {
    /// Detect the current OS
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsType::Windows
        } else if cfg!(target_os = "macos") {
            OsType::MacOS
        } else {
            OsType::Linux
        }
    }

    /// Get the OS name as a string (for rule matching and legacy `natives` maps)
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Windows => "windows",
            OsType::Linux => "linux",
            OsType::MacOS => "osx",
        }
    }

    /// OS token used in modern native artifact classifiers (`natives-macos`)
    pub fn natives_name(&self) -> &'static str {
        match self {
            OsType::Windows => "windows",
            OsType::Linux => "linux",
            OsType::MacOS => "macos",
        }
    }

    /// Get the classpath separator for this OS
    pub fn classpath_separator(&self) -> &'static str {
        match self {
            OsType::Windows => ";",
            _ => ":",
        }
    }

    /// File extension of shared libraries, including the leading dot
    pub fn shared_library_extension(&self) -> &'static str {
        match self {
            OsType::Windows => ".dll",
            OsType::Linux => ".so",
            OsType::MacOS => ".dylib",
        }
    }

    pub fn java_executable_name(&self) -> &'static str {
        match self {
            OsType::Windows => "java.exe",
            _ => "java",
        }
    }
}

impl std::fmt::Display for OsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.natives_name())
    }
}

/// Architecture types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit x86, the default architecture
    X64,
    X86,
    Arm64,
}

impl Arch {
    /// Detect the current architecture
    pub fn current() -> Self {
        match std::env::consts::ARCH {
            "aarch64" => Arch::Arm64,
            "x86" => Arch::X86,
            _ => Arch::X64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::X86 => "x86",
            Arch::Arm64 => "arm64",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single artifact to materialise in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadTask {
    pub url: String,
    /// Destination relative to the directory the task is resolved against
    pub path: PathBuf,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
        }
    }

    pub fn destination(&self, root: &Path) -> PathBuf {
        root.join(&self.path)
    }

    /// True when `path` is non-empty, relative and has no `..` segment.
    pub fn is_contained(&self) -> bool {
        self.path.components().any(|c| matches!(c, Component::Normal(_)))
            && self
                .path
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

impl ConsoleStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleStream::Stdout => "stdout",
            ConsoleStream::Stderr => "stderr",
        }
    }
}

/// Everything a front end gets to see while the engine works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LauncherEvent {
    StepStarted {
        step: String,
        at: DateTime<Utc>,
    },
    Message {
        level: EventLevel,
        text: String,
    },
    DownloadFinished {
        url: String,
        path: PathBuf,
        /// True when the file was already present and no request was made
        cached: bool,
    },
    DownloadFailed {
        url: String,
        reason: String,
    },
    Console {
        stream: ConsoleStream,
        text: String,
    },
    ProcessExited {
        code: Option<i32>,
        terminated: bool,
        at: DateTime<Utc>,
    },
}

impl LauncherEvent {
    pub fn step(step: impl Into<String>) -> Self {
        LauncherEvent::StepStarted {
            step: step.into(),
            at: Utc::now(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        LauncherEvent::Message {
            level: EventLevel::Info,
            text: text.into(),
        }
    }

    pub fn warn(text: impl Into<String>) -> Self {
        LauncherEvent::Message {
            level: EventLevel::Warn,
            text: text.into(),
        }
    }
}

/// Consumer of [`LauncherEvent`]s.
/// Implementations are shared between the pipeline and the process drain
/// tasks, so they must accept concurrent calls.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LauncherEvent);
}

impl<F> EventSink for F
where
    F: Fn(LauncherEvent) + Send + Sync,
{
    fn emit(&self, event: LauncherEvent) {
        self(event)
    }
}

/// A sink that does nothing (silent).
/// Useful for background verification or tests.
pub struct SilentSink;

impl EventSink for SilentSink {
    fn emit(&self, _event: LauncherEvent) {}
}

/// Forwards events to the `log` facade.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: LauncherEvent) {
        match event {
            LauncherEvent::StepStarted { step, .. } => log::info!("==> {}", step),
            LauncherEvent::Message { level, text } => match level {
                EventLevel::Debug => log::debug!("{}", text),
                EventLevel::Info => log::info!("{}", text),
                EventLevel::Warn => log::warn!("{}", text),
                EventLevel::Error => log::error!("{}", text),
            },
            LauncherEvent::DownloadFinished { url, path, cached } => {
                log::debug!("{} -> {:?} (cached: {})", url, path, cached)
            }
            LauncherEvent::DownloadFailed { url, reason } => {
                log::warn!("Download failed: {} ({})", url, reason)
            }
            LauncherEvent::Console { stream, text } => {
                log::info!("[{}] {}", stream.as_str(), text.trim_end())
            }
            LauncherEvent::ProcessExited {
                code, terminated, ..
            } => log::info!("Process exited (code: {:?}, terminated: {})", code, terminated),
        }
    }
}

/// Ordered channel sink. Events queue up in emission order; once the
/// receiving side is dropped, further events are discarded.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LauncherEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LauncherEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: LauncherEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_classpath_separator() {
        assert_eq!(OsType::Windows.classpath_separator(), ";");
        assert_eq!(OsType::Linux.classpath_separator(), ":");
        assert_eq!(OsType::MacOS.classpath_separator(), ":");
    }

    #[test]
    fn os_names_differ_between_rules_and_classifiers() {
        assert_eq!(OsType::MacOS.as_str(), "osx");
        assert_eq!(OsType::MacOS.natives_name(), "macos");
        assert_eq!(OsType::Linux.as_str(), OsType::Linux.natives_name());
    }

    #[test]
    fn os_type_deserializes_aliases() {
        let os: OsType = serde_json::from_str("\"macos\"").unwrap();
        assert_eq!(os, OsType::MacOS);
        let os: OsType = serde_json::from_str("\"windows\"").unwrap();
        assert_eq!(os, OsType::Windows);
    }

    #[test]
    fn channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(LauncherEvent::info("one"));
        sink.emit(LauncherEvent::info("two"));
        assert_eq!(rx.try_recv().unwrap(), LauncherEvent::info("one"));
        assert_eq!(rx.try_recv().unwrap(), LauncherEvent::info("two"));
    }

    #[test]
    fn channel_sink_tolerates_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(LauncherEvent::info("late"));
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink = move |event: LauncherEvent| captured.lock().unwrap().push(event);
        sink.emit(LauncherEvent::warn("careful"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
