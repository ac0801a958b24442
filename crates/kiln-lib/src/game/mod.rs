pub mod installer;
pub mod launcher;
pub mod metadata;

// Re-export commonly used types
pub use installer::types::{Arch, DownloadTask, EventSink, LauncherEvent, OsType};
pub use launcher::{LaunchCommand, ProcessHandle, ProcessState, ProcessSupervisor};
pub use metadata::VersionCatalog;
