//! Offline Minecraft installer and launcher engine.
//!
//! The pipeline runs top-down: fetch the version catalog, resolve a version
//! descriptor, download the client jar, assets, libraries and natives, install
//! a matching Java runtime, compose the classpath and command line, and finally
//! hand the command to the [`ProcessSupervisor`](game::launcher::ProcessSupervisor).

pub mod error;
pub mod game;
pub mod utils;

pub use error::{ErrorKind, LauncherError, Result};
pub use game::installer::config::LauncherConfig;
pub use game::installer::types::{Arch, EventSink, LauncherEvent, OsType};
