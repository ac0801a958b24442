use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, LauncherError>;

/// Every failure the engine reports across its public boundary.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error in {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Process error: {0}")]
    Process(String),
}

/// Tag-only view of [`LauncherError`], handy for front ends that branch on the
/// failure class rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Parse,
    Network,
    Filesystem,
    Archive,
    UnsupportedPlatform,
    Process,
}

impl LauncherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LauncherError::NotFound(_) => ErrorKind::NotFound,
            LauncherError::Parse { .. } => ErrorKind::Parse,
            LauncherError::Network { .. } => ErrorKind::Network,
            LauncherError::Filesystem { .. } => ErrorKind::Filesystem,
            LauncherError::Archive { .. } => ErrorKind::Archive,
            LauncherError::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
            LauncherError::Process(_) => ErrorKind::Process,
        }
    }

    pub(crate) fn parse(what: impl Into<String>, err: impl std::fmt::Display) -> Self {
        LauncherError::Parse {
            what: what.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn network(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        LauncherError::Network {
            url: url.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn archive(path: &Path, err: impl std::fmt::Display) -> Self {
        LauncherError::Archive {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Attach the offending path to an `io::Error`.
pub trait IoResultExt<T> {
    fn fs_context(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn fs_context(self, path: &Path) -> Result<T> {
        self.map_err(|source| LauncherError::Filesystem {
            path: path.to_path_buf(),
            source,
        })
    }
}
