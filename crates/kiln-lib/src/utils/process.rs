use crate::error::{IoResultExt, Result};
use std::path::Path;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

/// Extension trait for launcher command execution.
pub trait KilnCommandExt {
    /// Hides the console window on Windows. No-op on other platforms.
    fn suppress_console(&mut self) -> &mut Self;
}

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

impl KilnCommandExt for tokio::process::Command {
    fn suppress_console(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            self.creation_flags(CREATE_NO_WINDOW);
        }
        self
    }
}

/// Make sure the owner, group and others may execute `path`.
/// Returns whether the permissions had to be changed.
#[cfg(unix)]
pub fn ensure_executable(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path).fs_context(path)?.permissions();
    let mode = perms.mode();
    if mode & 0o111 == 0o111 {
        return Ok(false);
    }
    perms.set_mode(mode | 0o755);
    std::fs::set_permissions(path, perms).fs_context(path)?;
    log::debug!("Marked {:?} as executable", path);
    Ok(true)
}

#[cfg(not(unix))]
pub fn ensure_executable(path: &Path) -> Result<bool> {
    std::fs::metadata(path).fs_context(path)?;
    Ok(false)
}

/// Quote an argument for display in logs / shell-copy.
pub fn quote_arg(s: &str) -> String {
    if s.is_empty() {
        return "\"\"".to_string();
    }
    if s.chars().any(|c| c.is_whitespace() || c == '"') {
        let esc = s.replace('\\', "\\\\").replace('"', "\\\"");
        return format!("\"{}\"", esc);
    }
    s.to_string()
}
