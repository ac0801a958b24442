use crate::error::{IoResultExt, Result};
use std::path::{Path, PathBuf};

/// A cache entry counts as present when it is a file with a non-zero size.
/// There is no content verification.
pub fn is_present(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Sibling path used while a file is being written (`client.jar.part`)
pub fn part_path(path: &Path) -> PathBuf {
    let tmp_name = format!(
        "{}.part",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
    );
    path.with_file_name(tmp_name)
}

pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).fs_context(parent)?;
    }
    Ok(())
}

/// Move a finished `.part` file into place.
pub fn promote_part(tmp_path: &Path, path: &Path) -> Result<()> {
    std::fs::rename(tmp_path, path).fs_context(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_files_are_not_present() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty.jar");
        std::fs::write(&empty, b"").unwrap();
        let full = tmp.path().join("full.jar");
        std::fs::write(&full, b"data").unwrap();

        assert!(!is_present(&empty));
        assert!(is_present(&full));
        assert!(!is_present(&tmp.path().join("missing.jar")));
        assert!(!is_present(tmp.path()));
    }

    #[test]
    fn part_path_is_a_sibling() {
        let p = part_path(Path::new("/data/versions/1.20.1/client.jar"));
        assert_eq!(p, Path::new("/data/versions/1.20.1/client.jar.part"));
    }
}
