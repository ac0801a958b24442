//! Classpath construction for the launched client
use crate::error::{LauncherError, Result};
use crate::game::installer::types::OsType;
use crate::game::launcher::version_parser::is_native_artifact;
use dunce::canonicalize;
use std::path::{Path, PathBuf};

/// Join library jars and the client jar into an absolute classpath string.
///
/// Native archives are dropped and missing libraries are skipped with a
/// warning. The client jar goes last and must exist.
pub fn build_classpath(
    library_paths: &[PathBuf],
    client_jar: &Path,
    os: OsType,
) -> Result<String> {
    let mut classpath_entries = Vec::with_capacity(library_paths.len() + 1);

    for path in library_paths {
        if path.as_os_str().is_empty() || is_native_artifact(&path.to_string_lossy()) {
            continue;
        }
        match canonicalize(path) {
            Ok(abs) => classpath_entries.push(abs.to_string_lossy().into_owned()),
            Err(e) => log::warn!("Library missing from classpath: {:?} ({})", path, e),
        }
    }

    let client = canonicalize(client_jar).map_err(|_| {
        LauncherError::NotFound(format!("client jar {}", client_jar.display()))
    })?;
    classpath_entries.push(client.to_string_lossy().into_owned());

    Ok(classpath_entries.join(os.classpath_separator()))
}
