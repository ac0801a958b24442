//! Native library selection and extraction
use crate::error::{LauncherError, Result};
use crate::game::installer::config::LauncherConfig;
use crate::game::installer::core::archive::extract_selective;
use crate::game::installer::types::{Arch, DownloadTask, OsType};
use crate::game::launcher::rules::{arch_suffix, is_allowed, is_modern_layout};
use crate::game::launcher::version_parser::{Library, VersionDescriptor};
use std::path::PathBuf;

/// Pointer width substituted for `${arch}` in legacy classifier templates
const LEGACY_ARCH_BITS: &str = "64";

/// Native archives the target platform needs for `version_id`.
///
/// Versions before 1.19 pick from each library's `natives` classifier map;
/// later ones ship `natives-<os>[-<arch>]` artifacts directly.
pub fn native_tasks(
    descriptor: &VersionDescriptor,
    version_id: &str,
    os: OsType,
    arch: Arch,
) -> Result<Vec<DownloadTask>> {
    if arch == Arch::X86 {
        return Err(LauncherError::UnsupportedPlatform(format!(
            "32-bit natives are not available ({} {})",
            os, arch
        )));
    }

    let modern = is_modern_layout(version_id);
    if arch == Arch::Arm64 && !modern {
        return Err(LauncherError::UnsupportedPlatform(format!(
            "arm64 natives need 1.19 or newer, got {}",
            version_id
        )));
    }

    let suffix = arch_suffix(os, arch);
    let tasks = descriptor
        .libraries
        .iter()
        .filter(|lib| is_allowed(lib, os, arch))
        .filter_map(|lib| {
            if modern {
                modern_native(lib, os, suffix)
            } else {
                legacy_native(lib, os, suffix)
            }
        })
        .collect();
    Ok(tasks)
}

fn legacy_native(library: &Library, os: OsType, suffix: &str) -> Option<DownloadTask> {
    let template = library.natives.as_ref()?.get(os.as_str())?;
    let classifier = format!("{}{}", template.replace("${arch}", LEGACY_ARCH_BITS), suffix);
    library
        .downloads
        .as_ref()?
        .classifiers
        .as_ref()?
        .get(&classifier)?
        .task()
}

fn modern_native(library: &Library, os: OsType, suffix: &str) -> Option<DownloadTask> {
    let task = library.downloads.as_ref()?.artifact.as_ref()?.task()?;
    let path = task.path.to_string_lossy();
    let marker = format!("natives-{}", os.natives_name());

    // The text between the marker and the extension names the architecture.
    let (_, rest) = path.split_once(&marker)?;
    let variant = rest.strip_suffix(".jar").unwrap_or(rest);
    if variant == suffix {
        Some(task)
    } else {
        None
    }
}

/// Pull shared libraries out of downloaded native archives into
/// `natives/<id>`. Returns the files extracted by this call.
pub fn extract_natives(
    config: &LauncherConfig,
    version_id: &str,
    native_archives: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let dest = config.natives_dir(version_id);
    let extracted = extract_selective(
        native_archives,
        config.os.shared_library_extension(),
        &dest,
    )?;
    log::info!(
        "Extracted {} native libraries for {} into {:?}",
        extracted.len(),
        version_id,
        dest
    );
    Ok(extracted)
}
