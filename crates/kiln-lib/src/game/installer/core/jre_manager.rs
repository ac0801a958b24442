use crate::error::{IoResultExt, LauncherError, Result};
use crate::game::installer::config::LauncherConfig;
use crate::game::installer::core::archive::extract_full;
use crate::game::installer::core::transport::{FetchMode, Transport};
use crate::game::installer::types::{Arch, EventSink, LauncherEvent, OsType};
use crate::game::launcher::version_parser::VersionDescriptor;
use crate::utils::fs::is_present;
use std::path::{Path, PathBuf};

/// Java major versions a runtime can be installed for
pub const SUPPORTED_JAVA_MAJORS: [u32; 5] = [8, 16, 17, 21, 25];

const RUNTIME_ARCHIVE_NAME: &str = "runtime.archive";

/// The Java major version `descriptor` asks for.
pub fn required_major_version(descriptor: &VersionDescriptor) -> Result<u32> {
    let major = descriptor.java_major_version().ok_or_else(|| {
        LauncherError::NotFound(format!("javaVersion.majorVersion for {}", descriptor.id))
    })?;
    if !SUPPORTED_JAVA_MAJORS.contains(&major) {
        return Err(LauncherError::UnsupportedPlatform(format!(
            "Java {} is not a supported runtime",
            major
        )));
    }
    Ok(major)
}

/// Fill the runtime endpoint template for a platform.
pub fn runtime_download_url(template: &str, major: u32, os: OsType, arch: Arch) -> Result<String> {
    if !SUPPORTED_JAVA_MAJORS.contains(&major) {
        return Err(LauncherError::UnsupportedPlatform(format!(
            "Java {} is not a supported runtime",
            major
        )));
    }

    let os_param = match os {
        OsType::Windows => "windows",
        OsType::Linux => "linux",
        OsType::MacOS => "mac",
    };
    let arch_param = match arch {
        Arch::X64 => "x64",
        Arch::Arm64 => "aarch64",
        Arch::X86 => {
            return Err(LauncherError::UnsupportedPlatform(format!(
                "no managed runtime for {} {}",
                os, arch
            )))
        }
    };

    Ok(template
        .replace("{major}", &major.to_string())
        .replace("{os}", os_param)
        .replace("{arch}", arch_param))
}

/// Make sure the runtime for `version_id` is unpacked at `runtime/<id>/java`.
///
/// An existing runtime directory is returned untouched. Otherwise the archive
/// is downloaded (unless a non-empty copy is already there), fully
/// extracted, its top-level directory renamed to `java`, and the archive
/// removed.
pub async fn ensure_runtime(
    transport: &dyn Transport,
    config: &LauncherConfig,
    url: &str,
    version_id: &str,
    sink: &dyn EventSink,
) -> Result<PathBuf> {
    let base_dir = config.runtime_base_dir(version_id);
    let runtime_dir = config.runtime_dir(version_id);
    let archive_path = base_dir.join(RUNTIME_ARCHIVE_NAME);

    if runtime_dir.is_dir() {
        log::info!("Found existing runtime installation: {:?}", runtime_dir);
        return Ok(runtime_dir);
    }

    std::fs::create_dir_all(&base_dir).fs_context(&base_dir)?;

    if is_present(&archive_path) {
        log::info!("Reusing downloaded runtime archive: {:?}", archive_path);
    } else {
        log::info!("Downloading runtime from {}", url);
        sink.emit(LauncherEvent::info(format!("Downloading Java runtime for {}", version_id)));
        transport
            .fetch(url, FetchMode::Disk(&archive_path))
            .await?;
        sink.emit(LauncherEvent::DownloadFinished {
            url: url.to_string(),
            path: archive_path.clone(),
            cached: false,
        });
    }

    let extraction = extract_full(&archive_path, &base_dir)?;
    let top_level = extraction.top_level.ok_or_else(|| {
        LauncherError::archive(&archive_path, "no top-level directory in runtime archive")
    })?;
    let extracted_root = base_dir.join(&top_level);
    if !extracted_root.is_dir() {
        return Err(LauncherError::archive(
            &archive_path,
            format!("extracted root {:?} is missing", top_level),
        ));
    }

    std::fs::rename(&extracted_root, &runtime_dir).fs_context(&runtime_dir)?;
    std::fs::remove_file(&archive_path).fs_context(&archive_path)?;

    log::info!("Runtime installed: {:?}", runtime_dir);
    Ok(runtime_dir)
}

/// Find the java executable in a runtime directory
pub fn find_java_executable(dir: &Path, os: OsType) -> Option<PathBuf> {
    let executable_name = os.java_executable_name();

    let direct = dir.join("bin").join(executable_name);
    if direct.is_file() {
        return Some(direct);
    }

    // macOS JDK bundles
    let macos = dir.join("Contents/Home/bin").join(executable_name);
    if macos.is_file() {
        return Some(macos);
    }

    None
}

/// Like [`find_java_executable`], but a missing binary is an error.
pub fn java_executable(dir: &Path, os: OsType) -> Result<PathBuf> {
    find_java_executable(dir, os)
        .ok_or_else(|| LauncherError::NotFound(format!("java executable under {}", dir.display())))
}
