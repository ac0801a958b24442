//! End-to-end install and launch preparation for vanilla versions.
//!
//! Each flow runs its steps strictly in order and stops at the first step that
//! fails; only bulk asset downloads tolerate individual failures.

use crate::error::Result;
use crate::game::installer::config::{LauncherConfig, CLIENT_JAR_NAME, SERVER_JAR_NAME};
use crate::game::installer::core::downloader::{ensure_local, DownloadReport, FailurePolicy};
use crate::game::installer::core::jre_manager::{
    ensure_runtime, java_executable, required_major_version, runtime_download_url,
};
use crate::game::installer::core::transport::Transport;
use crate::game::installer::types::{DownloadTask, EventSink, LauncherEvent};
use crate::game::launcher::arguments::{build_launch_command, LaunchCommand};
use crate::game::launcher::assets::fetch_asset_index;
use crate::game::launcher::classpath::build_classpath;
use crate::game::launcher::natives::{extract_natives, native_tasks};
use crate::game::launcher::version_parser::{fetch_descriptor, VersionDescriptor};
use crate::game::metadata::fetch_catalog;
use crate::utils::fs::is_present;
use std::path::PathBuf;

fn start_step(sink: &dyn EventSink, step: &str) {
    log::info!("==> {}", step);
    sink.emit(LauncherEvent::step(step));
}

/// Outcome of [`install_client`]
#[derive(Debug)]
pub struct ClientInstall {
    pub descriptor: VersionDescriptor,
    pub client_jar: PathBuf,
    /// Asset objects are best-effort; failures end up here
    pub assets: DownloadReport,
}

/// Everything needed to hand a launch to the process supervisor
#[derive(Debug, Clone)]
pub struct PreparedLaunch {
    pub java_path: PathBuf,
    pub command: LaunchCommand,
}

/// Load the descriptor for `version_id`.
///
/// A cached descriptor is used directly; otherwise the catalog is fetched to
/// find its URL.
pub async fn resolve_descriptor(
    transport: &dyn Transport,
    config: &LauncherConfig,
    version_id: &str,
    sink: &dyn EventSink,
) -> Result<VersionDescriptor> {
    let cached = config.descriptor_path(version_id);
    // A cached descriptor is read without touching the URL
    let url = if is_present(&cached) {
        String::new()
    } else {
        start_step(sink, "Fetching version catalog");
        let catalog = fetch_catalog(transport, config).await?;
        catalog.resolve_descriptor_url(version_id)?.to_string()
    };

    start_step(sink, "Fetching version descriptor");
    fetch_descriptor(transport, config, &url, version_id).await
}

/// Download the client jar, asset index and asset objects.
pub async fn install_client(
    transport: &dyn Transport,
    config: &LauncherConfig,
    version_id: &str,
    sink: &dyn EventSink,
) -> Result<ClientInstall> {
    log::info!("Installing client {}", version_id);
    let descriptor = resolve_descriptor(transport, config, version_id, sink).await?;

    start_step(sink, "Downloading game client");
    let client_task = DownloadTask::new(descriptor.client_download_url()?, CLIENT_JAR_NAME);
    ensure_local(
        transport,
        std::slice::from_ref(&client_task),
        &config.version_dir(version_id),
        FailurePolicy::AbortOnFirstFailure,
        sink,
    )
    .await?;

    start_step(sink, "Downloading asset index");
    let index = fetch_asset_index(
        transport,
        config,
        descriptor.asset_index_url()?,
        descriptor.asset_index_id(),
    )
    .await?;

    start_step(sink, "Downloading assets");
    let tasks = index.object_tasks(&config.resources_url);
    let assets = ensure_local(
        transport,
        &tasks,
        config.root_dir(),
        FailurePolicy::ContinueAndReport,
        sink,
    )
    .await?;
    if !assets.is_complete() {
        sink.emit(LauncherEvent::warn(format!(
            "{} of {} assets failed to download",
            assets.failures.len(),
            tasks.len()
        )));
    }

    Ok(ClientInstall {
        client_jar: config.client_jar_path(version_id),
        descriptor,
        assets,
    })
}

/// Install the Java runtime the version asks for and return its executable.
pub async fn install_runtime(
    transport: &dyn Transport,
    config: &LauncherConfig,
    descriptor: &VersionDescriptor,
    version_id: &str,
    sink: &dyn EventSink,
) -> Result<PathBuf> {
    start_step(sink, "Setting up Java runtime");
    let major = required_major_version(descriptor)?;
    let url = runtime_download_url(&config.runtime_url_template, major, config.os, config.arch)?;
    log::info!("Version {} needs Java {}", version_id, major);

    let runtime_dir = ensure_runtime(transport, config, &url, version_id, sink).await?;
    java_executable(&runtime_dir, config.os)
}

/// Download libraries and natives, install the runtime and compose the
/// offline launch command. The client jar must already be installed.
pub async fn prepare_launch(
    transport: &dyn Transport,
    config: &LauncherConfig,
    version_id: &str,
    username: &str,
    sink: &dyn EventSink,
) -> Result<PreparedLaunch> {
    let descriptor = resolve_descriptor(transport, config, version_id, sink).await?;
    let libraries_dir = config.libraries_dir();

    start_step(sink, "Downloading libraries");
    let library_tasks = descriptor.library_tasks(config.os, config.arch);
    ensure_local(
        transport,
        &library_tasks,
        &libraries_dir,
        FailurePolicy::AbortOnFirstFailure,
        sink,
    )
    .await?;
    let library_paths: Vec<PathBuf> = library_tasks
        .iter()
        .map(|t| t.destination(&libraries_dir))
        .collect();

    start_step(sink, "Downloading natives");
    let natives = native_tasks(&descriptor, version_id, config.os, config.arch)?;
    ensure_local(
        transport,
        &natives,
        &libraries_dir,
        FailurePolicy::AbortOnFirstFailure,
        sink,
    )
    .await?;

    start_step(sink, "Extracting natives");
    let native_archives: Vec<PathBuf> = natives
        .iter()
        .map(|t| t.destination(&libraries_dir))
        .collect();
    extract_natives(config, version_id, &native_archives)?;

    let java_path = install_runtime(transport, config, &descriptor, version_id, sink).await?;

    start_step(sink, "Building launch command");
    let classpath = build_classpath(
        &library_paths,
        &config.client_jar_path(version_id),
        config.os,
    )?;
    let command = build_launch_command(config, username, &classpath, &descriptor, version_id)?;

    Ok(PreparedLaunch { java_path, command })
}

/// Download the dedicated server jar for a resolved descriptor.
pub async fn ensure_server(
    transport: &dyn Transport,
    config: &LauncherConfig,
    descriptor: &VersionDescriptor,
    version_id: &str,
    sink: &dyn EventSink,
) -> Result<PathBuf> {
    let task = DownloadTask::new(descriptor.server_download_url()?, SERVER_JAR_NAME);
    let server_dir = config.server_dir(version_id);
    ensure_local(
        transport,
        std::slice::from_ref(&task),
        &server_dir,
        FailurePolicy::AbortOnFirstFailure,
        sink,
    )
    .await?;
    Ok(task.destination(&server_dir))
}

/// Resolve a version and download its server jar.
pub async fn install_server(
    transport: &dyn Transport,
    config: &LauncherConfig,
    version_id: &str,
    sink: &dyn EventSink,
) -> Result<PathBuf> {
    log::info!("Installing server {}", version_id);
    let descriptor = resolve_descriptor(transport, config, version_id, sink).await?;
    start_step(sink, "Downloading server");
    ensure_server(transport, config, &descriptor, version_id, sink).await
}
