use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use kiln_lib::game::installer::core::transport::HttpTransport;
use kiln_lib::game::installer::{install_client, prepare_launch};
use kiln_lib::game::launcher::ProcessSupervisor;
use kiln_lib::game::metadata::fetch_catalog;
use kiln_lib::{EventSink, LauncherConfig, LauncherEvent};

struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, event: LauncherEvent) {
        match event {
            LauncherEvent::StepStarted { step, .. } => println!("[STEP] {}", step),
            LauncherEvent::Message { level, text } => println!("[{:?}] {}", level, text),
            LauncherEvent::DownloadFinished { path, cached, .. } => {
                if !cached {
                    println!("[GET] {}", path.display());
                }
            }
            LauncherEvent::DownloadFailed { url, reason } => {
                println!("[FAIL] {} ({})", url, reason)
            }
            LauncherEvent::Console { stream, text } => {
                println!("[{}] {}", stream.as_str(), text.trim_end())
            }
            LauncherEvent::ProcessExited {
                code, terminated, ..
            } => println!("[EXIT] code={:?} terminated={}", code, terminated),
        }
    }
}

/// Usage: `offline_launch [version] [username]`
///
/// Set `KILN_CONFIG` to a JSON settings file or `KILN_ROOT` to pick the data
/// directory; both default to `./.kiln`.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match std::env::var_os("KILN_CONFIG") {
        Some(path) => LauncherConfig::load(&PathBuf::from(path))?,
        None => LauncherConfig::new(
            std::env::var_os("KILN_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".kiln")),
        ),
    };
    let transport = HttpTransport::new(&config)?;
    let sink = Arc::new(ConsoleSink);

    let mut args = std::env::args().skip(1);
    let version_id = match args.next() {
        Some(id) => id,
        None => fetch_catalog(&transport, &config)
            .await?
            .latest_release()
            .map(str::to_string)
            .context("catalog has no latest release")?,
    };
    let username = args.next().unwrap_or_else(|| "Player".to_string());

    println!(
        "Installing {} for {} {} into {}",
        version_id,
        config.os,
        config.arch,
        config.root_dir().display()
    );
    install_client(&transport, &config, &version_id, sink.as_ref()).await?;
    let prepared =
        prepare_launch(&transport, &config, &version_id, &username, sink.as_ref()).await?;
    println!("{} {}", prepared.java_path.display(), prepared.command);

    let supervisor = ProcessSupervisor::for_platform(config.os, sink);
    supervisor
        .launch(&prepared.java_path, &prepared.command)
        .await?;

    let state = tokio::select! {
        state = supervisor.wait() => state,
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupted, stopping game");
            supervisor.shutdown().await
        }
    };
    println!("Finished: {:?}", state);
    Ok(())
}
