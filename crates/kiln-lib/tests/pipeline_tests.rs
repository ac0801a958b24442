use kiln_lib::game::installer::core::transport::HttpTransport;
use kiln_lib::game::installer::types::{ChannelSink, SilentSink};
use kiln_lib::game::installer::{install_client, install_server, prepare_launch};
use kiln_lib::game::launcher::LaunchTarget;
use kiln_lib::{Arch, ErrorKind, LauncherConfig, LauncherEvent, OsType};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JAVA_SCRIPT: &[u8] = b"#!/bin/sh\necho \"$@\"\n";

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, body) in entries {
        zip.start_file::<&str, ()>(*name, Default::default())
            .unwrap();
        zip.write_all(body).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Serve `body` at `at`; the server panics on drop unless it was hit exactly once
async fn serve_once(server: &MockServer, at: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(1)
        .mount(server)
        .await;
}

fn asset_hash() -> String {
    format!("ab{}", "1".repeat(38))
}

fn descriptor_json(base: &str) -> Vec<u8> {
    serde_json::json!({
        "id": "1.20.1",
        "mainClass": "net.minecraft.client.main.Main",
        "assetIndex": { "id": "5", "url": format!("{}/indexes/5.json", base) },
        "javaVersion": { "component": "java-runtime-gamma", "majorVersion": 17 },
        "downloads": {
            "client": { "url": format!("{}/client.jar", base) },
            "server": { "url": format!("{}/server.jar", base) }
        },
        "libraries": [
            { "name": "com.mojang:brigadier:1.1.8",
              "downloads": { "artifact": {
                  "path": "com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar",
                  "url": format!("{}/lib/brigadier.jar", base) } } },
            { "name": "org.lwjgl:lwjgl:3.3.1:natives-linux",
              "downloads": { "artifact": {
                  "path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar",
                  "url": format!("{}/lib/lwjgl-natives-linux.jar", base) } },
              "rules": [ { "action": "allow", "os": { "name": "linux" } } ] },
            { "name": "org.lwjgl:lwjgl:3.3.1:natives-windows",
              "downloads": { "artifact": {
                  "path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-windows.jar",
                  "url": format!("{}/lib/lwjgl-natives-windows.jar", base) } },
              "rules": [ { "action": "allow", "os": { "name": "windows" } } ] }
        ]
    })
    .to_string()
    .into_bytes()
}

fn config_for(server: &MockServer, root: &Path) -> LauncherConfig {
    let base = server.uri();
    let mut config = LauncherConfig::new(root).with_platform(OsType::Linux, Arch::X64);
    config.catalog_url = format!("{}/catalog.json", base);
    config.resources_url = format!("{}/res", base);
    config.runtime_url_template = format!("{}/runtime/{{major}}/{{os}}/{{arch}}", base);
    config
}

async fn serve_metadata(server: &MockServer) {
    let base = server.uri();
    let catalog = serde_json::json!({
        "latest": { "release": "1.20.1", "snapshot": "1.20.1" },
        "versions": [
            { "id": "1.20.1", "type": "release", "url": format!("{}/v/1.20.1.json", base) }
        ]
    });
    serve_once(server, "/catalog.json", catalog.to_string().into_bytes()).await;
    serve_once(server, "/v/1.20.1.json", descriptor_json(&base)).await;
}

async fn serve_client_files(server: &MockServer) {
    let index = serde_json::json!({
        "objects": { "icons/icon.png": { "hash": asset_hash(), "size": 4 } }
    });
    serve_once(server, "/client.jar", b"client".to_vec()).await;
    serve_once(server, "/indexes/5.json", index.to_string().into_bytes()).await;
    serve_once(server, &format!("/res/ab/{}", asset_hash()), b"icon".to_vec()).await;
}

async fn serve_launch_files(server: &MockServer) {
    serve_once(server, "/lib/brigadier.jar", b"brigadier".to_vec()).await;
    serve_once(
        server,
        "/lib/lwjgl-natives-linux.jar",
        zip_bytes(&[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0"),
            ("linux/x64/org/lwjgl/liblwjgl.so", b"ELF"),
        ]),
    )
    .await;
    serve_once(
        server,
        "/runtime/17/linux/x64",
        zip_bytes(&[
            ("jdk-17.0.9+9/bin/java", JAVA_SCRIPT),
            ("jdk-17.0.9+9/release", b"JAVA_VERSION=\"17.0.9\""),
        ]),
    )
    .await;
}

#[tokio::test]
async fn client_install_is_idempotent_over_http() {
    let server = MockServer::start().await;
    serve_metadata(&server).await;
    serve_client_files(&server).await;
    let tmp = TempDir::new().expect("tmpdir");
    let config = config_for(&server, tmp.path());
    let transport = HttpTransport::new(&config).unwrap();

    let first = install_client(&transport, &config, "1.20.1", &SilentSink)
        .await
        .unwrap();
    assert!(first.assets.is_complete());
    assert_eq!(first.assets.fetched.len(), 1);
    assert_eq!(std::fs::read(&first.client_jar).unwrap(), b"client");
    assert!(config.catalog_path().is_file());
    assert!(config.descriptor_path("1.20.1").is_file());
    assert!(config.asset_indexes_dir().join("5.json").is_file());

    // Second run is served entirely from the cache
    let second = install_client(&transport, &config, "1.20.1", &SilentSink)
        .await
        .unwrap();
    assert!(second.assets.fetched.is_empty());
    assert_eq!(second.assets.cached.len(), 1);
}

#[tokio::test]
async fn prepare_launch_builds_offline_command() {
    let server = MockServer::start().await;
    serve_metadata(&server).await;
    serve_client_files(&server).await;
    serve_launch_files(&server).await;
    let tmp = TempDir::new().expect("tmpdir");
    let config = config_for(&server, tmp.path());
    let transport = HttpTransport::new(&config).unwrap();

    install_client(&transport, &config, "1.20.1", &SilentSink)
        .await
        .unwrap();
    let prepared = prepare_launch(&transport, &config, "1.20.1", "Steve", &SilentSink)
        .await
        .unwrap();

    assert!(prepared.java_path.ends_with("runtime/1.20.1/java/bin/java"));
    assert!(!config
        .runtime_base_dir("1.20.1")
        .join("runtime.archive")
        .exists());
    assert!(config.natives_dir("1.20.1").join("liblwjgl.so").is_file());

    let command = &prepared.command;
    assert_eq!(
        command.target,
        LaunchTarget::MainClass("net.minecraft.client.main.Main".to_string())
    );
    let cp_at = command.jvm_args.iter().position(|a| a == "-cp").unwrap();
    let classpath = &command.jvm_args[cp_at + 1];
    let entries: Vec<&str> = classpath.split(':').collect();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].ends_with("brigadier-1.1.8.jar"));
    assert!(entries[1].ends_with("client.jar"));
    assert!(!classpath.contains("natives"));

    let args = command.args();
    let user_at = args.iter().position(|a| a == "--username").unwrap();
    assert_eq!(args[user_at + 1], "Steve");
    assert!(args.contains(&"00000000-0000-0000-0000-000000000000".to_string()));
}

#[tokio::test]
async fn launch_without_client_jar_fails() {
    let server = MockServer::start().await;
    serve_metadata(&server).await;
    serve_launch_files(&server).await;
    let tmp = TempDir::new().expect("tmpdir");
    let config = config_for(&server, tmp.path());
    let transport = HttpTransport::new(&config).unwrap();

    let err = prepare_launch(&transport, &config, "1.20.1", "Steve", &SilentSink)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn server_jar_lands_under_version_dir() {
    let server = MockServer::start().await;
    serve_metadata(&server).await;
    serve_once(&server, "/server.jar", b"server".to_vec()).await;
    let tmp = TempDir::new().expect("tmpdir");
    let config = config_for(&server, tmp.path());
    let transport = HttpTransport::new(&config).unwrap();

    let (sink, mut rx) = ChannelSink::new();
    let jar = install_server(&transport, &config, "1.20.1", &sink)
        .await
        .unwrap();
    assert_eq!(jar, config.server_jar_path("1.20.1"));
    assert_eq!(std::fs::read(&jar).unwrap(), b"server");

    let mut downloads = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, LauncherEvent::DownloadFinished { cached: false, .. }) {
            downloads += 1;
        }
    }
    assert_eq!(downloads, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn prepared_command_runs_under_supervisor() {
    use kiln_lib::game::installer::types::ConsoleStream;
    use kiln_lib::game::launcher::{ProcessState, ProcessSupervisor};
    use std::sync::Arc;
    use std::time::Duration;

    let server = MockServer::start().await;
    serve_metadata(&server).await;
    serve_client_files(&server).await;
    serve_launch_files(&server).await;
    let tmp = TempDir::new().expect("tmpdir");
    let config = config_for(&server, tmp.path());
    let transport = HttpTransport::new(&config).unwrap();

    install_client(&transport, &config, "1.20.1", &SilentSink)
        .await
        .unwrap();
    let prepared = prepare_launch(&transport, &config, "1.20.1", "Steve", &SilentSink)
        .await
        .unwrap();

    let (sink, mut rx) = ChannelSink::new();
    let supervisor = ProcessSupervisor::for_platform(OsType::Linux, Arc::new(sink));
    supervisor
        .launch(&prepared.java_path, &prepared.command)
        .await
        .unwrap();
    let state = tokio::time::timeout(Duration::from_secs(10), supervisor.wait())
        .await
        .unwrap();
    assert_eq!(state, ProcessState::Exited(Some(0)));

    let mut stdout = String::new();
    while let Ok(event) = rx.try_recv() {
        if let LauncherEvent::Console {
            stream: ConsoleStream::Stdout,
            text,
        } = event
        {
            stdout.push_str(&text);
        }
    }
    assert!(stdout.contains("net.minecraft.client.main.Main"));
    assert!(stdout.contains("--username Steve"));
}
