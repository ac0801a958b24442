//! Launcher settings and the on-disk cache layout.
//!
//! Everything that used to be process-wide state (data root, target platform,
//! endpoints) lives in [`LauncherConfig`] and is threaded through each call.

use crate::error::{IoResultExt, LauncherError, Result};
use crate::game::installer::types::{Arch, OsType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// URL Constants
pub const VANILLA_MANIFEST_URL: &str =
    "https://launchermeta.mojang.com/mc/game/version_manifest.json";
pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";
pub const ADOPTIUM_BINARY_URL: &str =
    "https://api.adoptium.net/v3/binary/latest/{major}/ga/{os}/{arch}/jdk/hotspot/normal/eclipse";

pub const CONNECT_TIMEOUT_SECS: u64 = 30;

pub const CATALOG_FILENAME: &str = "version_manifest.json";
pub const CLIENT_JAR_NAME: &str = "client.jar";
pub const SERVER_JAR_NAME: &str = "server.jar";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Root of the local cache; every path below is relative to it
    pub root_dir: PathBuf,

    /// Target operating system
    pub os: OsType,

    /// Target architecture
    pub arch: Arch,

    pub catalog_url: String,

    /// Base URL for content-addressed asset objects
    pub resources_url: String,

    /// Runtime download endpoint with `{major}`, `{os}` and `{arch}` placeholders
    pub runtime_url_template: String,

    pub min_heap: String,
    pub max_heap: String,

    /// Additional JVM flags, shell-quoted (e.g. `-XX:+UseG1GC "-Dfoo=a b"`)
    pub extra_jvm_args: Option<String>,

    pub connect_timeout_secs: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self::new(".kiln")
    }
}

impl LauncherConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            os: OsType::current(),
            arch: Arch::current(),
            catalog_url: VANILLA_MANIFEST_URL.to_string(),
            resources_url: RESOURCES_URL.to_string(),
            runtime_url_template: ADOPTIUM_BINARY_URL.to_string(),
            min_heap: "1G".to_string(),
            max_heap: "2G".to_string(),
            extra_jvm_args: None,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
        }
    }

    pub fn with_platform(mut self, os: OsType, arch: Arch) -> Self {
        self.os = os;
        self.arch = arch;
        self
    }

    /// Load settings from a JSON file; missing fields fall back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).fs_context(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| LauncherError::parse(format!("config {}", path.display()), e))
    }

    /// Split [`extra_jvm_args`](Self::extra_jvm_args) the way a POSIX shell would
    pub fn extra_jvm_args(&self) -> Result<Vec<String>> {
        match self.extra_jvm_args.as_deref() {
            None => Ok(Vec::new()),
            Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Some(raw) => shlex::split(raw)
                .ok_or_else(|| LauncherError::parse("extra JVM arguments", "unbalanced quotes")),
        }
    }

    /// Get the root data directory
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root_dir.join(CATALOG_FILENAME)
    }

    /// Get the path to the versions directory
    pub fn versions_dir(&self) -> PathBuf {
        self.root_dir.join("versions")
    }

    /// `versions/<id>`, also used as the game's working directory
    pub fn version_dir(&self, version_id: &str) -> PathBuf {
        self.versions_dir().join(version_id)
    }

    pub fn descriptor_path(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id)
            .join(format!("{}.json", version_id))
    }

    pub fn client_jar_path(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id).join(CLIENT_JAR_NAME)
    }

    pub fn server_dir(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id).join("server")
    }

    pub fn server_jar_path(&self, version_id: &str) -> PathBuf {
        self.server_dir(version_id).join(SERVER_JAR_NAME)
    }

    /// Get the path to the libraries directory
    pub fn libraries_dir(&self) -> PathBuf {
        self.root_dir.join("libraries")
    }

    /// Get the path to the assets directory
    pub fn assets_dir(&self) -> PathBuf {
        self.root_dir.join("assets")
    }

    pub fn asset_indexes_dir(&self) -> PathBuf {
        self.assets_dir().join("indexes")
    }

    /// Get the path to the natives directory for this version
    pub fn natives_dir(&self, version_id: &str) -> PathBuf {
        self.root_dir.join("natives").join(version_id)
    }

    /// `runtime/<id>`, which holds the downloaded archive while installing
    pub fn runtime_base_dir(&self, version_id: &str) -> PathBuf {
        self.root_dir.join("runtime").join(version_id)
    }

    /// Canonical installed-runtime directory, `runtime/<id>/java`
    pub fn runtime_dir(&self, version_id: &str) -> PathBuf {
        self.runtime_base_dir(version_id).join("java")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_layout_matches_expected_paths() {
        let config = LauncherConfig::new("/data");
        assert_eq!(
            config.descriptor_path("1.20.1"),
            Path::new("/data/versions/1.20.1/1.20.1.json")
        );
        assert_eq!(
            config.client_jar_path("1.20.1"),
            Path::new("/data/versions/1.20.1/client.jar")
        );
        assert_eq!(
            config.server_jar_path("1.20.1"),
            Path::new("/data/versions/1.20.1/server/server.jar")
        );
        assert_eq!(config.natives_dir("1.8.9"), Path::new("/data/natives/1.8.9"));
        assert_eq!(
            config.runtime_dir("1.20.1"),
            Path::new("/data/runtime/1.20.1/java")
        );
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("kiln.json");
        std::fs::write(
            &path,
            r#"{ "root_dir": "/games", "os": "windows", "arch": "arm64", "max_heap": "4G" }"#,
        )
        .unwrap();

        let config = LauncherConfig::load(&path).unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/games"));
        assert_eq!(config.os, OsType::Windows);
        assert_eq!(config.arch, Arch::Arm64);
        assert_eq!(config.max_heap, "4G");
        assert_eq!(config.min_heap, "1G");
        assert_eq!(config.catalog_url, VANILLA_MANIFEST_URL);
    }

    #[test]
    fn load_rejects_malformed_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("kiln.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = LauncherConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
    }

    #[test]
    fn extra_jvm_args_are_shell_split() {
        let mut config = LauncherConfig::new("/data");
        assert!(config.extra_jvm_args().unwrap().is_empty());

        config.extra_jvm_args = Some(r#"-XX:+UseG1GC "-Dkiln.note=two words""#.to_string());
        assert_eq!(
            config.extra_jvm_args().unwrap(),
            vec!["-XX:+UseG1GC".to_string(), "-Dkiln.note=two words".to_string()]
        );

        config.extra_jvm_args = Some("\"unterminated".to_string());
        assert!(config.extra_jvm_args().is_err());
    }
}
