//! Per-version descriptor (`<id>.json`) model and its projections
use crate::error::{IoResultExt, LauncherError, Result};
use crate::game::installer::config::LauncherConfig;
use crate::game::installer::core::archive::sanitize_entry_path;
use crate::game::installer::core::transport::{FetchMode, Transport};
use crate::game::installer::types::{Arch, DownloadTask, OsType};
use crate::game::launcher::rules::is_allowed;
use crate::utils::fs::{ensure_parent, is_present};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete version descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    #[serde(default)]
    pub id: String,

    /// Main class to execute
    #[serde(default)]
    pub main_class: String,

    #[serde(default)]
    pub libraries: Vec<Library>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexRef>,

    /// Assets version (legacy)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_version: Option<JavaVersion>,

    #[serde(default)]
    pub downloads: VersionDownloads,

    /// Version type (release, snapshot, etc.)
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    pub version_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionDownloads {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<Artifact>,
}

/// Rule for conditional libraries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// Library definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    /// Maven coordinates
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,

    /// Rules for conditional inclusion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,

    /// Legacy native classifiers, keyed by rule OS name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<HashMap<String, Artifact>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Artifact {
    /// `(url, path)` when both are present
    pub fn task(&self) -> Option<DownloadTask> {
        match (&self.url, &self.path) {
            (Some(url), Some(path)) if !url.is_empty() && !path.is_empty() => {
                Some(DownloadTask::new(url.clone(), path.clone()))
            }
            _ => None,
        }
    }
}

/// Asset index reference inside a descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexRef {
    pub id: Option<String>,
    pub url: Option<String>,
}

/// Java version requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersion {
    #[serde(default)]
    pub component: Option<String>,
    pub major_version: Option<u32>,
}

/// True for artifact paths that hold platform natives (`...-natives-linux.jar`)
pub fn is_native_artifact(path: &str) -> bool {
    path.contains("natives-")
}

impl VersionDescriptor {
    /// Decode and validate a descriptor document.
    ///
    /// A usable descriptor has a main class and a client download URL.
    pub fn parse(bytes: &[u8], version_id: &str) -> Result<Self> {
        let mut descriptor: VersionDescriptor = serde_json::from_slice(bytes)
            .map_err(|e| LauncherError::parse(format!("descriptor for {}", version_id), e))?;

        if descriptor.id.is_empty() {
            descriptor.id = version_id.to_string();
        }
        if descriptor.main_class.trim().is_empty() {
            return Err(LauncherError::NotFound(format!(
                "mainClass in descriptor for {}",
                version_id
            )));
        }
        descriptor.client_download_url()?;
        descriptor.check_library_paths()?;
        Ok(descriptor)
    }

    /// Library paths are joined onto `libraries/`, so they must stay below it.
    fn check_library_paths(&self) -> Result<()> {
        let artifacts = self
            .libraries
            .iter()
            .filter_map(|lib| lib.downloads.as_ref())
            .flat_map(|d| d.artifact.iter().chain(d.classifiers.iter().flat_map(|c| c.values())));
        for artifact in artifacts {
            if let Some(path) = artifact.path.as_deref().filter(|p| !p.is_empty()) {
                if sanitize_entry_path(path).is_none() {
                    return Err(LauncherError::parse(
                        format!("descriptor for {}", self.id),
                        format!("library path {:?} escapes the library directory", path),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn client_download_url(&self) -> Result<&str> {
        self.downloads
            .client
            .as_ref()
            .and_then(|a| a.url.as_deref())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| LauncherError::NotFound(format!("client download for {}", self.id)))
    }

    pub fn server_download_url(&self) -> Result<&str> {
        self.downloads
            .server
            .as_ref()
            .and_then(|a| a.url.as_deref())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| LauncherError::NotFound(format!("server download for {}", self.id)))
    }

    pub fn asset_index_url(&self) -> Result<&str> {
        self.asset_index
            .as_ref()
            .and_then(|a| a.url.as_deref())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| LauncherError::NotFound(format!("assetIndex.url for {}", self.id)))
    }

    /// Asset index id: `assetIndex.id`, then `assets`, then the version id
    pub fn asset_index_id(&self) -> &str {
        self.asset_index
            .as_ref()
            .and_then(|a| a.id.as_deref())
            .or(self.assets.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.id)
    }

    pub fn java_major_version(&self) -> Option<u32> {
        self.java_version.as_ref().and_then(|j| j.major_version)
    }

    /// Regular (non-native) libraries that apply to the target platform
    pub fn library_tasks(&self, os: OsType, arch: Arch) -> Vec<DownloadTask> {
        self.libraries
            .iter()
            .filter(|lib| is_allowed(lib, os, arch))
            .filter_map(|lib| lib.downloads.as_ref()?.artifact.as_ref()?.task())
            .filter(|task| !is_native_artifact(&task.path.to_string_lossy()))
            .collect()
    }
}

/// Load the descriptor for `version_id`, preferring the cached copy.
///
/// A cached `versions/<id>/<id>.json` is trusted as-is. A fetched document is
/// only written to the cache once it validates.
pub async fn fetch_descriptor(
    transport: &dyn Transport,
    config: &LauncherConfig,
    url: &str,
    version_id: &str,
) -> Result<VersionDescriptor> {
    let path = config.descriptor_path(version_id);

    if is_present(&path) {
        log::debug!("Using cached descriptor: {:?}", path);
        let bytes = tokio::fs::read(&path).await.fs_context(&path)?;
        return VersionDescriptor::parse(&bytes, version_id);
    }

    let bytes = transport
        .fetch(url, FetchMode::Memory)
        .await?
        .into_bytes(url)?;
    let descriptor = VersionDescriptor::parse(&bytes, version_id)?;

    ensure_parent(&path)?;
    tokio::fs::write(&path, &bytes).await.fs_context(&path)?;
    log::info!("Saved descriptor for {} to {:?}", version_id, path);
    Ok(descriptor)
}


#[cfg(test)]
mod tests {
    use super::fixtures::{LEGACY, MODERN};
    use super::*;
    use crate::game::installer::core::downloader::test_support::MockTransport;
    use crate::ErrorKind;
    use std::path::PathBuf;

    #[test]
    fn parses_projections() {
        let d = VersionDescriptor::parse(MODERN.as_bytes(), "1.20.1").unwrap();
        assert_eq!(d.main_class, "net.minecraft.client.main.Main");
        assert_eq!(d.client_download_url().unwrap(), "http://x/client.jar");
        assert_eq!(d.server_download_url().unwrap(), "http://x/server.jar");
        assert_eq!(d.asset_index_url().unwrap(), "http://x/indexes/5.json");
        assert_eq!(d.asset_index_id(), "5");
        assert_eq!(d.java_major_version(), Some(17));
    }

    #[test]
    fn asset_index_id_falls_back() {
        let d = VersionDescriptor::parse(LEGACY.as_bytes(), "1.8.9").unwrap();
        assert_eq!(d.asset_index_id(), "1.8");
        assert_eq!(d.asset_index_url().unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(d.server_download_url().unwrap_err().kind(), ErrorKind::NotFound);

        let bare = VersionDescriptor::parse(
            br#"{"mainClass":"Main","downloads":{"client":{"url":"http://x/c.jar"}}}"#,
            "rd-132211",
        )
        .unwrap();
        assert_eq!(bare.id, "rd-132211");
        assert_eq!(bare.asset_index_id(), "rd-132211");
    }

    #[test]
    fn missing_main_class_or_client_fails() {
        let err = VersionDescriptor::parse(
            br#"{"downloads":{"client":{"url":"http://x/c.jar"}}}"#,
            "1.0",
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = VersionDescriptor::parse(br#"{"mainClass":"Main"}"#, "1.0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = VersionDescriptor::parse(b"[1,2", "1.0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn library_paths_must_stay_in_library_dir() {
        for bad in ["../../escaped.jar", "/etc/cron.d/evil.jar", "a/../../b.jar"] {
            let doc = format!(
                r#"{{"mainClass":"Main","downloads":{{"client":{{"url":"http://x/c.jar"}}}},
                    "libraries":[{{"name":"evil:evil:1","downloads":{{"artifact":{{"path":"{}","url":"http://x/e.jar"}}}}}}]}}"#,
                bad
            );
            let err = VersionDescriptor::parse(doc.as_bytes(), "1.0").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parse, "{}", bad);
        }

        let classifier = br#"{"mainClass":"Main","downloads":{"client":{"url":"http://x/c.jar"}},
            "libraries":[{"name":"lwjgl","natives":{"linux":"natives-linux"},
              "downloads":{"classifiers":{"natives-linux":{"path":"../natives.jar","url":"http://x/n.jar"}}}}]}"#;
        let err = VersionDescriptor::parse(classifier, "1.0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn library_tasks_filter_rules_and_natives() {
        let d = VersionDescriptor::parse(MODERN.as_bytes(), "1.20.1").unwrap();

        let linux: Vec<PathBuf> = d
            .library_tasks(OsType::Linux, Arch::X64)
            .into_iter()
            .map(|t| t.path)
            .collect();
        assert_eq!(
            linux,
            vec![
                PathBuf::from("com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar"),
                PathBuf::from("org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar"),
            ]
        );

        let mac = d.library_tasks(OsType::MacOS, Arch::X64);
        assert_eq!(mac.len(), 3);
        assert_eq!(mac[2].url, "http://x/objc.jar");
    }

    #[tokio::test]
    async fn fetch_descriptor_caches_and_trusts_local_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let config = LauncherConfig::new(tmp.path());
        let transport = MockTransport::default().with("http://x/1.20.1.json", MODERN);

        let first = fetch_descriptor(&transport, &config, "http://x/1.20.1.json", "1.20.1")
            .await
            .unwrap();
        assert!(config.descriptor_path("1.20.1").is_file());

        let second = fetch_descriptor(&transport, &config, "http://x/1.20.1.json", "1.20.1")
            .await
            .unwrap();
        assert_eq!(first.main_class, second.main_class);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn invalid_descriptor_is_not_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let config = LauncherConfig::new(tmp.path());
        let transport = MockTransport::default().with("http://x/bad.json", r#"{"id":"bad"}"#);

        let err = fetch_descriptor(&transport, &config, "http://x/bad.json", "bad")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!config.descriptor_path("bad").exists());
    }
}
