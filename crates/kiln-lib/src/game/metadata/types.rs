use crate::error::{LauncherError, Result};
use serde::{Deserialize, Serialize};

/// The remote version catalog (`version_manifest.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionCatalog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<LatestVersions>,
    #[serde(default)]
    pub versions: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestVersions {
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub snapshot: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub version_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_time: Option<String>,
}

impl VersionCatalog {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| LauncherError::parse("version catalog", e))?;
        if !value.get("versions").is_some_and(|v| v.is_array()) {
            return Err(LauncherError::parse(
                "version catalog",
                "missing \"versions\" array",
            ));
        }
        serde_json::from_value(value).map_err(|e| LauncherError::parse("version catalog", e))
    }

    /// Version ids in catalog order
    pub fn version_ids(&self) -> Vec<&str> {
        self.versions
            .iter()
            .filter_map(|v| v.id.as_deref())
            .collect()
    }

    pub fn resolve_descriptor_url(&self, version_id: &str) -> Result<&str> {
        self.versions
            .iter()
            .find(|v| v.id.as_deref() == Some(version_id))
            .and_then(|v| v.url.as_deref())
            .ok_or_else(|| LauncherError::NotFound(format!("version {} in catalog", version_id)))
    }

    pub fn latest_release(&self) -> Option<&str> {
        self.latest.as_ref()?.release.as_deref()
    }

    pub fn latest_snapshot(&self) -> Option<&str> {
        self.latest.as_ref()?.snapshot.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn resolves_descriptor_url() {
        let catalog = VersionCatalog::parse(
            br#"{"versions":[{"id":"1.20.1","url":"http://x/1.20.1.json"}]}"#,
        )
        .unwrap();
        assert_eq!(
            catalog.resolve_descriptor_url("1.20.1").unwrap(),
            "http://x/1.20.1.json"
        );
        assert_eq!(
            catalog.resolve_descriptor_url("missing").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(catalog.latest_release().is_none());
    }

    #[test]
    fn version_ids_keep_order_and_skip_unnamed() {
        let catalog = VersionCatalog::parse(
            br#"{
                "latest": { "release": "1.20.1", "snapshot": "23w31a" },
                "versions": [
                    { "id": "23w31a", "type": "snapshot", "url": "http://x/a.json" },
                    { "type": "release", "url": "http://x/nameless.json" },
                    { "id": "1.20.1", "type": "release", "url": "http://x/b.json" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(catalog.version_ids(), vec!["23w31a", "1.20.1"]);
        assert_eq!(catalog.latest_release(), Some("1.20.1"));
        assert_eq!(catalog.latest_snapshot(), Some("23w31a"));
    }

    #[test]
    fn rejects_malformed_catalogs() {
        assert_eq!(
            VersionCatalog::parse(b"{").unwrap_err().kind(),
            ErrorKind::Parse
        );
        assert_eq!(
            VersionCatalog::parse(br#"{"latest":{}}"#).unwrap_err().kind(),
            ErrorKind::Parse
        );
    }
}
