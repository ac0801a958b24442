//! Asset index documents and content-addressed object tasks.

use crate::error::{LauncherError, Result};
use crate::game::installer::config::LauncherConfig;
use crate::game::installer::core::downloader::fetch_json;
use crate::game::installer::core::transport::Transport;
use crate::game::installer::types::DownloadTask;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetIndex {
    /// Virtual path -> object
    #[serde(default)]
    pub objects: BTreeMap<String, AssetObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetObject {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl AssetIndex {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| LauncherError::parse("asset index", e))
    }

    /// One task per distinct object hash: `<base>/<xx>/<hash>` to
    /// `assets/objects/<xx>/<hash>` (relative to the cache root).
    pub fn object_tasks(&self, resources_url: &str) -> Vec<DownloadTask> {
        let base = resources_url.trim_end_matches('/');
        let hashes: BTreeSet<&str> = self
            .objects
            .values()
            .filter_map(|o| o.hash.as_deref())
            .filter(|h| h.len() > 2 && h.chars().all(|c| c.is_ascii_hexdigit()))
            .collect();

        hashes
            .into_iter()
            .map(|hash| {
                let shard = &hash[..2];
                DownloadTask::new(
                    format!("{}/{}/{}", base, shard, hash),
                    PathBuf::from("assets").join("objects").join(shard).join(hash),
                )
            })
            .collect()
    }
}

/// File name an index is cached under: the last path segment of its URL.
fn index_file_name(url: &str, fallback_id: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("{}.json", fallback_id))
}

/// Fetch an asset index, reusing `assets/indexes/<file>` when present.
pub async fn fetch_asset_index(
    transport: &dyn Transport,
    config: &LauncherConfig,
    url: &str,
    index_id: &str,
) -> Result<AssetIndex> {
    let path = config.asset_indexes_dir().join(index_file_name(url, index_id));
    let index: AssetIndex = fetch_json(transport, url, Some(&path), "asset index").await?;
    log::info!("Asset index {} lists {} objects", index_id, index.objects.len());
    Ok(index)
}
