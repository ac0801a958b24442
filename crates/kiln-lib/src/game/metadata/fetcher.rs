use super::types::VersionCatalog;
use crate::error::Result;
use crate::game::installer::config::LauncherConfig;
use crate::game::installer::core::transport::{FetchMode, Transport};

/// Fetch the version catalog and keep a copy at `<root>/version_manifest.json`.
///
/// The catalog can change between sessions, so the network is always asked.
pub async fn fetch_catalog(
    transport: &dyn Transport,
    config: &LauncherConfig,
) -> Result<VersionCatalog> {
    let url = config.catalog_url.as_str();
    let path = config.catalog_path();
    log::info!("Fetching version catalog from {}", url);

    let bytes = transport
        .fetch(url, FetchMode::MemoryAndDisk(&path))
        .await?
        .into_bytes(url)?;
    let catalog = VersionCatalog::parse(&bytes)?;

    log::info!("Catalog lists {} versions", catalog.versions.len());
    Ok(catalog)
}
