//! Single-URL fetching over HTTP(S).
//!
//! The rest of the engine only talks to the [`Transport`] trait so tests can
//! swap in an in-memory implementation.

use crate::error::{IoResultExt, LauncherError, Result};
use crate::game::installer::config::LauncherConfig;
use crate::utils::fs::{ensure_parent, part_path, promote_part};
use futures::future::BoxFuture;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Upper bound on the buffer reserved up front for in-memory bodies.
const MAX_PREALLOC: u64 = 8 << 20;

/// Where the body of a fetch should end up.
#[derive(Debug, Clone, Copy)]
pub enum FetchMode<'a> {
    Memory,
    Disk(&'a Path),
    MemoryAndDisk(&'a Path),
}

impl<'a> FetchMode<'a> {
    fn keeps_bytes(&self) -> bool {
        matches!(self, FetchMode::Memory | FetchMode::MemoryAndDisk(_))
    }

    fn destination(&self) -> Option<&'a Path> {
        match self {
            FetchMode::Memory => None,
            FetchMode::Disk(p) | FetchMode::MemoryAndDisk(p) => Some(p),
        }
    }
}

#[derive(Debug, Default)]
pub struct FetchOutput {
    /// Response body, present for `Memory` and `MemoryAndDisk`
    pub bytes: Option<Vec<u8>>,
    /// Path written, present for `Disk` and `MemoryAndDisk`
    pub written: Option<PathBuf>,
}

impl FetchOutput {
    /// Take the in-memory body, failing if the fetch was disk-only
    pub fn into_bytes(self, url: &str) -> Result<Vec<u8>> {
        self.bytes
            .ok_or_else(|| LauncherError::network(url, "response body was not kept in memory"))
    }
}

/// Fetches one URL. Implementations must not retry.
pub trait Transport: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str, mode: FetchMode<'a>)
        -> BoxFuture<'a, Result<FetchOutput>>;
}

/// reqwest-backed transport. Redirects are followed, TLS certificates are
/// verified and only the connect phase has a timeout.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &LauncherConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("kiln/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LauncherError::network("<client>", e))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_inner(&self, url: &str, mode: FetchMode<'_>) -> Result<FetchOutput> {
        log::debug!("Fetching: {} ({:?})", url, mode);
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LauncherError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::network(url, format!("HTTP {}", status)));
        }

        // Content-Length is only a hint; a hostile value must not drive the allocation.
        let mut buffer = if mode.keeps_bytes() {
            let hint = response.content_length().unwrap_or(0).min(MAX_PREALLOC);
            Some(Vec::with_capacity(hint as usize))
        } else {
            None
        };

        // Bodies destined for disk go through a `.part` sibling first so a
        // failed transfer never leaves a truncated file at the real path.
        let mut file = match mode.destination() {
            Some(path) => {
                ensure_parent(path)?;
                let tmp_path = part_path(path);
                let file = File::create(&tmp_path).await.fs_context(&tmp_path)?;
                Some((file, tmp_path, path))
            }
            None => None,
        };

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    if let Some((_, tmp_path, _)) = &file {
                        let _ = tokio::fs::remove_file(tmp_path).await;
                    }
                    return Err(LauncherError::network(url, e));
                }
            };
            if let Some((f, tmp_path, _)) = file.as_mut() {
                if let Err(e) = f.write_all(&chunk).await {
                    let _ = tokio::fs::remove_file(&*tmp_path).await;
                    return Err(LauncherError::Filesystem {
                        path: tmp_path.clone(),
                        source: e,
                    });
                }
            }
            if let Some(buf) = buffer.as_mut() {
                buf.extend_from_slice(&chunk);
            }
            downloaded += chunk.len() as u64;
        }

        let written = match file {
            Some((f, tmp_path, path)) => {
                if let Err(e) = finish_part(f, &tmp_path, path).await {
                    let _ = tokio::fs::remove_file(&tmp_path).await;
                    return Err(e);
                }
                Some(path.to_path_buf())
            }
            None => None,
        };

        log::debug!(
            "Fetched {} ({} bytes in {:.2}s)",
            url,
            downloaded,
            start.elapsed().as_secs_f64()
        );

        Ok(FetchOutput {
            bytes: buffer,
            written,
        })
    }
}

async fn finish_part(mut file: File, tmp_path: &Path, path: &Path) -> Result<()> {
    file.flush().await.fs_context(tmp_path)?;
    file.sync_all().await.fs_context(tmp_path)?;
    drop(file);
    promote_part(tmp_path, path)
}

impl Transport for HttpTransport {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        mode: FetchMode<'a>,
    ) -> BoxFuture<'a, Result<FetchOutput>> {
        Box::pin(self.fetch_inner(url, mode))
    }
}
