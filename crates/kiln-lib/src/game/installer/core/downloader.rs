//! Batch materialisation of download tasks into the local cache.

use crate::error::{IoResultExt, LauncherError, Result};
use crate::game::installer::core::transport::{FetchMode, Transport};
use crate::game::installer::types::{DownloadTask, EventSink, LauncherEvent};
use crate::utils::fs::{ensure_parent, is_present, part_path, promote_part};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// What to do when one task in a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failure and return it as the error.
    AbortOnFirstFailure,
    /// Attempt every task; failures are collected in the report.
    #[default]
    ContinueAndReport,
}

#[derive(Debug)]
pub struct DownloadFailure {
    pub task: DownloadTask,
    pub error: LauncherError,
}

#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Files requested from the network during this run
    pub fetched: Vec<PathBuf>,
    /// Files that were already present
    pub cached: Vec<PathBuf>,
    pub failures: Vec<DownloadFailure>,
}

impl DownloadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn a report with failures into an error naming the first one
    pub fn into_result(mut self) -> Result<Self> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        let total = self.failures.len();
        let first = self.failures.remove(0);
        log::error!("{} download(s) failed, first: {}", total, first.task.url);
        Err(first.error)
    }
}

/// Make every task's destination (resolved against `root`) exist locally.
///
/// Present files are never re-requested. Tasks run one after another in the
/// order given.
pub async fn ensure_local(
    transport: &dyn Transport,
    tasks: &[DownloadTask],
    root: &Path,
    policy: FailurePolicy,
    sink: &dyn EventSink,
) -> Result<DownloadReport> {
    let mut report = DownloadReport::default();

    for task in tasks {
        if !task.is_contained() {
            let error = LauncherError::parse(
                format!("download task for {}", task.url),
                format!("path {:?} escapes {:?}", task.path, root),
            );
            log::warn!("Refusing download: {}", error);
            sink.emit(LauncherEvent::DownloadFailed {
                url: task.url.clone(),
                reason: error.to_string(),
            });
            if policy == FailurePolicy::AbortOnFirstFailure {
                return Err(error);
            }
            report.failures.push(DownloadFailure {
                task: task.clone(),
                error,
            });
            continue;
        }

        let dest = task.destination(root);
        if is_present(&dest) {
            log::trace!("Already present, skipping: {:?}", dest);
            sink.emit(LauncherEvent::DownloadFinished {
                url: task.url.clone(),
                path: dest.clone(),
                cached: true,
            });
            report.cached.push(dest);
            continue;
        }

        match transport.fetch(&task.url, FetchMode::Disk(&dest)).await {
            Ok(_) => {
                sink.emit(LauncherEvent::DownloadFinished {
                    url: task.url.clone(),
                    path: dest.clone(),
                    cached: false,
                });
                report.fetched.push(dest);
            }
            Err(error) => {
                log::warn!("Failed to download {}: {}", task.url, error);
                sink.emit(LauncherEvent::DownloadFailed {
                    url: task.url.clone(),
                    reason: error.to_string(),
                });
                if policy == FailurePolicy::AbortOnFirstFailure {
                    return Err(error);
                }
                report.failures.push(DownloadFailure {
                    task: task.clone(),
                    error,
                });
            }
        }
    }

    log::info!(
        "Downloads done: {} fetched, {} cached, {} failed",
        report.fetched.len(),
        report.cached.len(),
        report.failures.len()
    );
    Ok(report)
}

/// Fetch and decode a JSON document.
///
/// With `cache` set, a present file at that path is trusted and read instead of
/// hitting the network, and a fresh fetch is written there.
pub async fn fetch_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    url: &str,
    cache: Option<&Path>,
    what: &str,
) -> Result<T> {
    if let Some(path) = cache.filter(|p| is_present(p)) {
        log::debug!("Using cached {} at {:?}", what, path);
        let bytes = tokio::fs::read(path).await.fs_context(path)?;
        return serde_json::from_slice(&bytes).map_err(|e| LauncherError::parse(what, e));
    }

    let bytes = transport.fetch(url, FetchMode::Memory).await?.into_bytes(url)?;
    let value = serde_json::from_slice(&bytes).map_err(|e| LauncherError::parse(what, e))?;

    // Cache only what decoded.
    if let Some(path) = cache {
        ensure_parent(path)?;
        let tmp_path = part_path(path);
        tokio::fs::write(&tmp_path, &bytes).await.fs_context(&tmp_path)?;
        promote_part(&tmp_path, path)?;
        log::debug!("Cached {} at {:?}", what, path);
    }
    Ok(value)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::game::installer::core::transport::FetchOutput;
    use futures::future::BoxFuture;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory transport that counts requests per URL.
    #[derive(Default)]
    pub struct MockTransport {
        pub bodies: HashMap<String, Vec<u8>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.bodies.insert(url.to_string(), body.into());
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Transport for MockTransport {
        fn fetch<'a>(
            &'a self,
            url: &'a str,
            mode: FetchMode<'a>,
        ) -> BoxFuture<'a, Result<FetchOutput>> {
            Box::pin(async move {
                self.requests.lock().unwrap().push(url.to_string());
                let body = self
                    .bodies
                    .get(url)
                    .cloned()
                    .ok_or_else(|| LauncherError::network(url, "HTTP 404 Not Found"))?;
                let mut out = FetchOutput::default();
                match mode {
                    FetchMode::Memory => out.bytes = Some(body),
                    FetchMode::Disk(p) | FetchMode::MemoryAndDisk(p) => {
                        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
                        std::fs::write(p, &body).unwrap();
                        out.written = Some(p.to_path_buf());
                        if matches!(mode, FetchMode::MemoryAndDisk(_)) {
                            out.bytes = Some(body);
                        }
                    }
                }
                Ok(out)
            })
        }
    }
}
