// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{path::Path, sync::Arc};

use jiff::Timestamp;
use tracing::{error, info, warn};

use crate::{
    chunk_merger::ChunkMerger,
    cleanup::CleanupSet,
    config::{ChunkCount, DownloaderConfig},
    error::DownloadError,
    parallel_manager::ParallelDownloadManager,
    planner::plan_chunks,
    probe::ContentProbe,
    single_downloader::SingleThreadDownloader,
    source::{HttpSource, RangeSource},
    types::{ChunkResult, DownloadOutcome, Strategy},
};

/// Parallel range downloader.
///
/// Components:
/// - `ContentProbe`: asks the server for the resource size
/// - `plan_chunks`: splits the size into contiguous ranges
/// - `ParallelDownloadManager`: fetches every range concurrently
/// - `ChunkMerger`: concatenates the ranges in order
/// - `SingleThreadDownloader`: fallback when the size is unknown
///
/// Chunk failures are reported through [`DownloadOutcome`], never as `Err`.
/// The output file only exists if every chunk arrived.
pub struct Downloader {
    config:   DownloaderConfig,
    probe:    ContentProbe,
    single:   SingleThreadDownloader,
    parallel: ParallelDownloadManager,
}

impl Downloader {
    /// Create a downloader that talks HTTP through `reqwest`
    pub fn new(config: DownloaderConfig) -> Result<Self, DownloadError> {
        let source = Arc::new(HttpSource::new(&config)?);
        Ok(Self::with_source(config, source))
    }

    /// Create a downloader over an arbitrary transport
    #[must_use]
    pub fn with_source(config: DownloaderConfig, source: Arc<dyn RangeSource>) -> Self {
        Self {
            config,
            probe: ContentProbe::new(Arc::clone(&source)),
            single: SingleThreadDownloader::new(Arc::clone(&source)),
            parallel: ParallelDownloadManager::new(source),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &DownloaderConfig { &self.config }

    /// Download with the configured chunk count
    pub async fn download(
        &self,
        url: &str,
        output_path: &Path,
        cleanup: &CleanupSet,
    ) -> DownloadOutcome {
        self.download_ranged(url, output_path, self.config.chunk_count, cleanup)
            .await
    }

    /// Download `url` into `output_path` using up to `chunk_count` concurrent
    /// range requests.
    ///
    /// Every chunk temp file is registered with `cleanup` before any request
    /// is sent. On failure the chunk files are left for `cleanup`.
    pub async fn download_ranged(
        &self,
        url: &str,
        output_path: &Path,
        chunk_count: ChunkCount,
        cleanup: &CleanupSet,
    ) -> DownloadOutcome {
        let started_at = Timestamp::now();
        let label = output_path
            .file_name()
            .map_or_else(|| url.to_string(), |n| n.to_string_lossy().into_owned());

        let target = self.probe.probe(url).await;
        if !target.is_size_known() {
            warn!(url, "size unknown, downloading as a single stream");
            return self.download_single(url, output_path, cleanup, started_at).await;
        }

        let chunks = plan_chunks(&target, output_path, chunk_count);
        let strategy = Strategy::Ranged {
            chunks: chunks.len(),
        };
        info!(
            url,
            size = target.total_size,
            chunks = chunks.len(),
            "starting ranged download"
        );

        for chunk in &chunks {
            cleanup.register(&chunk.temp_path);
        }

        let results = self.parallel.download_all(url, &label, &chunks).await;
        let failed: Vec<ChunkResult> = results.into_iter().filter(|r| !r.is_success()).collect();

        if !failed.is_empty() {
            error!(
                url,
                failed = failed.len(),
                total = chunks.len(),
                "download incomplete, not merging"
            );
            return DownloadOutcome::failed(strategy, failed, started_at);
        }

        match ChunkMerger::merge(&chunks, output_path).await {
            Ok(bytes) => {
                let outcome =
                    DownloadOutcome::completed(output_path.to_path_buf(), strategy, bytes, started_at);
                info!(
                    output = %output_path.display(),
                    bytes,
                    duration = %outcome.duration,
                    "download complete"
                );
                outcome
            }
            Err(e) => {
                error!(output = %output_path.display(), error = %e, "merge failed");
                DownloadOutcome::aborted(strategy, e, started_at)
            }
        }
    }

    async fn download_single(
        &self,
        url: &str,
        output_path: &Path,
        cleanup: &CleanupSet,
        started_at: Timestamp,
    ) -> DownloadOutcome {
        match self.single.download(url, output_path, cleanup).await {
            Ok(bytes) => {
                info!(output = %output_path.display(), bytes, "download complete");
                DownloadOutcome::completed(
                    output_path.to_path_buf(),
                    Strategy::SingleStream,
                    bytes,
                    started_at,
                )
            }
            Err(e) => {
                error!(url, error = %e, "single stream download failed");
                DownloadOutcome::aborted(Strategy::SingleStream, e, started_at)
            }
        }
    }
}
