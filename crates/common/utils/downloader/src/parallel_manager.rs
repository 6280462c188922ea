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

use std::{collections::BTreeMap, sync::Arc};

use tokio::task::JoinSet;
use tracing::error;

use crate::{
    chunk_downloader::ChunkDownloader,
    progress::ProgressLog,
    source::RangeSource,
    types::{ChunkResult, ChunkSpec},
};

/// Runs every chunk of a download concurrently, one task per chunk
pub struct ParallelDownloadManager {
    source: Arc<dyn RangeSource>,
}

impl ParallelDownloadManager {
    pub const fn new(source: Arc<dyn RangeSource>) -> Self { Self { source } }

    /// Spawn all chunks at once and wait for every one of them.
    ///
    /// A failing chunk does not cancel its siblings. The returned results
    /// follow the order of `chunks`, exactly one entry per chunk.
    pub async fn download_all(&self, url: &str, label: &str, chunks: &[ChunkSpec]) -> Vec<ChunkResult> {
        let url: Arc<str> = Arc::from(url);
        let progress = Arc::new(ProgressLog::new(label, chunks.len()));

        let mut tasks = self.spawn_workers(&url, &progress, chunks);
        let mut results = BTreeMap::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    results.insert(result.id, result);
                }
                Err(e) => {
                    error!(error = %e, "chunk task did not complete");
                }
            }
        }

        // Tasks that panicked never produced a result
        chunks
            .iter()
            .map(|chunk| {
                results.remove(&chunk.id).unwrap_or_else(|| {
                    ChunkResult::failed(chunk.id, "task panicked or was cancelled")
                })
            })
            .collect()
    }

    fn spawn_workers(
        &self,
        url: &Arc<str>,
        progress: &Arc<ProgressLog>,
        chunks: &[ChunkSpec],
    ) -> JoinSet<ChunkResult> {
        let mut tasks = JoinSet::new();
        for chunk in chunks.iter().cloned() {
            let downloader = ChunkDownloader::new(
                Arc::clone(&self.source),
                Arc::clone(url),
                Arc::clone(progress),
            );
            tasks.spawn(async move { downloader.download(&chunk).await });
        }
        tasks
    }
}
