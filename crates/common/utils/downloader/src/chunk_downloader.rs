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

use std::sync::Arc;

use snafu::ensure;
use tracing::debug;

use crate::{
    error::{DownloadError, LengthMismatchSnafu},
    progress::ProgressLog,
    source::RangeSource,
    types::{ChunkResult, ChunkSpec},
};

/// Fetches one planned chunk into its temp file
pub struct ChunkDownloader {
    source:   Arc<dyn RangeSource>,
    url:      Arc<str>,
    progress: Arc<ProgressLog>,
}

impl ChunkDownloader {
    pub fn new(source: Arc<dyn RangeSource>, url: Arc<str>, progress: Arc<ProgressLog>) -> Self {
        Self {
            source,
            url,
            progress,
        }
    }

    /// Download `chunk` and report it to the progress log.
    ///
    /// Failures are captured in the returned [`ChunkResult`]; whatever was
    /// written to the temp file stays there.
    pub async fn download(&self, chunk: &ChunkSpec) -> ChunkResult {
        let result = match self.try_download(chunk).await {
            Ok(bytes) => ChunkResult::succeeded(chunk.id, bytes),
            Err(e) => ChunkResult::failed(chunk.id, e),
        };
        self.progress.chunk_finished(&result).await;
        result
    }

    async fn try_download(&self, chunk: &ChunkSpec) -> Result<u64, DownloadError> {
        debug!(
            chunk = chunk.id,
            start = chunk.start,
            end = chunk.end,
            "requesting chunk"
        );

        let written = self
            .source
            .fetch_to_file(&self.url, Some(chunk.range()), &chunk.temp_path)
            .await?;

        ensure!(
            written == chunk.len(),
            LengthMismatchSnafu {
                expected: chunk.len(),
                actual:   written,
            }
        );

        Ok(written)
    }
}
