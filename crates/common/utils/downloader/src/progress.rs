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

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::types::ChunkResult;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub failed:    usize,
    pub bytes:     u64,
}

/// Progress announcer shared by every fetcher of one download.
///
/// Each chunk reports exactly once. Counting and logging happen under the
/// same lock so lines come out whole and with a consistent `k/N`.
#[derive(Debug)]
pub struct ProgressLog {
    label: String,
    total: usize,
    state: Mutex<ProgressSnapshot>,
}

impl ProgressLog {
    pub fn new(label: impl Into<String>, total: usize) -> Self {
        Self {
            label: label.into(),
            total,
            state: Mutex::new(ProgressSnapshot::default()),
        }
    }

    pub async fn chunk_finished(&self, result: &ChunkResult) {
        let mut state = self.state.lock().await;
        match &result.error {
            None => {
                state.completed += 1;
                state.bytes += result.bytes;
                info!(
                    download = %self.label,
                    chunk = result.id,
                    bytes = result.bytes,
                    "chunk {} finished ({}/{})",
                    result.id,
                    state.completed,
                    self.total
                );
            }
            Some(reason) => {
                state.failed += 1;
                error!(
                    download = %self.label,
                    chunk = result.id,
                    "chunk {} failed: {reason} ({}/{} completed)",
                    result.id,
                    state.completed,
                    self.total
                );
            }
        }
    }

    pub async fn snapshot(&self) -> ProgressSnapshot { *self.state.lock().await }

    #[must_use]
    pub const fn total(&self) -> usize { self.total }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_concurrent_reports_are_all_counted() {
        let log = Arc::new(ProgressLog::new("video", 16));

        let mut handles = Vec::new();
        for id in 0..16 {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                let result = if id % 4 == 0 {
                    ChunkResult::failed(id, "connection reset")
                } else {
                    ChunkResult::succeeded(id, 100)
                };
                log.chunk_finished(&result).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = log.snapshot().await;
        assert_eq!(snapshot.completed, 12);
        assert_eq!(snapshot.failed, 4);
        assert_eq!(snapshot.bytes, 1200);
        assert_eq!(log.total(), 16);
    }
}
