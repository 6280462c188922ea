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

use std::{fmt, path::PathBuf};

use jiff::{Span, Timestamp};

/// A resource and its advertised size, fixed for one download attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// URL to download from
    pub url:        String,
    /// Total size in bytes, 0 when the server did not report one
    pub total_size: u64,
}

impl DownloadTarget {
    #[must_use]
    pub const fn is_size_known(&self) -> bool { self.total_size > 0 }
}

/// Inclusive byte interval sent as `Range: bytes=start-end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end:   u64,
}

impl ByteRange {
    #[must_use]
    pub fn header_value(self) -> String { format!("bytes={}-{}", self.start, self.end) }
}

/// One planned sub-range of a download and the file it is written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpec {
    /// Index of this chunk (0-based, dense)
    pub id:        usize,
    /// Start byte position (inclusive)
    pub start:     u64,
    /// End byte position (inclusive)
    pub end:       u64,
    /// Path to the temporary file for this chunk
    pub temp_path: PathBuf,
}

impl ChunkSpec {
    /// Number of bytes covered by this chunk
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> u64 { self.end - self.start + 1 }

    #[must_use]
    pub const fn range(&self) -> ByteRange {
        ByteRange {
            start: self.start,
            end:   self.end,
        }
    }
}

/// Result of fetching one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub id:    usize,
    /// Bytes written to the chunk file
    pub bytes: u64,
    /// Transport or validation failure, `None` on success
    pub error: Option<String>,
}

impl ChunkResult {
    #[must_use]
    pub const fn succeeded(id: usize, bytes: u64) -> Self {
        Self {
            id,
            bytes,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(id: usize, error: impl fmt::Display) -> Self {
        Self {
            id,
            bytes: 0,
            error: Some(error.to_string()),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool { self.error.is_none() }
}

/// How a download was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Split into concurrent range requests
    Ranged { chunks: usize },
    /// One plain GET, used when the size is unknown
    SingleStream,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ranged { chunks } => write!(f, "ranged ({chunks} chunks)"),
            Self::SingleStream => f.write_str("single stream"),
        }
    }
}

/// Terminal value of a download attempt
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub success:       bool,
    /// Where the file was written, set only on success
    pub output_path:   Option<PathBuf>,
    pub strategy:      Strategy,
    /// Size of the written file in bytes
    pub bytes:         u64,
    /// Results of the chunks that failed, empty on success
    pub failed_chunks: Vec<ChunkResult>,
    /// Failure not tied to one chunk, such as a merge or single-stream error
    pub error:         Option<String>,
    /// Total duration of the download operation
    pub duration:      Span,
}

impl DownloadOutcome {
    pub(crate) fn completed(
        output_path: PathBuf,
        strategy: Strategy,
        bytes: u64,
        started_at: Timestamp,
    ) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            strategy,
            bytes,
            failed_chunks: Vec::new(),
            error: None,
            duration: started_at.until(Timestamp::now()).unwrap_or_default(),
        }
    }

    pub(crate) fn failed(
        strategy: Strategy,
        failed_chunks: Vec<ChunkResult>,
        started_at: Timestamp,
    ) -> Self {
        Self {
            success: false,
            output_path: None,
            strategy,
            bytes: 0,
            failed_chunks,
            error: None,
            duration: started_at.until(Timestamp::now()).unwrap_or_default(),
        }
    }

    pub(crate) fn aborted(
        strategy: Strategy,
        error: impl fmt::Display,
        started_at: Timestamp,
    ) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::failed(strategy, Vec::new(), started_at)
        }
    }

    /// Why the download failed, `None` on success
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        if self.success {
            return None;
        }
        Some(match &self.error {
            Some(e) => e.clone(),
            None => format!("{} chunks failed", self.failed_chunks.len()),
        })
    }
}
