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

//! Parallel HTTP range downloader.
//!
//! A resource is probed for its size, split into contiguous byte ranges,
//! fetched with one task per range and concatenated back in order. Every
//! temporary file is tracked by a [`CleanupSet`] owned by the caller.

mod chunk_downloader;
mod chunk_merger;
mod cleanup;
mod config;
mod downloader;
mod error;
mod parallel_manager;
mod planner;
mod probe;
mod progress;
mod single_downloader;
mod source;
mod types;

pub use chunk_merger::ChunkMerger;
pub use cleanup::CleanupSet;
pub use config::{ChunkCount, DEFAULT_USER_AGENT, DownloaderConfig};
pub use downloader::Downloader;
pub use error::DownloadError;
pub use planner::{calculate_chunk_boundaries, chunk_temp_path, plan_chunks};
pub use probe::ContentProbe;
pub use progress::{ProgressLog, ProgressSnapshot};
pub use source::{HttpSource, RangeSource};
pub use types::{ByteRange, ChunkResult, ChunkSpec, DownloadOutcome, DownloadTarget, Strategy};
