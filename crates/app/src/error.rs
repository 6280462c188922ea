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

use std::path::PathBuf;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    #[snafu(display("No video id found in '{url}', expected a '?v=' or '&v=' parameter"))]
    InvalidUrl { url: String },

    #[snafu(display("Failed to run {}: {source}", program.display()))]
    ToolSpawn {
        program: PathBuf,
        source:  std::io::Error,
    },

    #[snafu(display("Stream resolution failed ({status}): {stderr}"))]
    Resolve { status: String, stderr: String },

    #[snafu(display("No stream URLs found for video {id}"))]
    NoStreams { id: String },

    #[snafu(display("Cannot create output directory {}: {source}", path.display()))]
    OutputDir {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Video download failed for {id}: {reason}"))]
    VideoDownload { id: String, reason: String },

    #[snafu(display("Muxing failed ({status})"))]
    Mux { status: String },

    #[snafu(display("Failed to set up the downloader: {source}"))]
    ClientBuild { source: downloader::DownloadError },

    #[snafu(display("Interrupted"))]
    Cancelled,
}
