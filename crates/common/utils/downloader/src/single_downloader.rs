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

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use snafu::ResultExt;
use tokio::fs;

use crate::{
    cleanup::CleanupSet,
    error::{DownloadError, FileWriteSnafu},
    source::RangeSource,
};

/// Whole-body download, used when the size of the resource is unknown
pub struct SingleThreadDownloader {
    source: Arc<dyn RangeSource>,
}

impl SingleThreadDownloader {
    pub const fn new(source: Arc<dyn RangeSource>) -> Self { Self { source } }

    /// Stream the whole body of `url` into `output_path` and return its size.
    ///
    /// The body is written to `<output>.download` first and renamed into
    /// place once complete, so a failed transfer never leaves a truncated
    /// output.
    pub async fn download(
        &self,
        url: &str,
        output_path: &Path,
        cleanup: &CleanupSet,
    ) -> Result<u64, DownloadError> {
        let temp_path = download_temp_path(output_path);
        cleanup.register(&temp_path);

        let size = self.source.fetch_to_file(url, None, &temp_path).await?;

        fs::rename(&temp_path, output_path)
            .await
            .context(FileWriteSnafu { path: output_path })?;

        Ok(size)
    }
}

fn download_temp_path(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_owned();
    name.push(".download");
    PathBuf::from(name)
}
