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

use std::path::{Path, PathBuf};

use snafu::ResultExt;
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter},
};
use tracing::{debug, warn};

use crate::{
    error::{DownloadError, FileReadSnafu, FileWriteSnafu, OutputOpenSnafu},
    types::ChunkSpec,
};

const MERGE_BUFFER_SIZE: usize = 512 * 1024;

/// Concatenates chunk files into the final output
pub struct ChunkMerger;

impl ChunkMerger {
    /// Merge `chunks` into `output_path` in ascending id order.
    ///
    /// Returns the number of bytes written.
    pub async fn merge(chunks: &[ChunkSpec], output_path: &Path) -> Result<u64, DownloadError> {
        let mut ordered: Vec<&ChunkSpec> = chunks.iter().collect();
        ordered.sort_by_key(|c| c.id);
        let paths: Vec<PathBuf> = ordered.into_iter().map(|c| c.temp_path.clone()).collect();

        Self::merge_paths(&paths, output_path).await
    }

    /// Append each file of `paths` to `output_path` in the order given.
    ///
    /// The chunk files are removed only after the output has been synced. On
    /// error the partial output is removed and the chunk files are left in
    /// place.
    pub async fn merge_paths(paths: &[PathBuf], output_path: &Path) -> Result<u64, DownloadError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context(OutputOpenSnafu { path: parent })?;
        }

        let output_file = File::create(output_path)
            .await
            .context(OutputOpenSnafu { path: output_path })?;

        let total_size = match Self::append_all(paths, output_path, output_file).await {
            Ok(n) => n,
            Err(e) => {
                if let Err(rm) = fs::remove_file(output_path).await {
                    warn!(
                        output = %output_path.display(),
                        error = %rm,
                        "failed to remove partial output"
                    );
                }
                return Err(e);
            }
        };

        for path in paths {
            if let Err(e) = fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "failed to remove merged chunk");
            }
        }

        debug!(
            output = %output_path.display(),
            chunks = paths.len(),
            bytes = total_size,
            "chunks merged"
        );

        Ok(total_size)
    }

    async fn append_all(
        paths: &[PathBuf],
        output_path: &Path,
        output_file: File,
    ) -> Result<u64, DownloadError> {
        let mut writer = BufWriter::with_capacity(MERGE_BUFFER_SIZE, output_file);
        let mut buffer = vec![0u8; MERGE_BUFFER_SIZE];
        let mut total_size = 0u64;

        for path in paths {
            let chunk_file = File::open(path).await.context(FileReadSnafu { path })?;
            let mut reader = BufReader::with_capacity(MERGE_BUFFER_SIZE, chunk_file);

            loop {
                let n = reader
                    .read(&mut buffer)
                    .await
                    .context(FileReadSnafu { path })?;
                if n == 0 {
                    break;
                }
                writer
                    .write_all(&buffer[..n])
                    .await
                    .context(FileWriteSnafu { path: output_path })?;
                total_size += n as u64;
            }
        }

        writer
            .flush()
            .await
            .context(FileWriteSnafu { path: output_path })?;
        writer
            .get_mut()
            .sync_all()
            .await
            .context(FileWriteSnafu { path: output_path })?;

        Ok(total_size)
    }
}
