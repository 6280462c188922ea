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

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{StatusCode, header, redirect};
use snafu::{ResultExt, ensure};
use tokio::{
    fs::{self, File},
    io::{AsyncWriteExt, BufWriter},
};
use tracing::warn;

use crate::{
    config::DownloaderConfig,
    error::{
        ClientBuildSnafu, DownloadError, FileWriteSnafu, HttpSnafu, NetworkSnafu,
        RangeNotSupportedSnafu,
    },
    types::ByteRange,
};

const WRITE_BUFFER_SIZE: usize = 512 * 1024;

/// The transport used by the downloader.
///
/// Implemented over HTTP by [`HttpSource`]. Tests substitute their own
/// implementation to simulate partial failures.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Total size advertised for `url`, `None` when the server does not say
    async fn content_length(&self, url: &str) -> Result<Option<u64>, DownloadError>;

    /// Stream `range` of `url` (or the whole body when `range` is `None`)
    /// into `dest`, truncating it first. Returns the number of bytes
    /// written. A partially written `dest` is left in place on failure.
    async fn fetch_to_file(
        &self,
        url: &str,
        range: Option<ByteRange>,
        dest: &Path,
    ) -> Result<u64, DownloadError>;
}

/// [`RangeSource`] backed by a shared `reqwest` client
pub struct HttpSource {
    client:                reqwest::Client,
    probe_timeout:         Duration,
    chunk_timeout:         Duration,
    single_stream_timeout: Duration,
}

impl HttpSource {
    pub fn new(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .redirect(redirect::Policy::limited(config.max_redirects));

        if config.accept_invalid_certs {
            warn!("TLS certificate and hostname verification is disabled");
            builder = builder
                .tls_danger_accept_invalid_certs(true)
                .tls_danger_accept_invalid_hostnames(true);
        }

        let client = builder.build().context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            probe_timeout: config.probe_timeout.unsigned_abs(),
            chunk_timeout: config.chunk_timeout.unsigned_abs(),
            single_stream_timeout: config.single_stream_timeout.unsigned_abs(),
        })
    }
}

#[async_trait]
impl RangeSource for HttpSource {
    async fn content_length(&self, url: &str) -> Result<Option<u64>, DownloadError> {
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .context(NetworkSnafu)?;

        ensure!(
            response.status().is_success(),
            HttpSnafu {
                status: response.status().as_u16(),
                url,
            }
        );

        let size = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        Ok(size)
    }

    async fn fetch_to_file(
        &self,
        url: &str,
        range: Option<ByteRange>,
        dest: &Path,
    ) -> Result<u64, DownloadError> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context(FileWriteSnafu { path: parent })?;
        }

        // Truncate before the request goes out so a stale file never survives
        let file = File::create(dest)
            .await
            .context(FileWriteSnafu { path: dest })?;

        let request = match range {
            Some(range) => self
                .client
                .get(url)
                .header(header::RANGE, range.header_value())
                .timeout(self.chunk_timeout),
            None => self.client.get(url).timeout(self.single_stream_timeout),
        };

        let response = request.send().await.context(NetworkSnafu)?;

        let status = response.status();
        ensure!(
            status.is_success(),
            HttpSnafu {
                status: status.as_u16(),
                url,
            }
        );

        // A 200 to a range that does not start at 0 means the server sent
        // the whole body, which would land at the wrong offset after merge.
        if let Some(range) = range {
            ensure!(
                status == StatusCode::PARTIAL_CONTENT || range.start == 0,
                RangeNotSupportedSnafu {
                    start: range.start,
                    end:   range.end,
                }
            );
        }

        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk_result) = stream.next().await {
            let data = chunk_result.context(NetworkSnafu)?;
            writer
                .write_all(&data)
                .await
                .context(FileWriteSnafu { path: dest })?;
            written += data.len() as u64;
        }

        writer.flush().await.context(FileWriteSnafu { path: dest })?;
        writer
            .get_mut()
            .sync_all()
            .await
            .context(FileWriteSnafu { path: dest })?;

        Ok(written)
    }
}
