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

use tracing::{debug, warn};

use crate::{source::RangeSource, types::DownloadTarget};

/// Discovers the size of a resource before it is split into chunks
pub struct ContentProbe {
    source: Arc<dyn RangeSource>,
}

impl ContentProbe {
    pub fn new(source: Arc<dyn RangeSource>) -> Self { Self { source } }

    /// Probe `url` with a header-only request.
    ///
    /// Never fails: a missing size or a failed request yields a target of
    /// size 0, which callers treat as "unknown".
    pub async fn probe(&self, url: &str) -> DownloadTarget {
        let total_size = match self.source.content_length(url).await {
            Ok(Some(size)) => {
                debug!(url, size, "content length probed");
                size
            }
            Ok(None) => {
                warn!(url, "server did not report a content length");
                0
            }
            Err(e) => {
                warn!(url, error = %e, "content length probe failed");
                0
            }
        };

        DownloadTarget {
            url: url.to_string(),
            total_size,
        }
    }
}
