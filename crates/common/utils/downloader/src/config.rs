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

use std::fmt;

use jiff::SignedDuration;
use smart_default::SmartDefault;

/// User-Agent sent with every request unless overridden
pub const DEFAULT_USER_AGENT: &str = concat!(
    "rangefetch/",
    env!("CARGO_PKG_VERSION"),
    " (parallel range downloader)"
);

/// Number of concurrent range requests used for a single download.
///
/// The accepted range is permissive on purpose: anything outside
/// `MIN..=MAX`, including values that do not parse, silently becomes
/// [`ChunkCount::DEFAULT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCount(usize);

impl ChunkCount {
    pub const DEFAULT: Self = Self(8);
    pub const MAX: usize = 32;
    pub const MIN: usize = 1;

    /// Clamp a caller-supplied count to the accepted range
    #[must_use]
    pub fn new(value: i64) -> Self {
        usize::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map_or(Self::DEFAULT, Self)
    }

    /// Parse a raw argument, falling back to the default on anything
    /// that is not an integer in range
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self { raw.trim().parse::<i64>().map_or(Self::DEFAULT, Self::new) }

    #[must_use]
    pub const fn get(self) -> usize { self.0 }
}

impl Default for ChunkCount {
    fn default() -> Self { Self::DEFAULT }
}

impl fmt::Display for ChunkCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Configuration for the downloader
#[derive(Debug, Clone, SmartDefault)]
pub struct DownloaderConfig {
    /// Chunk count used by [`crate::Downloader::download`]
    pub chunk_count: ChunkCount,

    /// Timeout for the header-only size probe
    #[default(SignedDuration::from_secs(30))]
    pub probe_timeout: SignedDuration,

    /// Timeout for each ranged chunk request
    #[default(SignedDuration::from_secs(300))]
    pub chunk_timeout: SignedDuration,

    /// Timeout for the whole-body fallback when the size is unknown
    #[default(SignedDuration::from_secs(600))]
    pub single_stream_timeout: SignedDuration,

    /// User-Agent header
    #[default(DEFAULT_USER_AGENT.to_string())]
    pub user_agent: String,

    /// Maximum number of redirects followed per request
    #[default = 10]
    pub max_redirects: usize,

    /// Skip TLS certificate and hostname verification.
    ///
    /// This is a security trade-off for hosts with broken certificate
    /// chains. Any certificate for any host is accepted while it is set,
    /// so it stays off unless the user opts in.
    #[default = false]
    pub accept_invalid_certs: bool,
}
