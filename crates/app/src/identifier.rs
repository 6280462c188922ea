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

use once_cell::sync::Lazy;
use regex::Regex;
use snafu::OptionExt;

use crate::error::{AppError, InvalidUrlSnafu};

/// Eleven-character video identifier taken from a watch URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::AsRef)]
#[as_ref(str)]
pub struct VideoId(String);

impl VideoId {
    /// Canonical watch page for this id
    #[must_use]
    pub fn watch_url(&self) -> String { format!("https://www.youtube.com/watch?v={}", self.0) }

    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

static VIDEO_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]v=([a-zA-Z0-9_-]{11})").expect("literal pattern compiles"));

/// Extract the video id from the `v` query parameter of `url`.
///
/// Only the first match is used. Anything after the eleventh character is
/// ignored.
pub fn extract_video_id(url: &str) -> Result<VideoId, AppError> {
    VIDEO_ID_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| VideoId(m.as_str().to_string()))
        .context(InvalidUrlSnafu { url })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_from_watch_url() {
        let id = extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
        assert_eq!(id.to_string(), "dQw4w9WgXcQ");
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_extracts_from_later_parameter() {
        let id = extract_video_id("https://www.youtube.com/watch?list=PL123&v=a-b_c1234XY&t=42").unwrap();
        let s: &str = id.as_ref();
        assert_eq!(s, "a-b_c1234XY");
    }

    #[test]
    fn test_longer_value_is_truncated_to_eleven() {
        let id = extract_video_id("https://example.com/?v=ABCDEFGHIJKLMNOP").unwrap();
        assert_eq!(id.as_str(), "ABCDEFGHIJK");
    }

    #[test]
    fn test_rejects_urls_without_id() {
        for url in [
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/watch?vid=dQw4w9WgXcQ",
            "not a url",
            "",
        ] {
            let err = extract_video_id(url).unwrap_err();
            assert!(matches!(err, AppError::InvalidUrl { .. }), "{url}");
        }
    }
}
