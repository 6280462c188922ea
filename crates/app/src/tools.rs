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

//! External programs the pipeline drives: a stream resolver and a muxer.
//!
//! Both run with explicit argument vectors, never through a shell.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Output, Stdio},
};

use async_trait::async_trait;
use snafu::{OptionExt, ResultExt, ensure};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{
    error::{AppError, MuxSnafu, NoStreamsSnafu, ResolveSnafu, ToolSpawnSnafu},
    identifier::VideoId,
};

/// Direct media URLs for one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStreams {
    pub video: String,
    /// Separate audio stream, absent when the video URL carries both
    pub audio: Option<String>,
}

impl MediaStreams {
    /// First URL is the video, the second (if any) the audio.
    pub fn from_urls(id: &VideoId, urls: Vec<String>) -> Result<Self, AppError> {
        let mut urls = urls.into_iter();
        let video = urls.next().context(NoStreamsSnafu {
            id: id.to_string(),
        })?;
        Ok(Self {
            video,
            audio: urls.next(),
        })
    }
}

/// Turns a video id into direct stream URLs
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, id: &VideoId) -> Result<MediaStreams, AppError>;
}

/// Combines a video file and an optional audio file into the final container
#[async_trait]
pub trait Muxer: Send + Sync {
    async fn mux(&self, video: &Path, audio: Option<&Path>, output: &Path) -> Result<(), AppError>;
}

/// [`Resolver`] backed by `yt-dlp --print urls`
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: PathBuf,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Best video (VP9 preferred, then resolution, then bitrate) plus best
    /// audio, printed as URLs instead of downloaded
    #[must_use]
    pub fn args(id: &VideoId) -> Vec<String> {
        vec![
            "-f".to_string(),
            "bestvideo*+bestaudio".to_string(),
            "-S".to_string(),
            "vcodec:vp9,res,br".to_string(),
            "--print".to_string(),
            "urls".to_string(),
            id.watch_url(),
        ]
    }
}

/// Keep the lines of resolver output that are URLs
#[must_use]
pub fn parse_stream_urls(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| line.starts_with("http"))
        .map(str::to_string)
        .collect()
}

/// Streams from a finished resolver run.
///
/// A non-zero exit only fails resolution when no URL was printed.
pub fn streams_from_output(id: &VideoId, output: &Output) -> Result<MediaStreams, AppError> {
    let urls = parse_stream_urls(&String::from_utf8_lossy(&output.stdout));
    debug!(%id, count = urls.len(), "stream URLs resolved");

    if !output.status.success() {
        ensure!(
            !urls.is_empty(),
            ResolveSnafu {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
        );
        warn!(%id, status = %output.status, "resolver exited unsuccessfully, using its URLs");
    }

    MediaStreams::from_urls(id, urls)
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, id: &VideoId) -> Result<MediaStreams, AppError> {
        info!(%id, "resolving stream URLs");

        let output = Command::new(&self.program)
            .args(Self::args(id))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .context(ToolSpawnSnafu {
                program: &self.program,
            })?;

        streams_from_output(id, &output)
    }
}

/// [`Muxer`] backed by `ffmpeg`, re-encoding to H.264 and AAC
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    program: PathBuf,
}

impl FfmpegMuxer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn args(video: &Path, audio: Option<&Path>, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-i".into(), video.into()];
        if let Some(audio) = audio {
            args.extend([OsString::from("-i"), audio.into()]);
        }
        args.extend(
            ["-c:v", "libx264", "-preset", "slow", "-crf", "18"]
                .into_iter()
                .map(OsString::from),
        );
        if audio.is_some() {
            args.extend(
                ["-c:a", "aac", "-b:a", "192k"]
                    .into_iter()
                    .map(OsString::from),
            );
        }
        args.extend([OsString::from(output), OsString::from("-y")]);
        args
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: Option<&Path>, output: &Path) -> Result<(), AppError> {
        info!(
            output = %output.display(),
            with_audio = audio.is_some(),
            "muxing"
        );

        let status = Command::new(&self.program)
            .args(Self::args(video, audio, output))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .context(ToolSpawnSnafu {
                program: &self.program,
            })?;

        ensure!(
            status.success(),
            MuxSnafu {
                status: status.to_string(),
            }
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::extract_video_id;

    fn id() -> VideoId { extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap() }

    #[test]
    fn test_resolver_args() {
        assert_eq!(
            YtDlpResolver::args(&id()),
            vec![
                "-f",
                "bestvideo*+bestaudio",
                "-S",
                "vcodec:vp9,res,br",
                "--print",
                "urls",
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            ]
        );
    }

    #[test]
    fn test_parse_stream_urls_keeps_only_urls() {
        let stdout = "WARNING: something\r\nhttps://v.example/video?sig=1\r\n\nhttps://a.example/audio\nnot-a-url\n";
        assert_eq!(
            parse_stream_urls(stdout),
            vec!["https://v.example/video?sig=1", "https://a.example/audio"]
        );
    }

    #[test]
    fn test_media_streams_from_urls() {
        let streams = MediaStreams::from_urls(&id(), vec!["http://v".into(), "http://a".into()]).unwrap();
        assert_eq!(streams.video, "http://v");
        assert_eq!(streams.audio.as_deref(), Some("http://a"));

        let streams = MediaStreams::from_urls(&id(), vec!["http://v".into()]).unwrap();
        assert_eq!(streams.audio, None);

        let err = MediaStreams::from_urls(&id(), Vec::new()).unwrap_err();
        assert!(matches!(err, AppError::NoStreams { .. }));
    }

    #[test]
    fn test_muxer_args_with_audio() {
        let args = FfmpegMuxer::args(
            Path::new("x_video.tmp"),
            Some(Path::new("x_audio.tmp")),
            Path::new("x.mp4"),
        );
        let args: Vec<_> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            vec![
                "-i", "x_video.tmp", "-i", "x_audio.tmp", "-c:v", "libx264", "-preset", "slow",
                "-crf", "18", "-c:a", "aac", "-b:a", "192k", "x.mp4", "-y",
            ]
        );
    }

    #[test]
    fn test_muxer_args_video_only() {
        let args = FfmpegMuxer::args(Path::new("x_video.tmp"), None, Path::new("x.mp4"));
        let args: Vec<_> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            vec!["-i", "x_video.tmp", "-c:v", "libx264", "-preset", "slow", "-crf", "18", "x.mp4", "-y"]
        );
    }

    #[cfg(unix)]
    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        use std::os::unix::process::ExitStatusExt;

        Output {
            status: std::process::ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_exit_with_urls_still_resolves() {
        let out = output(1, "https://v.example/video\nhttps://a.example/audio\n", "ERROR: partial");
        let streams = streams_from_output(&id(), &out).unwrap();
        assert_eq!(streams.video, "https://v.example/video");
        assert_eq!(streams.audio.as_deref(), Some("https://a.example/audio"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_exit_without_urls_is_a_resolve_error() {
        let out = output(1, "", "ERROR: Video unavailable\n");
        let err = streams_from_output(&id(), &out).unwrap_err();
        let AppError::Resolve { stderr, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(stderr, "ERROR: Video unavailable");
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_exit_without_urls_is_no_streams() {
        let err = streams_from_output(&id(), &output(0, "nothing here\n", "")).unwrap_err();
        assert!(matches!(err, AppError::NoStreams { .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp");
        let err = resolver.resolve(&id()).await.unwrap_err();
        assert!(matches!(err, AppError::ToolSpawn { .. }));
    }
}
