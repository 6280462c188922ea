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

//! The download-and-mux pipeline behind the `rangefetch` binary.

mod error;
mod identifier;
mod tools;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use bon::Builder;
use downloader::{CleanupSet, Downloader, DownloaderConfig};
pub use error::AppError;
pub use identifier::{VideoId, extract_video_id};
use smart_default::SmartDefault;
use snafu::ResultExt;
pub use tools::{FfmpegMuxer, MediaStreams, Muxer, Resolver, YtDlpResolver, parse_stream_urls};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{CancelledSnafu, ClientBuildSnafu, OutputDirSnafu, VideoDownloadSnafu};

/// Configuration for the application
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct AppConfig {
    /// Where the intermediate and final files are written
    #[default(PathBuf::from("."))]
    pub output_dir: PathBuf,
    /// Leave intermediate files on disk
    #[default = false]
    pub keep_temp:  bool,
    pub downloader: DownloaderConfig,
    /// Stream resolver executable
    #[default(PathBuf::from("yt-dlp"))]
    pub yt_dlp:     PathBuf,
    /// Muxer executable
    #[default(PathBuf::from("ffmpeg"))]
    pub ffmpeg:     PathBuf,
}

impl AppConfig {
    /// Build the application with the real HTTP client and external tools
    pub fn open(self) -> Result<App, AppError> {
        let downloader = Downloader::new(self.downloader.clone()).context(ClientBuildSnafu)?;
        let resolver = Arc::new(YtDlpResolver::new(&self.yt_dlp));
        let muxer = Arc::new(FfmpegMuxer::new(&self.ffmpeg));
        Ok(App::with_parts(self, downloader, resolver, muxer))
    }
}

/// Files produced for one video
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutputPaths {
    video: PathBuf,
    audio: PathBuf,
    final_output: PathBuf,
}

impl OutputPaths {
    fn new(dir: &Path, id: &VideoId) -> Self {
        Self {
            video: dir.join(format!("{id}_video.tmp")),
            audio: dir.join(format!("{id}_audio.tmp")),
            final_output: dir.join(format!("{id}.mp4")),
        }
    }
}

/// Resolves, downloads and muxes one video per [`App::run`]
pub struct App {
    config:             AppConfig,
    downloader:         Downloader,
    resolver:           Arc<dyn Resolver>,
    muxer:              Arc<dyn Muxer>,
    cancellation_token: CancellationToken,
}

impl App {
    #[must_use]
    pub fn with_parts(
        config: AppConfig,
        downloader: Downloader,
        resolver: Arc<dyn Resolver>,
        muxer: Arc<dyn Muxer>,
    ) -> Self {
        Self {
            config,
            downloader,
            resolver,
            muxer,
            cancellation_token: CancellationToken::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig { &self.config }

    /// Token that aborts a running [`App::run`] when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken { self.cancellation_token.clone() }

    /// Produce `<id>.mp4` in the output directory for the video in `url`.
    ///
    /// Intermediate files are removed when this returns, whatever the
    /// outcome, unless `keep_temp` is set. Cancelling the token stops the
    /// run at its next await point with [`AppError::Cancelled`].
    pub async fn run(&self, url: &str) -> Result<PathBuf, AppError> {
        let cleanup = CleanupSet::new();
        if self.config.keep_temp {
            cleanup.disarm();
        }

        tokio::select! {
            biased;
            () = self.cancellation_token.cancelled() => {
                warn!("interrupted, removing temporary files");
                CancelledSnafu.fail()
            }
            result = self.run_with(url, &cleanup) => result,
        }
    }

    async fn run_with(&self, url: &str, cleanup: &CleanupSet) -> Result<PathBuf, AppError> {
        let id = extract_video_id(url)?;
        let streams = self.resolver.resolve(&id).await?;

        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .context(OutputDirSnafu {
                path: &self.config.output_dir,
            })?;
        let paths = OutputPaths::new(&self.config.output_dir, &id);

        info!(%id, "downloading video stream");
        cleanup.register(&paths.video);
        let video = self
            .downloader
            .download(&streams.video, &paths.video, cleanup)
            .await;
        if let Some(reason) = video.failure_reason() {
            return VideoDownloadSnafu {
                id: id.to_string(),
                reason,
            }
            .fail();
        }

        let has_audio = match &streams.audio {
            Some(audio_url) => {
                info!(%id, "downloading audio stream");
                cleanup.register(&paths.audio);
                let audio = self.downloader.download(audio_url, &paths.audio, cleanup).await;
                if !audio.success {
                    warn!(%id, "audio download failed, continuing without audio");
                }
                audio.success && paths.audio.exists()
            }
            None => {
                info!(%id, "no separate audio stream");
                false
            }
        };

        let audio = has_audio.then_some(paths.audio.as_path());
        self.muxer
            .mux(&paths.video, audio, &paths.final_output)
            .await?;

        if !self.config.keep_temp {
            cleanup.teardown();
        }

        info!(output = %paths.final_output.display(), "done");
        Ok(paths.final_output)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use async_trait::async_trait;
    use downloader::{ByteRange, DownloadError, RangeSource};

    use super::*;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
    const ID: &str = "dQw4w9WgXcQ";

    /// Serves fixed bodies per URL, 404 for anything else
    struct MemorySource(HashMap<String, Vec<u8>>);

    #[async_trait]
    impl RangeSource for MemorySource {
        async fn content_length(&self, url: &str) -> Result<Option<u64>, DownloadError> {
            Ok(self.0.get(url).map(|b| b.len() as u64))
        }

        async fn fetch_to_file(
            &self,
            url: &str,
            range: Option<ByteRange>,
            dest: &Path,
        ) -> Result<u64, DownloadError> {
            tokio::fs::write(dest, b"").await.unwrap();
            let Some(body) = self.0.get(url) else {
                return downloader_http_error(url);
            };
            let body = match range {
                Some(r) => &body[usize::try_from(r.start).unwrap()..=usize::try_from(r.end).unwrap()],
                None => &body[..],
            };
            tokio::fs::write(dest, body).await.unwrap();
            Ok(body.len() as u64)
        }
    }

    fn downloader_http_error(url: &str) -> Result<u64, DownloadError> {
        Err(DownloadError::Http {
            status: 404,
            url:    url.to_string(),
        })
    }

    struct StubResolver(Vec<String>);

    #[async_trait]
    impl Resolver for StubResolver {
        async fn resolve(&self, id: &VideoId) -> Result<MediaStreams, AppError> {
            MediaStreams::from_urls(id, self.0.clone())
        }
    }

    /// Records what it was asked to mux and the input contents at that time
    #[derive(Default)]
    struct StubMuxer {
        fail:  bool,
        calls: Mutex<Vec<(Vec<u8>, Option<Vec<u8>>, PathBuf)>>,
    }

    #[async_trait]
    impl Muxer for StubMuxer {
        async fn mux(&self, video: &Path, audio: Option<&Path>, output: &Path) -> Result<(), AppError> {
            let video = std::fs::read(video).unwrap();
            let audio = audio.map(|a| std::fs::read(a).unwrap());
            self.calls
                .lock()
                .unwrap()
                .push((video, audio, output.to_path_buf()));
            if self.fail {
                return crate::error::MuxSnafu {
                    status: "exit status: 1",
                }
                .fail();
            }
            std::fs::write(output, b"muxed").unwrap();
            Ok(())
        }
    }

    struct Harness {
        dir:   tempfile::TempDir,
        app:   App,
        muxer: Arc<StubMuxer>,
    }

    fn harness(urls: &[&str], fail_mux: bool, keep_temp: bool) -> Harness {
        rangefetch_common_telemetry::logging::init_default_ut_logging();

        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource(HashMap::from([
            ("http://cdn/video".to_string(), vec![1u8; 4096]),
            ("http://cdn/audio".to_string(), vec![2u8; 1000]),
        ]));
        let config = AppConfig::builder()
            .output_dir(dir.path().join("out"))
            .keep_temp(keep_temp)
            .downloader(DownloaderConfig::default())
            .yt_dlp(PathBuf::from("yt-dlp"))
            .ffmpeg(PathBuf::from("ffmpeg"))
            .build();
        let downloader = Downloader::with_source(config.downloader.clone(), Arc::new(source));
        let muxer = Arc::new(StubMuxer {
            fail: fail_mux,
            ..Default::default()
        });
        let resolver = Arc::new(StubResolver(urls.iter().map(ToString::to_string).collect()));
        let app = App::with_parts(config, downloader, resolver, muxer.clone());

        Harness { dir, app, muxer }
    }

    fn out_dir(h: &Harness) -> PathBuf { h.dir.path().join("out") }

    fn leftover_files(h: &Harness) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(out_dir(h))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_video_and_audio_are_muxed() {
        let h = harness(&["http://cdn/video", "http://cdn/audio"], false, false);

        let output = h.app.run(URL).await.unwrap();

        assert_eq!(output, out_dir(&h).join(format!("{ID}.mp4")));
        let calls = h.muxer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, vec![1u8; 4096]);
        assert_eq!(calls[0].1, Some(vec![2u8; 1000]));
        assert_eq!(leftover_files(&h), vec![format!("{ID}.mp4")]);
    }

    #[tokio::test]
    async fn test_video_only_stream() {
        let h = harness(&["http://cdn/video"], false, false);

        h.app.run(URL).await.unwrap();

        let calls = h.muxer.calls.lock().unwrap();
        assert_eq!(calls[0].1, None);
        assert_eq!(leftover_files(&h), vec![format!("{ID}.mp4")]);
    }

    #[tokio::test]
    async fn test_audio_failure_is_tolerated() {
        let h = harness(&["http://cdn/video", "http://cdn/missing-audio"], false, false);

        h.app.run(URL).await.unwrap();

        let calls = h.muxer.calls.lock().unwrap();
        assert_eq!(calls[0].1, None);
        assert_eq!(leftover_files(&h), vec![format!("{ID}.mp4")]);
    }

    #[tokio::test]
    async fn test_video_failure_stops_the_run() {
        let h = harness(&["http://cdn/missing-video", "http://cdn/audio"], false, false);

        let err = h.app.run(URL).await.unwrap_err();

        let AppError::VideoDownload { reason, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert!(reason.contains("HTTP error 404"), "unexpected reason: {reason}");
        assert!(h.muxer.calls.lock().unwrap().is_empty());
        assert!(leftover_files(&h).is_empty());
    }

    #[tokio::test]
    async fn test_mux_failure_cleans_up() {
        let h = harness(&["http://cdn/video", "http://cdn/audio"], true, false);

        let err = h.app.run(URL).await.unwrap_err();

        assert!(matches!(err, AppError::Mux { .. }));
        assert_eq!(h.muxer.calls.lock().unwrap().len(), 1);
        assert!(leftover_files(&h).is_empty());
    }

    #[tokio::test]
    async fn test_keep_temp_leaves_intermediate_files() {
        let h = harness(&["http://cdn/video", "http://cdn/audio"], true, true);

        let err = h.app.run(URL).await.unwrap_err();

        assert!(matches!(err, AppError::Mux { .. }));
        assert_eq!(
            leftover_files(&h),
            vec![format!("{ID}_audio.tmp"), format!("{ID}_video.tmp")]
        );
    }

    #[tokio::test]
    async fn test_invalid_url_fails_before_resolving() {
        let h = harness(&[], false, false);

        let err = h.app.run("https://example.com/video").await.unwrap_err();

        assert!(matches!(err, AppError::InvalidUrl { .. }));
        assert!(!out_dir(&h).exists());
    }

    #[tokio::test]
    async fn test_no_streams_is_an_error() {
        let h = harness(&[], false, false);

        let err = h.app.run(URL).await.unwrap_err();

        assert!(matches!(err, AppError::NoStreams { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let h = harness(&["http://cdn/video"], false, false);
        h.app.cancellation_token().cancel();

        let err = h.app.run(URL).await.unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
    }
}
