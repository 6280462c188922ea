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

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use downloader::{ChunkCount, DownloaderConfig};
use rangefetch_app::AppConfig;
use rangefetch_common_telemetry::{self as telemetry, LogFormat, LoggingOptions};
use snafu::Report;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "rangefetch",
about = "Download a video with parallel range requests and mux it into an mp4",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
#[command(long_about = r"

Resolves the direct stream URLs of a video with yt-dlp, downloads them with
concurrent HTTP range requests and muxes the result with ffmpeg.
Examples:

rangefetch 'https://www.youtube.com/watch?v=dQw4w9WgXcQ'
rangefetch 'https://www.youtube.com/watch?v=dQw4w9WgXcQ' 16

")]
struct Cli {
    /// Watch URL containing a `v=` parameter
    url: String,

    /// Concurrent range requests per stream (1-32, anything else means 8)
    #[arg(value_name = "THREADS")]
    threads: Option<String>,

    /// Directory for the intermediate and final files
    #[arg(long, env = "RANGEFETCH_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Accept invalid TLS certificates and hostnames
    #[arg(long, env = "RANGEFETCH_INSECURE")]
    insecure: bool,

    /// Keep intermediate files instead of deleting them
    #[arg(long, env = "RANGEFETCH_KEEP_TEMP")]
    keep_temp: bool,

    /// Path to the yt-dlp executable
    #[arg(long = "yt-dlp", env = "RANGEFETCH_YT_DLP", default_value = "yt-dlp")]
    yt_dlp: PathBuf,

    /// Path to the ffmpeg executable
    #[arg(long, env = "RANGEFETCH_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Log filter, e.g. "debug" or "info,downloader=debug"
    #[arg(long, env = "RANGEFETCH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log line format: text or json
    #[arg(long, env = "RANGEFETCH_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Also write rotated log files to this directory
    #[arg(long, env = "RANGEFETCH_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn logging_options(&self) -> LoggingOptions {
        LoggingOptions::builder()
            .dir(
                self.log_dir
                    .as_ref()
                    .map(|d| d.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )
            .maybe_level(self.log_level.clone())
            .log_format(self.log_format)
            .build()
    }

    fn app_config(&self) -> AppConfig {
        let chunk_count = self
            .threads
            .as_deref()
            .map_or(ChunkCount::DEFAULT, ChunkCount::parse_lenient);

        AppConfig::builder()
            .output_dir(self.output_dir.clone())
            .keep_temp(self.keep_temp)
            .downloader(DownloaderConfig {
                chunk_count,
                accept_invalid_certs: self.insecure,
                ..DownloaderConfig::default()
            })
            .yt_dlp(self.yt_dlp.clone())
            .ffmpeg(self.ffmpeg.clone())
            .build()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    human_panic::setup_panic!();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let _guards = match telemetry::init_global_logging("rangefetch", &cli.logging_options()) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("rangefetch: {e}");
            return ExitCode::FAILURE;
        }
    };
    telemetry::set_panic_hook();

    let app = match cli.app_config().open() {
        Ok(app) => app,
        Err(e) => {
            error!("{}", Report::from_error(e));
            return ExitCode::FAILURE;
        }
    };

    tokio::spawn(shutdown_signal(app.cancellation_token()));

    match app.run(&cli.url).await {
        Ok(output) => {
            info!(output = %output.display(), "finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", Report::from_error(e));
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received terminate signal"),
    }
    token.cancel();
}
