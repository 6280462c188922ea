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
    env,
    io::IsTerminal,
    sync::{
        Mutex, Once, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use bon::Builder;
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use snafu::{ResultExt, Snafu};
use tracing::Subscriber;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::{LogTracer, log::SetLoggerError};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter, layer::SubscriberExt, registry::LookupSpan,
};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
///
/// # Errors
/// Returns an error if the non-empty string is not a valid `T`.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

/// Handle for changing the level filter after initialization.
///
/// Only set once [`init_global_logging`] has run.
pub static RELOAD_HANDLE: OnceCell<tracing_subscriber::reload::Handle<filter::Targets, Registry>> =
    OnceCell::new();

/// Fallback when neither `LoggingOptions::level` nor `RUST_LOG` is set
const DEFAULT_LOG_TARGETS: &str = "info";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoggingError {
    #[snafu(display("Invalid log level filter '{level}': {source}"))]
    InvalidLevel {
        level:  String,
        source: filter::ParseError,
    },

    #[snafu(display("Cannot create log files in {dir}: {source}"))]
    FileAppender {
        dir:    String,
        source: tracing_appender::rolling::InitError,
    },

    #[snafu(display("Failed to install the log bridge: {source}"))]
    LogBridge { source: SetLoggerError },

    #[snafu(display("Failed to install the global subscriber: {source}"))]
    SetGlobal {
        source: tracing::subscriber::SetGlobalDefaultError,
    },
}

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for rotated log files.
    ///
    /// Empty means no file logging. When set, every event goes to an hourly
    /// rotated `<app>` file and errors additionally to `<app>-err`.
    #[default = ""]
    #[builder(default)]
    pub dir: String,

    /// Level filter such as `"info"` or `"debug,hyper=warn"`.
    ///
    /// Falls back to `RUST_LOG`, then to `"info"`.
    pub level: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Rotated files kept per log kind
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    /// Write events to stderr, keeping stdout free for program output
    #[default = true]
    #[builder(default = true)]
    pub append_stderr: bool,
}

/// Output format of log lines
#[derive(
    Clone,
    Debug,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Default,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// Human-readable lines
    #[default]
    Text,
}

/// Initialize logging for unit tests.
///
/// Safe to call from every test. Reads `UNITTEST_LOG_LEVEL` (default
/// `debug` with noisy HTTP crates turned down) and, if set,
/// `UNITTEST_LOG_DIR` for file output.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let mut g = GLOBAL_UT_LOG_GUARD
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| {
            "debug,hyper=warn,hyper_util=warn,reqwest=warn,h2=info,rustls=info".to_string()
        });
        let opts = LoggingOptions {
            dir: env::var("UNITTEST_LOG_DIR").unwrap_or_default(),
            level: Some(level),
            ..Default::default()
        };

        // Another test harness may already own the global subscriber
        if let Ok(guards) = init_global_logging("unittest", &opts) {
            *g = Some(guards);
        }
    });
}

static GLOBAL_UT_LOG_GUARD: Lazy<Mutex<Option<Vec<WorkerGuard>>>> = Lazy::new(|| Mutex::new(None));

/// Install the global tracing subscriber.
///
/// Layers, depending on `opts`:
/// - stderr, text or JSON, when `append_stderr` is set
/// - an hourly rotated file with every event, when `dir` is set
/// - an hourly rotated file with errors only, when `dir` is set
///
/// The level filter is reloadable through [`RELOAD_HANDLE`]. Only the first
/// call installs anything; later calls return no guards.
///
/// The returned guards flush the non-blocking writers when dropped and must
/// live as long as logging is needed.
pub fn init_global_logging(
    app_name: &str,
    opts: &LoggingOptions,
) -> Result<Vec<WorkerGuard>, LoggingError> {
    static INITIALIZED: AtomicBool = AtomicBool::new(false);

    let level = opts
        .level
        .clone()
        .or_else(|| env::var(EnvFilter::DEFAULT_ENV).ok())
        .unwrap_or_else(|| DEFAULT_LOG_TARGETS.to_string());
    let filter = level
        .parse::<filter::Targets>()
        .context(InvalidLevelSnafu { level: &level })?;

    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(Vec::new());
    }

    let mut guards = Vec::new();

    let stderr_logging_layer = if opts.append_stderr {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
        guards.push(guard);
        let ansi = std::io::stderr().is_terminal();

        Some(match opts.log_format {
            LogFormat::Json => tracing_subscriber::fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
            LogFormat::Text => tracing_subscriber::fmt::Layer::new()
                .with_writer(writer)
                .with_ansi(ansi)
                .boxed(),
        })
    } else {
        None
    };

    let (file_logging_layer, err_file_logging_layer) = if opts.dir.is_empty() {
        (None, None)
    } else {
        let (writer, guard) = tracing_appender::non_blocking(rolling_appender(
            app_name,
            &opts.dir,
            opts.max_log_files,
        )?);
        guards.push(guard);
        let all = file_layer(opts.log_format, writer);

        let (writer, guard) = tracing_appender::non_blocking(rolling_appender(
            &format!("{app_name}-err"),
            &opts.dir,
            opts.max_log_files,
        )?);
        guards.push(guard);
        let errors = file_layer(opts.log_format, writer)
            .with_filter(filter::LevelFilter::ERROR)
            .boxed();

        (Some(all), Some(errors))
    };

    let (dyn_filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);
    let _ = RELOAD_HANDLE.set(reload_handle);

    let subscriber = Registry::default()
        .with(dyn_filter)
        .with(stderr_logging_layer)
        .with(file_logging_layer)
        .with(err_file_logging_layer);

    LogTracer::init().context(LogBridgeSnafu)?;
    tracing::subscriber::set_global_default(subscriber).context(SetGlobalSnafu)?;

    Ok(guards)
}

fn rolling_appender(
    prefix: &str,
    dir: &str,
    max_log_files: usize,
) -> Result<RollingFileAppender, LoggingError> {
    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(max_log_files)
        .build(dir)
        .context(FileAppenderSnafu { dir })
}

fn file_layer<S>(
    format: LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::Layer::new()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::Layer::new()
            .with_writer(writer)
            .with_ansi(false)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_default_options() {
        let opts = LoggingOptions::default();
        assert!(opts.dir.is_empty());
        assert_eq!(opts.level, None);
        assert_eq!(opts.log_format, LogFormat::Text);
        assert_eq!(opts.max_log_files, 720);
        assert!(opts.append_stderr);
    }

    #[test]
    fn test_builder_matches_default() {
        assert_eq!(LoggingOptions::builder().build(), LoggingOptions::default());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::from_str("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("TEXT").unwrap(), LogFormat::Text);
        assert!(LogFormat::from_str("xml").is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_deserialize_empty_format_as_default() {
        let opts: LoggingOptions =
            serde_json::from_str(r#"{"log_format": "", "level": "debug"}"#).unwrap();
        assert_eq!(opts.log_format, LogFormat::Text);
        assert_eq!(opts.level.as_deref(), Some("debug"));

        let opts: LoggingOptions = serde_json::from_str(r#"{"log_format": "json"}"#).unwrap();
        assert_eq!(opts.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let opts = LoggingOptions {
            level: Some("info,downloader=loud".to_string()),
            ..Default::default()
        };
        let err = init_global_logging("test", &opts).unwrap_err();
        assert!(matches!(err, LoggingError::InvalidLevel { .. }));
    }
}
