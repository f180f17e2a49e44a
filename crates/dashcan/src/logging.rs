//! Diagnostics for the `dashcan` binary.
//!
//! Logs go to stderr so stdout carries nothing but telemetry. `--log-level`
//! sets the verbosity of the dashcan crates; everything else (tokio, clap)
//! is capped at `warn`. Per-target directives in `DASHCAN_LOG`, such as
//! `dashcan_frame=trace,dashcan_signal=off`, are applied last.

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding extra per-target log directives.
pub const LOG_ENV: &str = "DASHCAN_LOG";

const DASHCAN_TARGETS: [&str; 5] = [
    "dashcan",
    "dashcan_transport",
    "dashcan_frame",
    "dashcan_signal",
    "dashcan_session",
];

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Build the target filter for `level`, then layer `directives` on top.
///
/// Returns the directive parse error alongside the fallback filter so it
/// can be logged once the subscriber is up.
fn log_targets(level: LogLevel, directives: Option<&str>) -> (Targets, Option<String>) {
    let level = level.as_filter();
    let targets = Targets::new()
        .with_default(level.min(LevelFilter::WARN))
        .with_targets(DASHCAN_TARGETS.iter().map(|target| (*target, level)));

    let Some(directives) = directives.map(str::trim).filter(|d| !d.is_empty()) else {
        return (targets, None);
    };
    match directives.parse::<Targets>() {
        Ok(extra) => {
            let targets = match extra.default_level() {
                Some(default) => targets.with_default(default),
                None => targets,
            };
            (targets.with_targets(extra), None)
        }
        Err(err) => (targets, Some(format!("ignoring {LOG_ENV}={directives:?}: {err}"))),
    }
}

/// Install the stderr subscriber.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let directives = std::env::var(LOG_ENV).ok();
    let (targets, rejected) = log_targets(level, directives.as_deref());

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::TRACE)
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(false);

    let installed = match format {
        LogFormat::Text => builder.finish().with(targets).try_init(),
        LogFormat::Json => builder.json().finish().with(targets).try_init(),
    };

    if let (Ok(()), Some(rejected)) = (installed, rejected) {
        tracing::warn!("{rejected}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(targets: &Targets, target: &str, level: tracing::Level) -> bool {
        targets.would_enable(target, &level)
    }

    #[test]
    fn level_applies_to_dashcan_crates_only() {
        let (targets, rejected) = log_targets(LogLevel::Debug, None);
        assert!(rejected.is_none());
        assert!(enabled(&targets, "dashcan_frame::channel", tracing::Level::DEBUG));
        assert!(enabled(&targets, "dashcan_session", tracing::Level::DEBUG));
        assert!(!enabled(&targets, "dashcan_frame", tracing::Level::TRACE));
        assert!(!enabled(&targets, "tokio::runtime", tracing::Level::DEBUG));
        assert!(enabled(&targets, "tokio::runtime", tracing::Level::WARN));
    }

    #[test]
    fn quiet_level_also_quiets_dependencies() {
        let (targets, _) = log_targets(LogLevel::Error, None);
        assert!(!enabled(&targets, "tokio", tracing::Level::WARN));
        assert!(!enabled(&targets, "dashcan", tracing::Level::WARN));
        assert!(enabled(&targets, "dashcan", tracing::Level::ERROR));
    }

    #[test]
    fn directives_override_per_target() {
        let (targets, rejected) =
            log_targets(LogLevel::Warn, Some("dashcan_frame=trace,dashcan_signal=off"));
        assert!(rejected.is_none());
        assert!(enabled(&targets, "dashcan_frame::reader", tracing::Level::TRACE));
        assert!(!enabled(&targets, "dashcan_signal", tracing::Level::ERROR));
        assert!(enabled(&targets, "dashcan_session", tracing::Level::WARN));
        assert!(!enabled(&targets, "dashcan_session", tracing::Level::INFO));
    }

    #[test]
    fn bad_directives_fall_back_to_level() {
        let (targets, rejected) = log_targets(LogLevel::Info, Some("dashcan_frame=loud"));
        assert!(rejected.unwrap().contains(LOG_ENV));
        assert!(enabled(&targets, "dashcan_frame", tracing::Level::INFO));
        assert!(!enabled(&targets, "dashcan_frame", tracing::Level::DEBUG));
    }

    #[test]
    fn blank_directives_are_ignored() {
        let (_, rejected) = log_targets(LogLevel::Info, Some("  "));
        assert!(rejected.is_none());
    }
}
