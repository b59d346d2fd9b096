//! Logging setup for the CLI

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Shape of emitted log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Filter used when `RUST_LOG` is unset: this crate at `level`, dependencies at warn
pub fn default_directive(level: Level) -> String {
    format!("warn,cohortforge={}", level.as_str().to_ascii_lowercase())
}

/// Install the global subscriber, writing to stderr
///
/// # Arguments
/// * `format` - Plain text or JSON lines
/// * `level` - Level for this crate's own events unless `RUST_LOG` is set
pub fn init_tracing(format: LogFormat, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    // Only one of the two layers is present
    let (text, json) = match format {
        LogFormat::Text => (
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_flag() {
        assert_eq!(LogFormat::from_json_flag(true), LogFormat::Json);
        assert_eq!(LogFormat::from_json_flag(false), LogFormat::Text);
    }

    #[test]
    fn test_default_directive_scopes_level_to_crate() {
        assert_eq!(default_directive(Level::DEBUG), "warn,cohortforge=debug");
        assert_eq!(default_directive(Level::INFO), "warn,cohortforge=info");
        assert!(EnvFilter::try_new(default_directive(Level::TRACE)).is_ok());
    }
}
