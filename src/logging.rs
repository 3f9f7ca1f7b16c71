//! Structured logging setup
//!
//! `RUST_LOG` directives win over the configured level; the configured
//! level is the default directive.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Resolve the effective level; `--verbose` forces DEBUG
pub fn effective_level(config: &LoggingConfig, verbose: bool) -> Result<Level> {
    if verbose {
        return Ok(Level::DEBUG);
    }
    config
        .level
        .to_lowercase()
        .parse()
        .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
}

/// Install the global subscriber
///
/// Returns an error if a global subscriber is already set.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = effective_level(config, verbose)?;
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(level));

    let result = match config.format.to_lowercase().as_str() {
        "json" => builder.json().with_current_span(true).try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing::{debug, info, warn};
    use tracing_subscriber::fmt;
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn test_effective_level() {
        let config = LoggingConfig::default();
        assert_eq!(effective_level(&config, false).unwrap(), Level::INFO);
        assert_eq!(effective_level(&config, true).unwrap(), Level::DEBUG);

        let config = LoggingConfig {
            level: "WARN".to_string(),
            ..Default::default()
        };
        assert_eq!(effective_level(&config, false).unwrap(), Level::WARN);

        let config = LoggingConfig {
            level: "loud".to_string(),
            ..Default::default()
        };
        assert!(effective_level(&config, false).is_err());
    }

    /// In-memory sink for subscriber output
    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_structured_fields_under_json_subscriber() {
        let buffer = Buffer::default();
        let subscriber = fmt()
            .json()
            .with_max_level(Level::INFO)
            .with_writer(buffer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            info!(webhook_id = "wh-1", url = "http://x/hook", "Registered webhook");
            debug!(attempt = 1, "Delivery attempt");
            warn!(error = "connection refused", "Event delivery failed");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        // The debug event is below the max level
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["level"], "INFO");
        assert_eq!(lines[0]["fields"]["message"], "Registered webhook");
        assert_eq!(lines[0]["fields"]["webhook_id"], "wh-1");
        assert_eq!(lines[0]["fields"]["url"], "http://x/hook");
        assert_eq!(lines[1]["level"], "WARN");
        assert_eq!(lines[1]["fields"]["error"], "connection refused");
    }

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        let config = LoggingConfig::default();
        let first = init(&config, false);
        let second = init(&config, false);
        // Another test may have installed a subscriber first
        assert!(first.is_err() || second.is_err());
    }
}
