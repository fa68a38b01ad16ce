//! Utility functions and helpers

use crate::config::{LogFormat, LogLevel};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_logging(level: LogLevel, format: LogFormat) {
    let default_level = tracing::Level::from(level).to_string().to_lowercase();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_target(true))
                .init();
        }
        LogFormat::Plain => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_target(false))
                .init();
        }
    }
}

/// Hex-decode an RPC string argument
pub fn decode_hex_param(field: &'static str, value: &str) -> crate::Result<Vec<u8>> {
    hex::decode(value).map_err(|e| crate::Error::invalid_hex(field, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hex_param() {
        assert_eq!(decode_hex_param("data", "00ff").unwrap(), vec![0x00, 0xff]);
        assert!(matches!(
            decode_hex_param("data", "0g"),
            Err(crate::Error::InvalidHex { field: "data", .. })
        ));
    }
}
