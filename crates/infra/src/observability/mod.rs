//! Tracing setup
//!
//! The client only emits `tracing` events; hosts that do not install their
//! own subscriber can call [`init_tracing`].

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Output format for the fmt subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`)
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests);
/// returns `false` if a subscriber was already installed.
pub fn init_tracing(format: LogFormat) -> bool {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Json => fmt::fmt().with_env_filter(filter).json().try_init(),
        LogFormat::Text => fmt::fmt().with_env_filter(filter).try_init(),
    };
    result.is_ok()
}
