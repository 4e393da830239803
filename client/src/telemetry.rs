//! Logging setup shared by the binaries.

use crate::config::ConfigError;
use clap::Args;
use std::str::FromStr;
use tracing::Level;

#[derive(Args, Clone, Debug)]
pub struct LogArgs {
    /// Maximum log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl LogArgs {
    pub fn level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
            value: self.log_level.clone(),
        })
    }

    /// Install the global subscriber.
    pub fn init(&self) -> Result<(), ConfigError> {
        let level = self.level()?;
        let builder = tracing_subscriber::fmt().with_max_level(level);
        if self.log_json {
            builder.json().init();
        } else {
            builder.init();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        let args = LogArgs {
            log_level: "DEBUG".to_string(),
            log_json: false,
        };
        assert_eq!(args.level().unwrap(), Level::DEBUG);

        let args = LogArgs {
            log_level: "loud".to_string(),
            log_json: true,
        };
        assert!(matches!(
            args.level(),
            Err(ConfigError::InvalidLogLevel { .. })
        ));
    }
}
