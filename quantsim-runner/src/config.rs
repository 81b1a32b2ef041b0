//! Session configuration loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quantsim_core::params::RuntimeParams;

/// Errors from loading or validating a session config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

/// Declarative description of one backtest session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Symbols to simulate, in id-assignment order.
    pub symbols: Vec<String>,

    #[serde(default)]
    pub runtime: RuntimeParams,

    /// Optional explicit-trades script (CSV or JSON lines by extension).
    #[serde(default)]
    pub explicit_trades_path: Option<PathBuf>,
}

impl SessionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::Validation("symbols list is empty".into()));
        }
        let sizing = &self.runtime.position_sizing;
        if !(sizing.initial_capital > 0.0) {
            return Err(ConfigError::Validation(format!(
                "initial_capital must be positive, got {}",
                sizing.initial_capital
            )));
        }
        if sizing.size < 0.0 {
            return Err(ConfigError::Validation(format!(
                "position_size must be non-negative, got {}",
                sizing.size
            )));
        }
        if sizing.limit < 0.0 {
            return Err(ConfigError::Validation(format!(
                "position_size_limit must be non-negative, got {}",
                sizing.limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quantsim_core::params::{MaxOpenPositions, PosSizeType};

    const FULL: &str = r#"
symbols = ["SPY", "QQQ"]

[runtime]
threads = 4
cpu_affinity = false
data_error_handling = "warning"

[runtime.range]

[runtime.position_sizing]
initial_capital = 50000.0
max_open_positions = { limit = 3 }
size_type = "pct_equity"
size = 10.0
limit_type = "none"
limit = 0.0
"#;

    #[test]
    fn full_config_parses() {
        let config = SessionConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.symbols, vec!["SPY", "QQQ"]);
        assert_eq!(config.runtime.threads, 4);
        let sizing = &config.runtime.position_sizing;
        assert_eq!(sizing.initial_capital, 50_000.0);
        assert_eq!(sizing.max_open_positions, MaxOpenPositions::Limit(3));
        assert_eq!(sizing.size_type, PosSizeType::PctEquity);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = SessionConfig::from_toml_str("symbols = [\"SPY\"]").unwrap();
        assert_eq!(config.runtime.threads, 0);
        assert_eq!(
            config.runtime.position_sizing.max_open_positions,
            MaxOpenPositions::Unlimited
        );
        assert!(config.explicit_trades_path.is_none());
    }

    #[test]
    fn empty_symbols_rejected() {
        assert!(matches!(
            SessionConfig::from_toml_str("symbols = []"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn non_positive_capital_rejected() {
        let text = r#"
symbols = ["SPY"]
[runtime.position_sizing]
initial_capital = 0.0
size_type = "system_defined"
size = 0.0
limit_type = "none"
limit = 0.0
max_open_positions = "unlimited"
"#;
        assert!(matches!(
            SessionConfig::from_toml_str(text),
            Err(ConfigError::Validation(_))
        ));
    }
}
