//! Configuration types.

use chrono::Duration;

use crate::domain::expiry::URGENT_WINDOW;

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Coordination core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescueConfig {
    /// Tasks with this much time or less left are flagged urgent.
    pub urgent_window: Duration,
    /// Window used by the "closing soon" marketplace filter.
    pub soon_window: Duration,
    /// How many live feed notifications a slow subscriber may fall behind.
    pub event_capacity: usize,
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            urgent_window: URGENT_WINDOW,
            soon_window: Duration::minutes(60),
            event_capacity: 256,
        }
    }
}

impl RescueConfig {
    pub const URGENT_WINDOW_VAR: &'static str = "RESCUE_URGENT_WINDOW_MIN";
    pub const SOON_WINDOW_VAR: &'static str = "RESCUE_SOON_WINDOW_MIN";
    pub const EVENT_CAPACITY_VAR: &'static str = "RESCUE_EVENT_CAPACITY";

    /// Defaults overridden by any `RESCUE_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(min) = parse_var::<u32>(&lookup, Self::URGENT_WINDOW_VAR)? {
            config.urgent_window = Duration::minutes(i64::from(min));
        }
        if let Some(min) = parse_var::<u32>(&lookup, Self::SOON_WINDOW_VAR)? {
            config.soon_window = Duration::minutes(i64::from(min));
        }
        if let Some(capacity) = parse_var::<usize>(&lookup, Self::EVENT_CAPACITY_VAR)? {
            config.event_capacity = capacity;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: Self::EVENT_CAPACITY_VAR.to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.urgent_window <= Duration::zero() {
            return Err(ConfigError::InvalidValue {
                key: Self::URGENT_WINDOW_VAR.to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.soon_window < self.urgent_window {
            return Err(ConfigError::InvalidValue {
                key: Self::SOON_WINDOW_VAR.to_string(),
                message: format!(
                    "{} minutes is narrower than the urgent window ({} minutes)",
                    self.soon_window.num_minutes(),
                    self.urgent_window.num_minutes()
                ),
            });
        }
        Ok(())
    }
}

/// Parse `key` through `lookup`. Unset is `Ok(None)`; a value that does not
/// parse is an error naming the key.
pub fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        })
}
