use std::time::Duration;

use color_sampler::PICKER_SIZE;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bridge config is not valid JSON")]
    Parse(#[from] serde_json::Error),
    #[error("picker size {0} must be odd and at least {min}", min = PICKER_SIZE)]
    InvalidPickerSize(u32),
    #[error("request capacity must be at least 1")]
    ZeroCapacity,
    #[error("worker thread name must not be empty")]
    EmptyThreadName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Executors run on the calling thread.
    Local,
    /// Executors run on a dedicated worker thread with its own state.
    #[default]
    Worker,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub execution: ExecutionMode,
    /// Bound of the request and response channels.
    pub request_capacity: usize,
    /// Applied to calls that do not pass their own timeout. `None` waits forever.
    pub default_timeout_ms: Option<u64>,
    pub picker_size: u32,
    pub worker_thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionMode::default(),
            request_capacity: 256,
            default_timeout_ms: None,
            picker_size: PICKER_SIZE,
            worker_thread_name: "render-worker".to_owned(),
        }
    }
}

impl BridgeConfig {
    pub fn local() -> Self {
        Self {
            execution: ExecutionMode::Local,
            ..Self::default()
        }
    }

    pub fn worker() -> Self {
        Self {
            execution: ExecutionMode::Worker,
            ..Self::default()
        }
    }

    /// Parses and validates. Missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.picker_size < PICKER_SIZE || self.picker_size % 2 == 0 {
            return Err(ConfigError::InvalidPickerSize(self.picker_size));
        }
        if self.request_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.worker_thread_name.is_empty() {
            return Err(ConfigError::EmptyThreadName);
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = BridgeConfig::from_json_str(r#"{ "execution": "local" }"#).expect("valid");
        assert_eq!(config.execution, ExecutionMode::Local);
        assert_eq!(config.picker_size, PICKER_SIZE);
        assert_eq!(config.default_timeout(), None);
    }

    #[test]
    fn timeout_is_read_in_milliseconds() {
        let config =
            BridgeConfig::from_json_str(r#"{ "default_timeout_ms": 250 }"#).expect("valid");
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.execution, ExecutionMode::Worker);
    }

    #[test]
    fn even_or_small_picker_sizes_are_rejected() {
        for picker_size in [12, 9] {
            let config = BridgeConfig {
                picker_size,
                ..BridgeConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidPickerSize(size)) if size == picker_size
            ));
        }
        assert!(
            BridgeConfig {
                picker_size: 15,
                ..BridgeConfig::default()
            }
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn zero_capacity_and_bad_json_are_rejected() {
        assert!(matches!(
            BridgeConfig::from_json_str(r#"{ "request_capacity": 0 }"#),
            Err(ConfigError::ZeroCapacity)
        ));
        assert!(matches!(
            BridgeConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn execution_mode_names_are_snake_case() {
        let config = BridgeConfig::from_json_str(r#"{ "execution": "worker" }"#).expect("valid");
        assert_eq!(config.execution, ExecutionMode::Worker);
        assert!(matches!(
            BridgeConfig::from_json_str(r#"{ "execution": "Local" }"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
