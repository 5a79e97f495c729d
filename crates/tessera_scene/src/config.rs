//! Scene run-loop configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable holding the target update rate in ticks per second.
pub const TICK_RATE_ENV: &str = "TESSERA_TICK_RATE";

/// Environment variable holding the tick limit (`0` = unlimited).
pub const MAX_TICKS_ENV: &str = "TESSERA_MAX_TICKS";

/// Configuration for a [`Scene`](crate::Scene) run loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Target updates per second. `None` runs updates back to back.
    #[serde(default)]
    pub tick_rate: Option<f64>,
    /// Maximum number of updates before the scene stops on its own
    /// (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,
}

impl SceneConfig {
    /// Unthrottled, unlimited.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Throttle updates to `rate` ticks per second.
    #[must_use]
    pub fn with_tick_rate(mut self, rate: f64) -> Self {
        self.tick_rate = Some(rate);
        self
    }

    /// Stop after `ticks` updates.
    #[must_use]
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = ticks;
        self
    }

    /// Read the configuration from [`TICK_RATE_ENV`] and [`MAX_TICKS_ENV`].
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if a variable is set but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(TICK_RATE_ENV) {
            let rate = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|rate| budget_for(*rate).is_some())
                .ok_or_else(|| ConfigError::Invalid {
                    var: TICK_RATE_ENV,
                    value: value.clone(),
                })?;
            config.tick_rate = Some(rate);
        }

        if let Some(value) = lookup(MAX_TICKS_ENV) {
            config.max_ticks = value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: MAX_TICKS_ENV,
                value: value.clone(),
            })?;
        }

        Ok(config)
    }

    /// Time allotted to one update, if throttled. A rate whose period does
    /// not fit in a [`Duration`] leaves the loop unthrottled.
    #[must_use]
    pub fn tick_budget(&self) -> Option<Duration> {
        self.tick_rate.and_then(budget_for)
    }

    /// Returns `true` once `ticks` updates have reached the limit.
    #[must_use]
    pub fn is_exhausted(&self, ticks: u64) -> bool {
        self.max_ticks > 0 && ticks >= self.max_ticks
    }
}

fn budget_for(rate: f64) -> Option<Duration> {
    if !rate.is_finite() || rate <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(rate.recip()).ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_default_is_unthrottled_and_unlimited() {
        let config = SceneConfig::default();
        assert_eq!(config.tick_budget(), None);
        assert!(!config.is_exhausted(u64::MAX));
    }

    #[test]
    fn test_builder() {
        let config = SceneConfig::new().with_tick_rate(4.0).with_max_ticks(3);
        assert_eq!(config.tick_budget(), Some(Duration::from_millis(250)));
        assert!(!config.is_exhausted(2));
        assert!(config.is_exhausted(3));
    }

    #[test]
    fn test_from_lookup() {
        let config =
            SceneConfig::from_lookup(lookup(&[(TICK_RATE_ENV, "60"), (MAX_TICKS_ENV, " 10 ")]))
                .unwrap();
        assert_eq!(config.tick_rate, Some(60.0));
        assert_eq!(config.max_ticks, 10);

        let config = SceneConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SceneConfig::default());
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = SceneConfig::from_lookup(lookup(&[(MAX_TICKS_ENV, "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: MAX_TICKS_ENV, .. }));

        let err = SceneConfig::from_lookup(lookup(&[(TICK_RATE_ENV, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: TICK_RATE_ENV, .. }));
    }

    #[test]
    fn test_rate_too_small_for_a_budget() {
        let err = SceneConfig::from_lookup(lookup(&[(TICK_RATE_ENV, "1e-20")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: TICK_RATE_ENV, .. }));

        let config = SceneConfig::new().with_tick_rate(1e-20);
        assert_eq!(config.tick_budget(), None);
    }

    #[test]
    fn test_deserialize() {
        let config: SceneConfig = serde_json::from_str(r#"{ "max_ticks": 5 }"#).unwrap();
        assert_eq!(config.max_ticks, 5);
        assert_eq!(config.tick_rate, None);

        let config: SceneConfig =
            serde_json::from_str(r#"{ "tick_rate": 30.0, "max_ticks": 0 }"#).unwrap();
        assert_eq!(config.tick_rate, Some(30.0));
    }
}
