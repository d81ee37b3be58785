//! Service configuration from environment variables.

use std::time::Duration;

use shifumi_engine::EngineConfig;
use shifumi_monitor::BackoffPolicy;

pub const BROKER_VAR: &str = "KAFKA_BROKER";
pub const INGEST_ADDR_VAR: &str = "SHIFUMI_INGEST_ADDR";
pub const LOGIC_ADDR_VAR: &str = "SHIFUMI_LOGIC_ADDR";
pub const READ_DEADLINE_VAR: &str = "SHIFUMI_READ_DEADLINE_MS";
pub const PROBE_BASE_VAR: &str = "SHIFUMI_PROBE_BASE_SECS";
pub const PROBE_MAX_VAR: &str = "SHIFUMI_PROBE_MAX_SECS";

/// Errors raised while reading configuration. All of them are fatal at
/// startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable is set but can't be parsed.
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings shared by both services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Broker list handed to the log client.
    pub broker: String,
    pub ingest_addr: String,
    pub logic_addr: String,
    /// Deadline for snapshot lookups.
    pub read_deadline: Duration,
    /// Backoff of the startup availability probe.
    pub probe: BackoffPolicy,
}

impl ServiceConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value
    /// of a variable or `None` when it is unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let broker = lookup(BROKER_VAR)
            .filter(|b| !b.trim().is_empty())
            .ok_or(ConfigError::Missing(BROKER_VAR))?;

        let read_deadline =
            Duration::from_millis(parse_or(&lookup, READ_DEADLINE_VAR, 5000)?);
        let probe = BackoffPolicy::new(
            Duration::from_secs(parse_or(&lookup, PROBE_BASE_VAR, 10)?),
            Duration::from_secs(parse_or(&lookup, PROBE_MAX_VAR, 120)?),
        );

        Ok(Self {
            broker,
            ingest_addr: lookup(INGEST_ADDR_VAR)
                .unwrap_or_else(|| "0.0.0.0:8081".to_string()),
            logic_addr: lookup(LOGIC_ADDR_VAR)
                .unwrap_or_else(|| "0.0.0.0:8082".to_string()),
            read_deadline,
            probe,
        })
    }

    /// Engine settings with this configuration's read deadline.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default().with_read_deadline(self.read_deadline)
    }
}

fn parse_or<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::Invalid {
                var,
                value,
                reason: e.to_string(),
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config =
            ServiceConfig::from_lookup(lookup(&[("KAFKA_BROKER", "kafka:9092")]))
                .unwrap();
        assert_eq!(config.broker, "kafka:9092");
        assert_eq!(config.ingest_addr, "0.0.0.0:8081");
        assert_eq!(config.logic_addr, "0.0.0.0:8082");
        assert_eq!(config.read_deadline, Duration::from_secs(5));
        assert_eq!(config.probe.base, Duration::from_secs(10));
        assert_eq!(config.probe.max, Duration::from_secs(120));
    }

    #[test]
    fn test_from_lookup_missing_broker_returns_error() {
        let result = ServiceConfig::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(ConfigError::Missing("KAFKA_BROKER"))));

        let result = ServiceConfig::from_lookup(lookup(&[("KAFKA_BROKER", " ")]));
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("KAFKA_BROKER", "b1:9092,b2:9092"),
            ("SHIFUMI_INGEST_ADDR", "127.0.0.1:9001"),
            ("SHIFUMI_READ_DEADLINE_MS", "250"),
            ("SHIFUMI_PROBE_BASE_SECS", "1"),
            ("SHIFUMI_PROBE_MAX_SECS", "8"),
        ]))
        .unwrap();
        assert_eq!(config.ingest_addr, "127.0.0.1:9001");
        assert_eq!(config.read_deadline, Duration::from_millis(250));
        assert_eq!(config.probe.base, Duration::from_secs(1));
        assert_eq!(config.probe.max, Duration::from_secs(8));
        assert_eq!(
            config.engine_config().read_deadline,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_from_lookup_malformed_number_returns_invalid() {
        let result = ServiceConfig::from_lookup(lookup(&[
            ("KAFKA_BROKER", "kafka:9092"),
            ("SHIFUMI_READ_DEADLINE_MS", "soon"),
        ]));
        match result {
            Err(ConfigError::Invalid { var, value, .. }) => {
                assert_eq!(var, "SHIFUMI_READ_DEADLINE_MS");
                assert_eq!(value, "soon");
            }
            other => panic!("expected invalid value, got {other:?}"),
        }
    }
}
