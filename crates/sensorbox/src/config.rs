//! TOML config file loading and validation.
//!
//! Every section and key is optional; a missing file means all defaults.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::controller::{CycleConfig, RetryPolicy};

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub broker: BrokerConfig,
    pub topics: TopicsConfig,
    pub timing: TimingConfig,
    pub storage: StorageConfig,
    pub sim: SimConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_sec: u64,
    pub connect_timeout_sec: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "mqtt.local".into(),
            port: 1883,
            client_id: "SensorBox01".into(),
            keep_alive_sec: 320,
            connect_timeout_sec: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopicsConfig {
    pub prefix: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            prefix: "box01".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub cycle_interval_sec: u32,
    pub initial_sleep_sec: u32,
    pub retry_delay_sec: u32,
    /// Absent: retry link and driver bring-up forever.
    pub retry_limit: Option<u32>,
    pub window_ms: u32,
    pub baseline_warmup_ms: u32,
    pub baseline_period_ms: u32,
    pub humidity_period_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cycle_interval_sec: 300,
            initial_sleep_sec: 30,
            retry_delay_sec: 5,
            retry_limit: None,
            window_ms: 3_600_000,
            baseline_warmup_ms: 12 * 3_600_000,
            baseline_period_ms: 3_600_000,
            humidity_period_ms: 6 * 3_600_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub baseline_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            baseline_path: "baseline.txt".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub scenario: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            scenario: "clean".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all sections. Returns `Ok(())` or an error describing every
    /// violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_broker(&mut errors);
        self.validate_topics(&mut errors);
        self.validate_timing(&mut errors);

        if self.storage.baseline_path.trim().is_empty() {
            errors.push("storage.baseline_path is empty".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_broker(&self, errors: &mut Vec<String>) {
        let b = &self.broker;
        if b.host.trim().is_empty() {
            errors.push("broker.host is empty".into());
        }
        if b.port == 0 {
            errors.push("broker.port must be non-zero".into());
        }
        if b.client_id.trim().is_empty() {
            errors.push("broker.client_id is empty".into());
        }
        if b.keep_alive_sec == 0 {
            errors.push("broker.keep_alive_sec must be positive".into());
        }
        if b.connect_timeout_sec == 0 {
            errors.push("broker.connect_timeout_sec must be positive".into());
        }
    }

    fn validate_topics(&self, errors: &mut Vec<String>) {
        let p = &self.topics.prefix;
        if p.trim().is_empty() {
            errors.push("topics.prefix is empty".into());
        } else if p.contains(&['/', '+', '#'][..]) {
            errors.push(format!(
                "topics.prefix {p:?} must not contain '/', '+' or '#'"
            ));
        }
    }

    fn validate_timing(&self, errors: &mut Vec<String>) {
        let t = &self.timing;
        let positive = [
            ("cycle_interval_sec", t.cycle_interval_sec),
            ("retry_delay_sec", t.retry_delay_sec),
            ("window_ms", t.window_ms),
            ("baseline_period_ms", t.baseline_period_ms),
            ("humidity_period_ms", t.humidity_period_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                errors.push(format!("timing.{name} must be positive"));
            }
        }

        if t.retry_limit == Some(0) {
            errors.push("timing.retry_limit must be positive when set".into());
        }

        // Deadlines are compared over half the u32 millisecond range.
        const MAX_SPAN_MS: u32 = u32::MAX / 2;
        let spans = [
            ("window_ms", t.window_ms),
            ("baseline_warmup_ms", t.baseline_warmup_ms),
            ("baseline_period_ms", t.baseline_period_ms),
            ("humidity_period_ms", t.humidity_period_ms),
        ];
        for (name, value) in spans {
            if value >= MAX_SPAN_MS {
                errors.push(format!(
                    "timing.{name} {value} exceeds the clock comparison range ({MAX_SPAN_MS})"
                ));
            }
        }
    }

    /// Controller settings derived from `[timing]`.
    pub fn cycle(&self) -> CycleConfig {
        let t = &self.timing;
        CycleConfig {
            cycle_interval_sec: t.cycle_interval_sec,
            initial_sleep_sec: t.initial_sleep_sec,
            retry: RetryPolicy {
                delay: Duration::from_secs(u64::from(t.retry_delay_sec)),
                limit: t.retry_limit,
            },
            window_ms: t.window_ms,
            baseline_warmup_ms: t.baseline_warmup_ms,
            baseline_period_ms: t.baseline_period_ms,
            humidity_period_ms: t.humidity_period_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.  A missing file yields the
/// defaults (still validated, so env overrides are checked too).
pub fn load(path: &str) -> Result<Config> {
    let mut config = if Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?
    } else {
        tracing::warn!(path, "config file not found, using defaults");
        Config::default()
    };

    apply_env(&mut config, |key| std::env::var(key).ok())?;

    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

/// Broker overrides from the environment (`MQTT_HOST`, `MQTT_PORT`).
pub fn apply_env(config: &mut Config, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(host) = var("MQTT_HOST") {
        config.broker.host = host;
    }
    if let Some(port) = var("MQTT_PORT") {
        config.broker.port = port
            .trim()
            .parse()
            .with_context(|| format!("MQTT_PORT is not a port number: {port:?}"))?;
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
