//! Environment configuration.

use anyhow::{bail, Context, Result};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Topic prefix of the watched box.
    pub prefix: String,
    /// Heartbeat age beyond which the box counts as down.
    pub stale_after: Duration,
    /// How often the status is published.
    pub check_every: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            prefix: "box01".to_string(),
            stale_after: Duration::from_secs(600),
            check_every: Duration::from_secs(60),
        }
    }
}

impl Settings {
    /// Build from `MQTT_HOST`, `MQTT_PORT`, `BOX_PREFIX`, `STALE_AFTER_S`
    /// and `CHECK_EVERY_S`, falling back to defaults for anything unset.
    pub fn from_env(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut s = Self::default();
        if let Some(host) = var("MQTT_HOST") {
            s.host = host;
        }
        if let Some(port) = var("MQTT_PORT") {
            s.port = port
                .trim()
                .parse()
                .with_context(|| format!("MQTT_PORT is not a port number: {port:?}"))?;
        }
        if let Some(prefix) = var("BOX_PREFIX") {
            s.prefix = prefix;
        }
        if let Some(v) = var("STALE_AFTER_S") {
            s.stale_after = seconds("STALE_AFTER_S", &v)?;
        }
        if let Some(v) = var("CHECK_EVERY_S") {
            s.check_every = seconds("CHECK_EVERY_S", &v)?;
        }
        s.validate()?;
        Ok(s)
    }

    /// Returns an error describing every violation found.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.host.trim().is_empty() {
            errors.push("MQTT_HOST must not be empty".to_string());
        }
        if self.port == 0 {
            errors.push("MQTT_PORT must be > 0".to_string());
        }
        if self.prefix.is_empty() {
            errors.push("BOX_PREFIX must not be empty".to_string());
        } else if self.prefix.contains(&['/', '+', '#'][..]) {
            errors.push(format!(
                "BOX_PREFIX '{}' must not contain '/', '+' or '#'",
                self.prefix
            ));
        }
        if self.stale_after.is_zero() {
            errors.push("STALE_AFTER_S must be > 0".to_string());
        }
        if self.check_every.is_zero() {
            errors.push("CHECK_EVERY_S must be > 0".to_string());
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
}

fn seconds(name: &str, value: &str) -> Result<Duration> {
    let n: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{name} is not a number of seconds: {value:?}"))?;
    Ok(Duration::from_secs(n))
}

// ===========================================================================
// Tests
// ===========================================================================
