//! Telemetry topics, payloads and the link/publish interfaces.

use serde::Serialize;

use crate::error::{Failure, FailureKind, LinkError, PublishError, Source};

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// Every metric the box publishes, one topic each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Temperature,
    Humidity,
    Pressure,
    Caqi,
    Eco2,
    Tvoc,
    Pm01,
    Pm25,
    Pm100,
    H2,
    Ethanol,
    Error,
}

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::Temperature,
        Metric::Humidity,
        Metric::Pressure,
        Metric::Caqi,
        Metric::Eco2,
        Metric::Tvoc,
        Metric::Pm01,
        Metric::Pm25,
        Metric::Pm100,
        Metric::H2,
        Metric::Ethanol,
        Metric::Error,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Pressure => "pressure",
            Metric::Caqi => "caqi",
            Metric::Eco2 => "eco2",
            Metric::Tvoc => "tvoc",
            Metric::Pm01 => "pm01",
            Metric::Pm25 => "pm25",
            Metric::Pm100 => "pm100",
            Metric::H2 => "h2",
            Metric::Ethanol => "ethanol",
            Metric::Error => "error",
        }
    }
}

/// Topic names under a per-box prefix, e.g. `box01/temperature`.
#[derive(Debug, Clone)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn of(&self, metric: Metric) -> String {
        format!("{}/{}", self.prefix, metric.suffix())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Int(i64),
    Float { value: f32, precision: usize },
    Text(String),
}

impl Payload {
    /// Wire form: plain decimal text, floats with fixed precision.
    pub fn render(&self) -> String {
        match self {
            Payload::Int(v) => v.to_string(),
            Payload::Float { value, precision } => format!("{value:.precision$}"),
            Payload::Text(s) => s.clone(),
        }
    }
}

/// JSON body published on the error topic.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub kind: FailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub detail: String,
}

impl ErrorReport {
    pub fn from_failure(failure: &Failure) -> Self {
        Self {
            kind: failure.kind(),
            source: failure.device(),
            detail: failure.to_string(),
        }
    }

    pub fn to_payload(&self) -> Payload {
        match serde_json::to_string(self) {
            Ok(json) => Payload::Text(json),
            Err(_) => Payload::Text(self.detail.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator interfaces
// ---------------------------------------------------------------------------

/// Publishes one value to one topic.
#[allow(async_fn_in_trait)]
pub trait Telemetry {
    async fn publish(&mut self, topic: &str, payload: Payload) -> Result<(), PublishError>;
}

/// Network link plus broker session.
#[allow(async_fn_in_trait)]
pub trait Session {
    async fn connect_network(&mut self) -> Result<(), LinkError>;
    async fn connect_broker(&mut self) -> Result<(), LinkError>;
    fn is_connected(&self) -> bool;
}

// ===========================================================================
// Tests
// ===========================================================================
