//! Failure taxonomy.
//!
//! None of these are fatal: the controller reports them on the error topic
//! and carries on with whatever data it has.

use serde::Serialize;
use thiserror::Error;

/// Which device a sensor failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Particulate,
    Climate,
    Barometer,
    Voc,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Particulate => write!(f, "particulate"),
            Self::Climate => write!(f, "climate"),
            Self::Barometer => write!(f, "barometer"),
            Self::Voc => write!(f, "voc"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AcquisitionError {
    #[error("{0}: no response within {1} ms")]
    Timeout(Source, u64),

    #[error("{0}: bad frame: {1}")]
    BadFrame(Source, String),

    #[error("{0}: driver error: {1}")]
    Driver(Source, String),

    #[error("{0}: initialisation gave up after {1} attempts")]
    InitExhausted(Source, u32),
}

impl AcquisitionError {
    pub fn source_device(&self) -> Source {
        match self {
            Self::Timeout(s, _)
            | Self::BadFrame(s, _)
            | Self::Driver(s, _)
            | Self::InitExhausted(s, _) => *s,
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("not connected to broker")]
    NotConnected,

    #[error("publish to {topic} failed: {reason}")]
    Client { topic: String, reason: String },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("baseline record io: {0}")]
    Io(#[from] std::io::Error),

    #[error("baseline record malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("network unavailable: {0}")]
    Network(String),

    #[error("broker session not established within {0} s")]
    BrokerTimeout(u64),

    #[error("broker session: {0}")]
    Broker(String),

    #[error("link not established after {0} attempts")]
    RetriesExhausted(u32),
}

/// Any failure the controller reports on the error channel.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Acquisition,
    Publish,
    Persistence,
    Link,
}

impl Failure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Acquisition(_) => FailureKind::Acquisition,
            Self::Publish(_) => FailureKind::Publish,
            Self::Persistence(_) => FailureKind::Persistence,
            Self::Link(_) => FailureKind::Link,
        }
    }

    /// Device the failure is attributed to, if any.
    pub fn device(&self) -> Option<Source> {
        match self {
            Self::Acquisition(e) => Some(e.source_device()),
            _ => None,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquisition_message_names_device() {
        let e = AcquisitionError::Timeout(Source::Particulate, 5_000);
        assert_eq!(e.to_string(), "particulate: no response within 5000 ms");
    }

    #[test]
    fn failure_kind_follows_variant() {
        let f: Failure = PublishError::NotConnected.into();
        assert_eq!(f.kind(), FailureKind::Publish);
        assert_eq!(f.device(), None);

        let f: Failure = AcquisitionError::Driver(Source::Voc, "nack".into()).into();
        assert_eq!(f.kind(), FailureKind::Acquisition);
        assert_eq!(f.device(), Some(Source::Voc));
    }

    #[test]
    fn persistence_wraps_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let f: Failure = PersistenceError::from(io).into();
        assert_eq!(f.kind(), FailureKind::Persistence);
        assert!(f.to_string().contains("gone"));
    }
}
