//! MQTT link: broker session, connection tracking and publishing.
//!
//! The rumqttc event loop runs as its own task once the first broker
//! connect is requested.  It only reports connection state back through a
//! watch channel; the controller never waits on it except while connecting.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::error::{LinkError, PublishError};
use crate::telemetry::{Payload, Session, Telemetry};

/// Pause between event-loop polls after a connection error.
const RECONNECT_PAUSE: Duration = Duration::from_secs(2);

/// Outgoing request queue depth.
const REQUEST_CAPACITY: usize = 32;

pub struct MqttLink {
    host: String,
    port: u16,
    connect_timeout: Duration,
    client: AsyncClient,
    /// Present until the event loop task is spawned.
    pending: Option<(EventLoop, watch::Sender<bool>)>,
    connected: watch::Receiver<bool>,
}

impl MqttLink {
    pub fn new(cfg: &BrokerConfig) -> Self {
        let mut options = MqttOptions::new(cfg.client_id.clone(), cfg.host.clone(), cfg.port);
        options.set_keep_alive(Duration::from_secs(cfg.keep_alive_sec));
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (tx, rx) = watch::channel(false);

        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            connect_timeout: Duration::from_secs(cfg.connect_timeout_sec),
            client,
            pending: Some((eventloop, tx)),
            connected: rx,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// Drive the rumqttc event loop forever, mirroring connection state.
async fn drive(mut eventloop: EventLoop, state: watch::Sender<bool>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("mqtt connected");
                state.send_replace(true);
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                info!("mqtt disconnected");
                state.send_replace(false);
            }
            Ok(_) => {}
            Err(e) => {
                if state.send_replace(false) {
                    warn!("mqtt error: {e}. reconnecting...");
                } else {
                    debug!("mqtt still down: {e}");
                }
                sleep(RECONNECT_PAUSE).await;
            }
        }
    }
}

impl Session for MqttLink {
    async fn connect_network(&mut self) -> Result<(), LinkError> {
        let target = (self.host.as_str(), self.port);
        let addrs = timeout(self.connect_timeout, tokio::net::lookup_host(target))
            .await
            .map_err(|_| LinkError::Network(format!("resolving {} timed out", self.host)))?
            .map_err(|e| LinkError::Network(format!("resolving {}: {e}", self.host)))?;

        match addrs.into_iter().next() {
            Some(addr) => {
                debug!(%addr, "broker address resolved");
                Ok(())
            }
            None => Err(LinkError::Network(format!(
                "{} resolved to no addresses",
                self.host
            ))),
        }
    }

    async fn connect_broker(&mut self) -> Result<(), LinkError> {
        if let Some((eventloop, tx)) = self.pending.take() {
            tokio::spawn(drive(eventloop, tx));
        }

        let wait = self.connected.wait_for(|up| *up);
        match timeout(self.connect_timeout, wait).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(LinkError::Broker("event loop stopped".into())),
            Err(_) => Err(LinkError::BrokerTimeout(self.connect_timeout.as_secs())),
        }
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }
}

impl Telemetry for MqttLink {
    async fn publish(&mut self, topic: &str, payload: Payload) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }

        // try_publish: a full queue must not stall the wake cycle.
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.render())
            .map_err(|e| PublishError::Client {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_broker() -> BrokerConfig {
        BrokerConfig {
            host: "127.0.0.1".into(),
            // Port 1 is privileged and never has a broker on it.
            port: 1,
            ..BrokerConfig::default()
        }
    }

    #[test]
    fn starts_disconnected() {
        let link = MqttLink::new(&BrokerConfig::default());
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn publish_without_session_is_rejected() {
        let mut link = MqttLink::new(&BrokerConfig::default());
        let err = link
            .publish("box01/temperature", Payload::Int(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::NotConnected));
    }

    #[tokio::test]
    async fn literal_address_resolves() {
        let mut link = MqttLink::new(&unreachable_broker());
        link.connect_network().await.unwrap();
    }

    #[tokio::test]
    async fn broker_connect_times_out() {
        let mut link =
            MqttLink::new(&unreachable_broker()).with_connect_timeout(Duration::from_millis(200));
        let err = link.connect_broker().await.unwrap_err();
        assert!(matches!(err, LinkError::BrokerTimeout(_)), "{err}");
        assert!(!link.is_connected());
    }
}
