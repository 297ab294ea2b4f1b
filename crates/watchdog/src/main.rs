mod config;
mod liveness;
mod mqtt;

use std::env;
use std::time::{Duration, Instant};

use anyhow::Result;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use config::Settings;
use liveness::Liveness;
use mqtt::{heartbeat_topic, is_heartbeat, status_topic};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Env config ──────────────────────────────────────────────────
    let settings = Settings::from_env(|key| env::var(key).ok())?;
    let heartbeat = heartbeat_topic(&settings.prefix);
    let status = status_topic(&settings.prefix);
    info!(
        broker = %format!("{}:{}", settings.host, settings.port),
        %heartbeat,
        %status,
        stale_after_s = settings.stale_after.as_secs(),
        "watchdog starting"
    );

    // ── MQTT ────────────────────────────────────────────────────────
    let client_id = format!("{}-watchdog", settings.prefix);
    let mut mqttoptions = MqttOptions::new(client_id, settings.host.clone(), settings.port);
    mqttoptions.set_keep_alive(Duration::from_secs(30));

    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 20);

    let mut liveness = Liveness::new(settings.stale_after);
    let mut ticker = interval(settings.check_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let state = liveness.status(Instant::now());
                // try_publish: the event loop is not polled while we wait here.
                match client.try_publish(&status, QoS::AtLeastOnce, true, state.payload()) {
                    Ok(()) => info!(
                        status = state.payload(),
                        last_seen_s = ?liveness.last_seen().map(|t| t.elapsed().as_secs()),
                        "status published"
                    ),
                    Err(e) => warn!("status publish failed: {e}"),
                }
            }
            polled = eventloop.poll() => match polled {
                Ok(Event::Incoming(Packet::Publish(p))) => {
                    if is_heartbeat(&p.topic, &settings.prefix) {
                        debug!(topic = %p.topic, "heartbeat");
                        liveness.observe(Instant::now());
                    } else {
                        debug!(topic = %p.topic, "unhandled topic");
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("mqtt connected");
                    // Clean session: subscriptions do not survive a reconnect.
                    if let Err(e) = client.try_subscribe(&heartbeat, QoS::AtLeastOnce) {
                        warn!("subscribe to {heartbeat} failed: {e}");
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    info!("mqtt disconnected");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("mqtt error: {e}. reconnecting...");
                    sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }
}
