mod aggregator;
mod calibration;
mod caqi;
mod clock;
mod config;
mod controller;
mod error;
mod humidity;
mod mqtt;
mod power;
mod sensors;
#[cfg(feature = "sim")]
mod sim;
mod storage;
mod telemetry;
#[cfg(test)]
mod testing;

#[cfg(not(feature = "sim"))]
compile_error!("no sensor drivers for this target; build with the `sim` feature");

use std::env;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clock::BootClock;
use controller::DutyCycle;
use mqtt::MqttLink;
use power::TokioPower;
use storage::FileBaselineStore;
use telemetry::Topics;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ──────────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "sensorbox.toml".to_string());
    let cfg = config::load(&config_path)?;

    info!(
        broker = %format!("{}:{}", cfg.broker.host, cfg.broker.port),
        client_id = %cfg.broker.client_id,
        prefix = %cfg.topics.prefix,
        cycle_s = cfg.timing.cycle_interval_sec,
        "sensorbox starting"
    );

    // ── Collaborators ───────────────────────────────────────────────
    let scenario = sim::Scenario::from_str_lossy(&cfg.sim.scenario);
    info!(%scenario, "using simulated sensors");

    let mut controller = DutyCycle::new(
        cfg.cycle(),
        MqttLink::new(&cfg.broker),
        sim::suite(scenario),
        Box::new(FileBaselineStore::new(&cfg.storage.baseline_path)),
        Topics::new(cfg.topics.prefix.clone()),
        TokioPower,
        BootClock::new(),
    );

    // ── Run ─────────────────────────────────────────────────────────
    // Only a configured retry limit makes bootstrap give up.
    controller.bootstrap().await?;
    info!("bootstrap complete");
    controller.run().await;
    Ok(())
}
