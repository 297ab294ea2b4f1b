//! Duty-cycle controller: bootstrap, then wake → sample → publish → sleep.
//!
//! The controller owns every component and collaborator.  It runs on a
//! single task and never holds state across an await that anything else
//! could observe.  No failure ends the loop; failures are reported on the
//! error topic and the cycle continues with whatever data it has.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::aggregator::{Flush, WindowState, WindowedAggregator, DEFAULT_WINDOW_MS};
use crate::calibration::{
    BaselineOutcome, CalibrationScheduler, CalibrationTiming, HumidityOutcome,
};
use crate::clock::{Clock, Millis};
use crate::error::{AcquisitionError, Failure, FailureKind, LinkError, Source};
use crate::power::Power;
use crate::sensors::{Sample, SensorSuite};
use crate::storage::BaselineStore;
use crate::telemetry::{ErrorReport, Metric, Payload, Session, Telemetry, Topics};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Fixed-delay retry used while bootstrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` retries forever.
    pub limit: Option<u32>,
}

impl RetryPolicy {
    fn exhausted(&self, attempts: u32) -> bool {
        matches!(self.limit, Some(limit) if attempts >= limit)
    }

    fn delay_seconds(&self) -> u32 {
        u32::try_from(self.delay.as_secs()).unwrap_or(u32::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleConfig {
    pub cycle_interval_sec: u32,
    pub initial_sleep_sec: u32,
    pub retry: RetryPolicy,
    pub window_ms: Millis,
    pub baseline_warmup_ms: Millis,
    pub baseline_period_ms: Millis,
    pub humidity_period_ms: Millis,
}

impl CycleConfig {
    fn calibration(&self) -> CalibrationTiming {
        CalibrationTiming {
            baseline_warmup_ms: self.baseline_warmup_ms,
            baseline_period_ms: self.baseline_period_ms,
            humidity_period_ms: self.humidity_period_ms,
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        let calibration = CalibrationTiming::default();
        Self {
            cycle_interval_sec: 300,
            initial_sleep_sec: 30,
            retry: RetryPolicy::default(),
            window_ms: DEFAULT_WINDOW_MS,
            baseline_warmup_ms: calibration.baseline_warmup_ms,
            baseline_period_ms: calibration.baseline_period_ms,
            humidity_period_ms: calibration.humidity_period_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// State and reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Bootstrapping,
    Ready,
    Sampling,
    Idle,
}

/// What one wake cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub published: Vec<Metric>,
    pub flush: Option<Flush>,
    pub baseline_fired: bool,
    pub humidity_fired: bool,
    pub failures: Vec<FailureKind>,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct DutyCycle<L, P, C> {
    cfg: CycleConfig,
    link: L,
    sensors: SensorSuite,
    store: Box<dyn BaselineStore>,
    topics: Topics,
    power: P,
    clock: C,
    aggregator: WindowedAggregator,
    calibration: CalibrationScheduler,
    state: ControllerState,
}

impl<L, P, C> DutyCycle<L, P, C>
where
    L: Session + Telemetry,
    P: Power,
    C: Clock,
{
    /// The aggregation window and calibration timers start counting now.
    pub fn new(
        cfg: CycleConfig,
        link: L,
        sensors: SensorSuite,
        store: Box<dyn BaselineStore>,
        topics: Topics,
        power: P,
        clock: C,
    ) -> Self {
        let boot = clock.now_ms();
        Self {
            aggregator: WindowedAggregator::new(boot, cfg.window_ms),
            calibration: CalibrationScheduler::new(boot, cfg.calibration()),
            cfg,
            link,
            sensors,
            store,
            topics,
            power,
            clock,
            state: ControllerState::Bootstrapping,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn window(&self) -> WindowState {
        self.aggregator.state()
    }

    pub fn calibration(&self) -> &CalibrationScheduler {
        &self.calibration
    }

    fn enter(&mut self, next: ControllerState) {
        debug!(from = ?self.state, to = ?next, "controller state");
        self.state = next;
    }

    // -- Bootstrap --------------------------------------------------------

    /// Bring up the link and the sensors, seed the VOC baseline, then take
    /// the initial sleep.
    ///
    /// Only returns an error when the retry policy has a limit and it ran
    /// out; with no limit this blocks until everything is up.
    pub async fn bootstrap(&mut self) -> Result<(), Failure> {
        self.enter(ControllerState::Bootstrapping);

        self.establish_link().await?;
        info!("broker session established");

        let retry = self.cfg.retry;
        let power = &mut self.power;
        let s = &mut self.sensors;
        init_with_retry(power, retry, Source::Particulate, || s.particulate.init()).await?;
        init_with_retry(power, retry, Source::Climate, || s.climate.init()).await?;
        init_with_retry(power, retry, Source::Barometer, || s.barometer.init()).await?;
        init_with_retry(power, retry, Source::Voc, || s.voc.init()).await?;
        info!("sensors initialised");

        self.restore_baseline().await;

        self.power.sleep_seconds(self.cfg.initial_sleep_sec).await;
        self.enter(ControllerState::Ready);
        Ok(())
    }

    async fn establish_link(&mut self) -> Result<(), LinkError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.link.connect_network().await {
                Ok(()) => break,
                Err(e) => {
                    warn!(attempts, "network: {e}");
                    self.pause_before_retry(attempts).await?;
                }
            }
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.link.connect_broker().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempts, "broker: {e}");
                    self.pause_before_retry(attempts).await?;
                }
            }
        }
    }

    async fn pause_before_retry(&mut self, attempts: u32) -> Result<(), LinkError> {
        if self.cfg.retry.exhausted(attempts) {
            return Err(LinkError::RetriesExhausted(attempts));
        }
        self.power.sleep_seconds(self.cfg.retry.delay_seconds()).await;
        Ok(())
    }

    async fn restore_baseline(&mut self) {
        match self.store.load_baseline() {
            Ok(Some(baseline)) if baseline.is_valid() => {
                match self.sensors.voc.set_baseline(baseline) {
                    Ok(()) => info!(eco2 = baseline.eco2, tvoc = baseline.tvoc, "baseline restored"),
                    Err(e) => self.report(&Failure::from(e)).await,
                }
            }
            Ok(Some(_)) => warn!("stored baseline is zero, using factory defaults"),
            Ok(None) => info!("no stored baseline, using factory defaults"),
            Err(e) => self.report(&Failure::from(e)).await,
        }
    }

    // -- Steady state -----------------------------------------------------

    /// One wake cycle, including the sleep that ends it.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.enter(ControllerState::Sampling);
        let mut report = CycleReport::default();

        if !self.link.is_connected() {
            self.reconnect(&mut report).await;
        }

        let sample = self.acquire(&mut report).await;
        self.publish_sample(&sample, &mut report).await;

        let now = self.clock.now_ms();
        if let Some(pm) = sample.particulate {
            report.flush =
                self.aggregator
                    .ingest(u32::from(pm.pm2_5), u32::from(pm.pm10), now);
            if let Some(flush) = report.flush {
                info!(
                    index = flush.index,
                    samples = flush.samples,
                    pm25 = flush.pm25_avg,
                    pm10 = flush.pm10_avg,
                    "window flushed"
                );
                self.publish(&mut report, Metric::Caqi, Payload::Int(i64::from(flush.index)))
                    .await;
            }
        }

        self.calibrate(now, &sample, &mut report).await;

        self.enter(ControllerState::Idle);
        self.power.sleep_seconds(self.cfg.cycle_interval_sec).await;
        self.enter(ControllerState::Ready);
        report
    }

    /// Cycle forever.
    pub async fn run(&mut self) {
        loop {
            let report = self.run_cycle().await;
            info!(
                published = report.published.len(),
                failures = report.failures.len(),
                caqi = ?report.flush.map(|f| f.index),
                "cycle complete"
            );
        }
    }

    async fn reconnect(&mut self, report: &mut CycleReport) {
        let result = match self.link.connect_network().await {
            Ok(()) => self.link.connect_broker().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => info!("broker session re-established"),
            Err(e) => {
                // Nowhere to report this; the publishes below will fail too.
                warn!("reconnect failed: {e}");
                report.failures.push(FailureKind::Link);
            }
        }
    }

    async fn acquire(&mut self, report: &mut CycleReport) -> Sample {
        let particulate = self.sensors.particulate.acquire();
        let climate = self.sensors.climate.acquire();
        let barometer = self.sensors.barometer.acquire();
        let voc = self.sensors.voc.measure();

        Sample {
            particulate: self.keep(particulate, report).await,
            climate: self.keep(climate, report).await,
            barometer: self.keep(barometer, report).await,
            voc: self.keep(voc, report).await,
        }
    }

    async fn keep<T>(
        &mut self,
        result: Result<T, AcquisitionError>,
        report: &mut CycleReport,
    ) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.fail(report, e.into()).await;
                None
            }
        }
    }

    async fn publish_sample(&mut self, sample: &Sample, report: &mut CycleReport) {
        if let Some(t) = sample.temperature_c() {
            self.publish(report, Metric::Temperature, float(t, 1)).await;
        }
        if let Some(c) = sample.climate {
            self.publish(report, Metric::Humidity, float(c.humidity_pct, 0))
                .await;
        }
        if let Some(p) = sample.pressure_pa() {
            self.publish(report, Metric::Pressure, Payload::Int(i64::from(p)))
                .await;
        }
        if let Some(pm) = sample.particulate {
            self.publish(report, Metric::Pm01, Payload::Int(i64::from(pm.pm1_0)))
                .await;
            self.publish(report, Metric::Pm25, Payload::Int(i64::from(pm.pm2_5)))
                .await;
            self.publish(report, Metric::Pm100, Payload::Int(i64::from(pm.pm10)))
                .await;
        }
        if let Some(voc) = &sample.voc {
            match &voc.air {
                Ok(air) => {
                    self.publish(report, Metric::Eco2, Payload::Int(i64::from(air.eco2_ppm)))
                        .await;
                    self.publish(report, Metric::Tvoc, Payload::Int(i64::from(air.tvoc_ppb)))
                        .await;
                }
                Err(e) => self.fail(report, e.clone().into()).await,
            }
            self.publish(report, Metric::H2, Payload::Int(i64::from(voc.raw_h2)))
                .await;
            self.publish(report, Metric::Ethanol, Payload::Int(i64::from(voc.raw_ethanol)))
                .await;
        }
    }

    async fn calibrate(&mut self, now: Millis, sample: &Sample, report: &mut CycleReport) {
        let voc = &mut *self.sensors.voc;
        match self
            .calibration
            .persist_baseline(now, voc, &mut *self.store)
        {
            BaselineOutcome::NotDue => {}
            BaselineOutcome::Saved(_) | BaselineOutcome::Unavailable => {
                report.baseline_fired = true;
            }
            BaselineOutcome::Failed(e) => {
                report.baseline_fired = true;
                self.fail(report, e.into()).await;
            }
        }

        let voc = &mut *self.sensors.voc;
        match self
            .calibration
            .refresh_humidity(now, sample.climate_merged(), voc)
        {
            HumidityOutcome::NotDue | HumidityOutcome::NoSample => {}
            HumidityOutcome::Applied(_) => report.humidity_fired = true,
            HumidityOutcome::Failed(e) => {
                report.humidity_fired = true;
                self.fail(report, e.into()).await;
            }
        }
    }

    // -- Publishing -------------------------------------------------------

    async fn publish(&mut self, report: &mut CycleReport, metric: Metric, payload: Payload) {
        let topic = self.topics.of(metric);
        match self.link.publish(&topic, payload).await {
            Ok(()) => report.published.push(metric),
            Err(e) => self.fail(report, e.into()).await,
        }
    }

    async fn fail(&mut self, report: &mut CycleReport, failure: Failure) {
        report.failures.push(failure.kind());
        self.report(&failure).await;
    }

    /// Best effort: a report that cannot be delivered is logged and dropped.
    async fn report(&mut self, failure: &Failure) {
        warn!(kind = ?failure.kind(), "{failure}");
        let topic = self.topics.of(Metric::Error);
        let payload = ErrorReport::from_failure(failure).to_payload();
        if let Err(e) = self.link.publish(&topic, payload).await {
            debug!("error report dropped: {e}");
        }
    }
}

fn float(value: f32, precision: usize) -> Payload {
    Payload::Float { value, precision }
}

async fn init_with_retry<P: Power>(
    power: &mut P,
    retry: RetryPolicy,
    source: Source,
    mut init: impl FnMut() -> Result<(), AcquisitionError>,
) -> Result<(), AcquisitionError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match init() {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(%source, attempts, "init failed: {e}");
                if retry.exhausted(attempts) {
                    return Err(AcquisitionError::InitExhausted(source, attempts));
                }
                power.sleep_seconds(retry.delay_seconds()).await;
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
