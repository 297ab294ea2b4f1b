//! In-memory collaborators for unit tests.
//!
//! Every fake keeps its observable state behind `Rc` handles so a test can
//! hand the fake to the controller and still inspect it afterwards.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::clock::{Clock, Millis};
use crate::error::{AcquisitionError, LinkError, PersistenceError, PublishError, Source};
use crate::power::Power;
use crate::sensors::{
    AirValues, Barometer, BarometerReading, Baseline, ClimateReading, ClimateSensor,
    ParticulateReading, ParticulateSensor, VocReading, VocSensor,
};
use crate::storage::BaselineStore;
use crate::telemetry::{Payload, Session, Telemetry};

// ---------------------------------------------------------------------------
// Clock and power
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<Millis>>);

impl ManualClock {
    pub fn starting_at(ms: Millis) -> Self {
        Self(Rc::new(Cell::new(ms)))
    }

    pub fn set(&self, ms: Millis) {
        self.0.set(ms);
    }

    pub fn advance(&self, ms: Millis) {
        self.0.set(self.0.get().wrapping_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.0.get()
    }
}

/// Sleeping moves the shared clock forward instead of waiting.
#[derive(Debug, Clone)]
pub struct FakePower {
    clock: ManualClock,
    pub sleeps: Rc<RefCell<Vec<u32>>>,
}

impl FakePower {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            sleeps: Rc::default(),
        }
    }
}

impl Power for FakePower {
    async fn sleep_seconds(&mut self, seconds: u32) {
        self.sleeps.borrow_mut().push(seconds);
        self.clock.advance(seconds.wrapping_mul(1_000));
    }
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct FakeLink {
    pub connected: Rc<Cell<bool>>,
    /// Rendered payloads in publish order.
    pub published: Rc<RefCell<Vec<(String, String)>>>,
    pub network_attempts: Rc<Cell<u32>>,
    pub broker_attempts: Rc<Cell<u32>>,
    /// Attempts that fail before one succeeds; `u32::MAX` never succeeds.
    pub network_failures: u32,
    pub broker_failures: u32,
}

impl FakeLink {
    pub fn payloads_on(&self, topic: &str) -> Vec<String> {
        self.published
            .borrow()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl Session for FakeLink {
    async fn connect_network(&mut self) -> Result<(), LinkError> {
        self.network_attempts.set(self.network_attempts.get() + 1);
        if self.network_failures > 0 {
            self.network_failures -= 1;
            return Err(LinkError::Network("no carrier".into()));
        }
        Ok(())
    }

    async fn connect_broker(&mut self) -> Result<(), LinkError> {
        self.broker_attempts.set(self.broker_attempts.get() + 1);
        if self.broker_failures > 0 {
            self.broker_failures -= 1;
            return Err(LinkError::Broker("refused".into()));
        }
        self.connected.set(true);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }
}

impl Telemetry for FakeLink {
    async fn publish(&mut self, topic: &str, payload: Payload) -> Result<(), PublishError> {
        if !self.connected.get() {
            return Err(PublishError::NotConnected);
        }
        self.published
            .borrow_mut()
            .push((topic.to_string(), payload.render()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Sensor that plays back queued results, then repeats `steady` forever.
#[derive(Debug)]
pub struct Scripted<T> {
    source: Source,
    pub init_failures: u32,
    pub init_attempts: Rc<Cell<u32>>,
    pub queue: VecDeque<Result<T, AcquisitionError>>,
    pub steady: Option<T>,
}

impl<T: Copy> Scripted<T> {
    pub fn steady(source: Source, value: T) -> Self {
        Self {
            source,
            init_failures: 0,
            init_attempts: Rc::default(),
            queue: VecDeque::new(),
            steady: Some(value),
        }
    }

    pub fn broken(source: Source) -> Self {
        Self {
            source,
            init_failures: 0,
            init_attempts: Rc::default(),
            queue: VecDeque::new(),
            steady: None,
        }
    }

    fn try_init(&mut self) -> Result<(), AcquisitionError> {
        self.init_attempts.set(self.init_attempts.get() + 1);
        if self.init_failures > 0 {
            self.init_failures -= 1;
            return Err(AcquisitionError::Driver(self.source, "no ack".into()));
        }
        Ok(())
    }

    fn next(&mut self) -> Result<T, AcquisitionError> {
        if let Some(r) = self.queue.pop_front() {
            return r;
        }
        self.steady
            .ok_or(AcquisitionError::Timeout(self.source, 5_000))
    }
}

impl ParticulateSensor for Scripted<ParticulateReading> {
    fn init(&mut self) -> Result<(), AcquisitionError> {
        self.try_init()
    }
    fn acquire(&mut self) -> Result<ParticulateReading, AcquisitionError> {
        self.next()
    }
}

impl ClimateSensor for Scripted<ClimateReading> {
    fn init(&mut self) -> Result<(), AcquisitionError> {
        self.try_init()
    }
    fn acquire(&mut self) -> Result<ClimateReading, AcquisitionError> {
        self.next()
    }
}

impl Barometer for Scripted<BarometerReading> {
    fn init(&mut self) -> Result<(), AcquisitionError> {
        self.try_init()
    }
    fn acquire(&mut self) -> Result<BarometerReading, AcquisitionError> {
        self.next()
    }
}

#[derive(Debug, Default)]
pub struct FakeVoc {
    /// What the sensor reports as its current baseline.
    pub baseline: Option<Baseline>,
    /// Raw (H2, ethanol); `None` makes the whole measurement fail.
    pub raw: Option<(u16, u16)>,
    /// Derived values; `None` makes only the derived part fail.
    pub air: Option<AirValues>,
    pub fail_compensation: bool,
    pub applied_baseline: Rc<Cell<Option<Baseline>>>,
    pub compensation: Rc<Cell<Option<u32>>>,
    pub compensation_writes: Rc<Cell<u32>>,
}

impl FakeVoc {
    pub fn with_baseline(baseline: Baseline) -> Self {
        Self {
            baseline: Some(baseline),
            ..Self::default()
        }
    }

    pub fn healthy() -> Self {
        Self {
            raw: Some((13_000, 18_000)),
            air: Some(AirValues {
                tvoc_ppb: 12,
                eco2_ppm: 415,
            }),
            ..Self::default()
        }
    }
}

impl VocSensor for FakeVoc {
    fn init(&mut self) -> Result<(), AcquisitionError> {
        Ok(())
    }

    fn measure(&mut self) -> Result<VocReading, AcquisitionError> {
        let (raw_h2, raw_ethanol) = self
            .raw
            .ok_or(AcquisitionError::Timeout(Source::Voc, 1_000))?;
        Ok(VocReading {
            raw_h2,
            raw_ethanol,
            air: self
                .air
                .ok_or_else(|| AcquisitionError::Driver(Source::Voc, "crc mismatch".into())),
        })
    }

    fn baseline(&mut self) -> Option<Baseline> {
        self.baseline
    }

    fn set_baseline(&mut self, baseline: Baseline) -> Result<(), AcquisitionError> {
        self.applied_baseline.set(Some(baseline));
        Ok(())
    }

    fn set_humidity_compensation(&mut self, mg_per_m3: u32) -> Result<(), AcquisitionError> {
        if self.fail_compensation {
            return Err(AcquisitionError::Driver(Source::Voc, "nack".into()));
        }
        self.compensation.set(Some(mg_per_m3));
        self.compensation_writes.set(self.compensation_writes.get() + 1);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Baseline store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeStore {
    /// Returned by `load_baseline`.
    pub stored: Option<Baseline>,
    pub fail_loads: bool,
    pub fail_saves: bool,
    pub saved: Rc<RefCell<Vec<Baseline>>>,
}

impl BaselineStore for FakeStore {
    fn load_baseline(&mut self) -> Result<Option<Baseline>, PersistenceError> {
        if self.fail_loads {
            return Err(PersistenceError::Malformed("missing eco2 line".into()));
        }
        Ok(self.stored)
    }

    fn save_baseline(&mut self, baseline: Baseline) -> Result<(), PersistenceError> {
        if self.fail_saves {
            return Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only filesystem",
            )));
        }
        self.saved.borrow_mut().push(baseline);
        Ok(())
    }
}
