use crate::{
    Action, BatteryPolicy, Clock, ConversionMap, MetricId, MonitorConfig, MonitorError,
    MonitorMetrics, Normalized, PendingTracker, SystemClock, Tracker,
};
use device_inventory::{DeviceCapability, Inventory, Reading};
use influx_sink::{
    retry_write, BatchConfig, BatchPoints, FieldValue, Point, PointWriter, Precision, RetryPolicy,
};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::{error, info, warn};

pub const SOURCE_TAG_DEFAULT: &str = "docker";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Nothing new to write this cycle.
    #[default]
    NotAttempted,
    Written { points: usize, attempts: u32 },
    Failed { attempts: u32 },
}

/// What one poll cycle saw and did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleReport {
    pub listing_failed: bool,
    /// (device, component, capability) triples listed.
    pub items: usize,
    /// Triples whose status query failed.
    pub failed_items: usize,
    pub ignored: usize,
    pub dropped: usize,
    pub decisions: Vec<(MetricId, Action)>,
    pub write: WriteOutcome,
}

impl CycleReport {
    pub fn action(&self, instance: &str, key: &str) -> Option<Action> {
        self.decisions
            .iter()
            .find(|(id, _)| id.instance == instance && id.key == key)
            .map(|(_, a)| *a)
    }

    pub fn count(&self, action: Action) -> usize {
        self.decisions.iter().filter(|(_, a)| *a == action).count()
    }
}

enum Outcome {
    Ignored,
    Dropped,
    Decided(MetricId, Action),
}

/// The polling loop: one inventory, one writer, one in-memory tracker.
pub struct Monitor<I, W, C = SystemClock> {
    inventory: I,
    writer: W,
    clock: C,
    config: MonitorConfig,
    conversions: ConversionMap,
    battery: BatteryPolicy,
    retry: RetryPolicy,
    tracker: Tracker,
    metrics: MonitorMetrics,
}

impl<I: Inventory, W: PointWriter> Monitor<I, W, SystemClock> {
    pub fn new(config: MonitorConfig, inventory: I, writer: W) -> Result<Self, MonitorError> {
        Self::with_clock(config, inventory, writer, SystemClock)
    }
}

impl<I: Inventory, W: PointWriter, C: Clock> Monitor<I, W, C> {
    pub fn with_clock(
        config: MonitorConfig,
        inventory: I,
        writer: W,
        clock: C,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            inventory,
            writer,
            clock,
            conversions: ConversionMap::from_config(&config.valuemap),
            battery: BatteryPolicy::with_stale_hours(config.battery_stale_hours),
            retry: config.retry.policy(),
            tracker: Tracker::new(),
            metrics: MonitorMetrics::new()?,
            config,
        })
    }

    /// Override the write retry policy from the config.
    pub fn set_retry_policy(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }

    pub fn inventory_mut(&mut self) -> &mut I {
        &mut self.inventory
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn metrics(&self) -> &MonitorMetrics {
        &self.metrics
    }

    /// Poll forever. The interval sleep is skipped before the first cycle.
    pub fn run(&mut self) -> ! {
        info!(
            "monitoring ({}) every {}s into '{}'",
            self.config.metrics.join(", "),
            self.config.interval,
            self.config.database
        );
        let mut first = true;
        loop {
            self.tick(&mut first);
        }
    }

    /// Same schedule as [`Monitor::run`], stopping after `cycles` polls.
    pub fn run_cycles(&mut self, cycles: u64) -> Vec<CycleReport> {
        let mut first = true;
        (0..cycles).map(|_| self.tick(&mut first)).collect()
    }

    fn tick(&mut self, first: &mut bool) -> CycleReport {
        if !*first {
            self.clock.sleep(self.config.interval());
        }
        *first = false;
        self.run_cycle()
    }

    /// One poll: list, evaluate every reading, write the batch, commit.
    pub fn run_cycle(&mut self) -> CycleReport {
        self.metrics.cycles.inc();
        let mut report = CycleReport::default();

        let items = match self
            .inventory
            .devices_with_capabilities(&self.config.metrics)
        {
            Ok(items) => items,
            Err(e) => {
                error!("could not list devices: {}", e);
                report.listing_failed = true;
                return report;
            }
        };
        if items.is_empty() {
            error!(
                "no devices with any of the metrics: ({})",
                self.config.metrics.join(", ")
            );
            return report;
        }
        report.items = items.len();

        let mut batch = match BatchPoints::new(BatchConfig::new(
            self.config.database.clone(),
            Precision::Seconds,
        )) {
            Ok(batch) => batch,
            Err(e) => {
                error!("could not create batch: {}", e);
                return report;
            }
        };
        let mut pending = PendingTracker::new();

        for (i, item) in items.iter().enumerate() {
            let status = match self.inventory.device_status(item) {
                Ok(status) => status,
                Err(e) => {
                    error!(
                        "{:3}: could not get status of {} {}: {}",
                        i,
                        item.label(),
                        item.capability.id,
                        e
                    );
                    report.failed_items += 1;
                    continue;
                }
            };
            for (key, reading) in status {
                match self.evaluate(i, item, &key, reading, &mut batch, &mut pending) {
                    Outcome::Ignored => report.ignored += 1,
                    Outcome::Dropped => {
                        self.metrics.readings_dropped.inc();
                        report.dropped += 1;
                    }
                    Outcome::Decided(id, action) => {
                        if action == Action::Skipped {
                            self.metrics.readings_skipped.inc();
                        }
                        report.decisions.push((id, action));
                    }
                }
            }
        }

        report.write = self.commit(batch, pending);
        report
    }

    fn evaluate(
        &self,
        i: usize,
        item: &DeviceCapability,
        key: &str,
        reading: Reading,
        batch: &mut BatchPoints,
        pending: &mut PendingTracker,
    ) -> Outcome {
        let label = item.label();
        let capability = &item.capability.id;
        if self.config.ignore.iter().any(|k| k == key) {
            info!(
                "{:3}: {:<22} {:<27} {} is in ignore list, skipping",
                i, label, capability, key
            );
            return Outcome::Ignored;
        }
        if reading.value.is_absent() {
            warn!("{:3}: {:<22} {:<27} {} got no value", i, label, capability, key);
            return Outcome::Dropped;
        }

        let now = self.clock.now();
        let (values, ts) = match self.battery.check(item, &reading, now) {
            Some(dead) => {
                warn!("likely dead battery on {} ({:?})", label, dead.reason);
                (Normalized::zeroed(), dead.timestamp)
            }
            None => match self.conversions.normalize(key, &reading.value) {
                Ok(values) => (values, reading.timestamp),
                Err(e) => {
                    error!("{:3}: could not convert {:<22} {:<27}: {}", i, label, capability, e);
                    return Outcome::Dropped;
                }
            },
        };

        let id = MetricId::new(item.instance_id(), key);
        let decision = self.tracker.decide(&id, ts, now, self.config.interval);
        info!(
            "{:3}: {:<22} {:<27} {}: {:7} time: {} value: {:>12}{} number: {:4.1} binary: {:2}",
            i,
            label,
            capability,
            item.component,
            decision.action,
            decision.timestamp,
            values.value,
            reading.unit,
            values.float,
            values.binary
        );

        if decision.action == Action::Skipped {
            pending.record(id.clone(), decision.timestamp);
            return Outcome::Decided(id, Action::Skipped);
        }

        match self.build_point(item, key, &reading.unit, values, decision.timestamp) {
            Ok(point) => {
                batch.add_point(point);
                pending.record(id.clone(), decision.timestamp);
                Outcome::Decided(id, decision.action)
            }
            Err(e) => {
                error!("could not create point: {}", e);
                Outcome::Dropped
            }
        }
    }

    fn build_point(
        &self,
        item: &DeviceCapability,
        key: &str,
        unit: &str,
        values: Normalized,
        timestamp: OffsetDateTime,
    ) -> influx_sink::Result<Point> {
        let health = item.device.health.state.as_str().to_string();
        let tags = BTreeMap::from([
            ("deviceId".to_string(), item.instance_id()),
            ("deviceName".to_string(), item.label()),
            ("component".to_string(), item.component.clone()),
            ("capability".to_string(), item.capability.id.clone()),
            ("health".to_string(), health.clone()),
            ("unit".to_string(), unit.to_string()),
            ("source".to_string(), self.config.source.clone()),
        ]);
        let fields = BTreeMap::from([
            ("value".to_string(), values.value),
            ("valueFloat".to_string(), FieldValue::Float(values.float)),
            ("valueBinary".to_string(), FieldValue::Integer(values.binary)),
            ("health".to_string(), FieldValue::Str(health)),
        ]);
        Point::new(key, tags, fields, timestamp)
    }

    /// Write the batch; on success the pending timestamps become the tracker.
    fn commit(&mut self, batch: BatchPoints, pending: PendingTracker) -> WriteOutcome {
        if batch.is_empty() {
            info!("no new read since last update");
            return WriteOutcome::NotAttempted;
        }
        match retry_write(&mut self.writer, &batch, &self.retry) {
            Ok(attempts) => {
                info!(
                    "record saved: {} point(s) to '{}' after {} attempt(s)",
                    batch.len(),
                    batch.database(),
                    attempts
                );
                self.metrics.points_written.inc_by(batch.len() as u64);
                self.tracker.commit(pending);
                self.metrics.tracked_metrics.set(self.tracker.len() as i64);
                WriteOutcome::Written {
                    points: batch.len(),
                    attempts,
                }
            }
            Err(e) => {
                error!("error writing points: {}", e);
                self.metrics.write_failures.inc();
                WriteOutcome::Failed {
                    attempts: e.attempts,
                }
            }
        }
    }
}
