use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::error::Result;
use crate::monitor::ChangeMonitor;
use crate::provider::DeviceProvider;
use crate::record::{DeviceRecord, Filter};
use crate::registry::{AncestorPolicy, DeviceRegistry};

/// Idle interval between polls when no knob overrides it.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(250);

/// Injectable sleep, so tests can simulate time instead of depending on
/// wall-clock sleeps.
pub trait Clock {
    fn sleep(&mut self, interval: Duration);
}

/// The real thing: `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, interval: Duration) {
        thread::sleep(interval);
    }
}

/// One observation handed to the caller's sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// A device present at scan time.
    Present(DeviceRecord),
    /// A matched device omitted from the snapshot for lack of a USB
    /// ancestor.
    Skipped(PathBuf),
    /// A live change event.
    Event(DeviceRecord),
    /// A pending event could not be read; the loop keeps going.
    ReceiveFailed,
}

/// Composition root: arms the monitor, scans the registry, reports the
/// initial snapshot, then polls the feed at a fixed cadence until stopped.
///
/// Single-threaded and lock-free; the only suspension point is the bounded
/// readiness wait, so control returns to the loop within one idle interval.
pub struct EventLoop<'p, P: DeviceProvider, C: Clock = SystemClock> {
    provider: &'p P,
    filter: Filter,
    policy: AncestorPolicy,
    idle: Duration,
    clock: C,
}

impl<'p, P: DeviceProvider> EventLoop<'p, P> {
    pub fn new(provider: &'p P, filter: Filter) -> Self {
        Self {
            provider,
            filter,
            policy: AncestorPolicy::default(),
            idle: DEFAULT_IDLE_INTERVAL,
            clock: SystemClock,
        }
    }
}

impl<'p, P: DeviceProvider, C: Clock> EventLoop<'p, P, C> {
    pub fn idle_interval(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    pub fn ancestor_policy(mut self, policy: AncestorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Swaps the sleep implementation.
    pub fn clock<C2: Clock>(self, clock: C2) -> EventLoop<'p, P, C2> {
        EventLoop {
            provider: self.provider,
            filter: self.filter,
            policy: self.policy,
            idle: self.idle,
            clock,
        }
    }

    /// Runs until `stop` is set.
    ///
    /// Startup order is the correctness invariant of the whole subsystem:
    /// the monitor subscription is enabled strictly before the scan, so any
    /// device matching the filter that attaches after this call begins shows
    /// up at least once, in the snapshot or on the feed.
    pub fn run<S>(mut self, stop: &AtomicBool, mut sink: S) -> Result<()>
    where
        S: FnMut(Report),
    {
        let mut monitor = ChangeMonitor::open(self.provider, &self.filter)?;

        let scan = DeviceRegistry::new(self.provider)
            .with_policy(self.policy)
            .scan(&self.filter)?;
        debug!(
            "initial scan: {} records, {} skipped",
            scan.records.len(),
            scan.skipped.len()
        );
        for record in scan.records {
            sink(Report::Present(record));
        }
        for syspath in scan.skipped {
            sink(Report::Skipped(syspath));
        }

        while !stop.load(Ordering::Relaxed) {
            if monitor.poll_readiness(Duration::ZERO)? {
                match monitor.try_receive() {
                    Some(record) => sink(Report::Event(record)),
                    None => {
                        warn!("monitor signaled readiness but no event could be read");
                        sink(Report::ReceiveFailed);
                    }
                }
            }
            // Idle regardless of whether an event was drained; the cadence
            // bounds CPU usage, not latency.
            self.clock.sleep(self.idle);
        }

        debug!("stop signal observed, closing monitor");
        monitor.close();
        Ok(())
    }
}
