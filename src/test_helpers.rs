//! Scripted provider, feed, and clock used by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::Result;
use crate::event_loop::Clock;
use crate::provider::{DeviceProvider, EventFeed, HardwareDevice};
use crate::record::Filter;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FakeDevice {
    pub syspath: PathBuf,
    pub devnode: Option<PathBuf>,
    pub subsystem: Option<String>,
    pub devtype: Option<String>,
    pub action: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub parent: Option<Box<FakeDevice>>,
}

impl FakeDevice {
    /// A hidraw child device whose syspath mirrors its node name.
    pub fn hidraw(devnode: &str) -> Self {
        let name = Path::new(devnode).file_name().unwrap().to_string_lossy();
        Self {
            syspath: PathBuf::from(format!("/sys/class/hidraw/{name}")),
            devnode: Some(PathBuf::from(devnode)),
            subsystem: Some("hidraw".to_string()),
            ..Self::default()
        }
    }

    pub fn block(devnode: &str) -> Self {
        let name = Path::new(devnode).file_name().unwrap().to_string_lossy();
        Self {
            syspath: PathBuf::from(format!("/sys/block/{name}")),
            devnode: Some(PathBuf::from(devnode)),
            subsystem: Some("block".to_string()),
            devtype: Some("disk".to_string()),
            ..Self::default()
        }
    }

    /// A `usb`/`usb_device` parent carrying the given sysfs attributes.
    pub fn usb_ancestor(attributes: &[(&str, &str)]) -> Self {
        Self {
            syspath: PathBuf::from("/sys/bus/usb/devices/1-1"),
            subsystem: Some("usb".to_string()),
            devtype: Some("usb_device".to_string()),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_ancestor(mut self, ancestor: FakeDevice) -> Self {
        self.parent = Some(Box::new(ancestor));
        self
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }
}

impl HardwareDevice for FakeDevice {
    fn syspath(&self) -> PathBuf {
        self.syspath.clone()
    }

    fn devnode(&self) -> Option<PathBuf> {
        self.devnode.clone()
    }

    fn subsystem(&self) -> Option<String> {
        self.subsystem.clone()
    }

    fn devtype(&self) -> Option<String> {
        self.devtype.clone()
    }

    fn action(&self) -> Option<String> {
        self.action.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn ancestor_with(&self, subsystem: &str, devtype: &str) -> Option<Self> {
        let mut next = self.parent.as_deref();
        while let Some(parent) = next {
            if parent.subsystem.as_deref() == Some(subsystem)
                && parent.devtype.as_deref() == Some(devtype)
            {
                return Some(parent.clone());
            }
            next = parent.parent.as_deref();
        }
        None
    }
}

/// Scripted device subsystem: a fixed set of attached devices plus a shared
/// event queue that [`FakeFeed`] drains.
pub(crate) struct FakeProvider {
    devices: RefCell<Vec<FakeDevice>>,
    queue: Rc<RefCell<VecDeque<FakeDevice>>>,
    armed: Cell<bool>,
    calls: RefCell<Vec<&'static str>>,
    attach_mid_scan: RefCell<Option<FakeDevice>>,
    fail_next_receive: Rc<Cell<bool>>,
    receive_calls: Rc<Cell<usize>>,
}

impl FakeProvider {
    pub fn with_devices(devices: Vec<FakeDevice>) -> Self {
        Self {
            devices: RefCell::new(devices),
            queue: Rc::default(),
            armed: Cell::new(false),
            calls: RefCell::default(),
            attach_mid_scan: RefCell::default(),
            fail_next_receive: Rc::default(),
            receive_calls: Rc::default(),
        }
    }

    /// Queues a change event as if the kernel had just delivered it.
    pub fn emit(&self, device: FakeDevice) {
        self.queue.borrow_mut().push_back(device);
    }

    /// Scripts a device that attaches while the enumeration is in flight.
    /// Its event reaches the queue only if the monitor is already armed.
    pub fn attach_during_scan(&self, device: FakeDevice) {
        *self.attach_mid_scan.borrow_mut() = Some(device);
    }

    /// Makes the next `try_receive` fail even though readiness fired.
    pub fn fail_next_receive(&self) {
        self.fail_next_receive.set(true);
    }

    pub fn call_order(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.get()
    }
}

impl DeviceProvider for FakeProvider {
    type Device = FakeDevice;
    type Monitor = FakeFeed;

    fn enumerate(&self, filter: &Filter) -> Result<Vec<FakeDevice>> {
        self.calls.borrow_mut().push("enumerate");

        if let Some(device) = self.attach_mid_scan.borrow_mut().take() {
            // The device attached after enumeration walked past its slot, so
            // it is absent from the returned batch. Its event is only
            // observable if the subscription was enabled first.
            if self.armed.get() {
                self.queue.borrow_mut().push_back(device);
            }
        }

        Ok(self
            .devices
            .borrow()
            .iter()
            .filter(|d| {
                d.subsystem.as_deref() == Some(filter.subsystem.as_str())
                    && filter
                        .devtype
                        .as_ref()
                        .map_or(true, |dt| d.devtype.as_deref() == Some(dt.as_str()))
            })
            .cloned()
            .collect())
    }

    fn monitor(&self, _filter: &Filter) -> Result<FakeFeed> {
        self.calls.borrow_mut().push("monitor");
        self.armed.set(true);
        Ok(FakeFeed {
            queue: Rc::clone(&self.queue),
            fail_next: Rc::clone(&self.fail_next_receive),
            receive_calls: Rc::clone(&self.receive_calls),
        })
    }
}

pub(crate) struct FakeFeed {
    queue: Rc<RefCell<VecDeque<FakeDevice>>>,
    fail_next: Rc<Cell<bool>>,
    receive_calls: Rc<Cell<usize>>,
}

impl EventFeed for FakeFeed {
    type Device = FakeDevice;

    fn poll_readiness(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.fail_next.get() || !self.queue.borrow().is_empty())
    }

    fn try_receive(&mut self) -> Option<FakeDevice> {
        self.receive_calls.set(self.receive_calls.get() + 1);
        if self.fail_next.take() {
            return None;
        }
        self.queue.borrow_mut().pop_front()
    }
}

/// Virtual clock: records every sleep and raises the stop flag once the
/// scripted number of idle intervals has elapsed.
pub(crate) struct CountingClock<'a> {
    remaining: usize,
    stop: &'a AtomicBool,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl<'a> CountingClock<'a> {
    pub fn new(sleeps_allowed: usize, stop: &'a AtomicBool) -> Self {
        Self {
            remaining: sleeps_allowed,
            stop,
            sleeps: Rc::default(),
        }
    }

    pub fn sleeps(&self) -> Rc<RefCell<Vec<Duration>>> {
        Rc::clone(&self.sleeps)
    }
}

impl Clock for CountingClock<'_> {
    fn sleep(&mut self, interval: Duration) {
        self.sleeps.borrow_mut().push(interval);
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.stop.store(true, Ordering::Relaxed);
        }
    }
}
