//! Filtered device snapshots and live hotplug monitoring on top of libudev.
//!
//! The crate separates *what the kernel exposes* from *how it is consumed*:
//! [`DeviceRegistry`] takes a one-shot, filtered snapshot of attached
//! devices, [`ChangeMonitor`] delivers add/remove/change events for the same
//! filter, and [`EventLoop`] composes the two in the only order that cannot
//! miss a device: subscribe first, scan second. Both talk to the platform
//! through the [`DeviceProvider`] seam; the libudev implementation lives in
//! [`sys`], and tests substitute fakes.

pub use crate::error::{Error, Result};
pub use crate::event_loop::{Clock, EventLoop, Report, SystemClock, DEFAULT_IDLE_INTERVAL};
pub use crate::monitor::{ChangeMonitor, MonitorState};
pub use crate::provider::{DeviceProvider, EventFeed, HardwareDevice};
pub use crate::record::{Action, DeviceRecord, Filter};
pub use crate::registry::{AncestorPolicy, DeviceRegistry, Scan};
pub use crate::sys::{Device, Enumerator, MonitorBuilder, MonitorSocket, Udev, UdevProvider};

mod error;
mod event_loop;
mod monitor;
mod provider;
mod record;
mod registry;
pub mod sys;

#[cfg(test)]
pub(crate) mod test_helpers;
