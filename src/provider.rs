//! Seam between the scanning/monitoring core and the platform device
//! subsystem.
//!
//! The core never talks to libudev directly; it goes through these traits so
//! an embedding host (or a test) can substitute its own device source. The
//! real implementation lives in [`sys`](crate::sys).

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::record::Filter;

/// One enumerable, attributed, hierarchical device as exposed by the
/// platform.
///
/// All accessors are read-only snapshots of the device's current state; none
/// of them mutate the underlying subsystem.
pub trait HardwareDevice {
    /// The device's identity path in `/sys`.
    fn syspath(&self) -> PathBuf;

    /// Path to the device node in `/dev`, for devices that have one.
    fn devnode(&self) -> Option<PathBuf>;

    fn subsystem(&self) -> Option<String>;

    fn devtype(&self) -> Option<String>;

    /// The change that produced this device, for event-feed devices. Always
    /// `None` for enumerated devices.
    fn action(&self) -> Option<String>;

    /// Reads the named sysfs attribute, or `None` if the device does not
    /// carry it.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Walks upward through the device tree and returns the nearest ancestor
    /// matching both criteria, if any.
    fn ancestor_with(&self, subsystem: &str, devtype: &str) -> Option<Self>
    where
        Self: Sized;
}

/// An armed change-event subscription.
///
/// Implementations must already be receiving when handed out by
/// [`DeviceProvider::monitor`], so that no event between subscription and the
/// first poll is lost.
pub trait EventFeed {
    type Device: HardwareDevice;

    /// Bounded readiness check on the underlying event source. A zero
    /// timeout never blocks.
    fn poll_readiness(&mut self, timeout: Duration) -> Result<bool>;

    /// Reads at most one pending event. Returns `None` when nothing is
    /// pending, or when the read failed for a transient reason.
    fn try_receive(&mut self) -> Option<Self::Device>;
}

/// The owned device-subsystem resource, shared by scanning and monitoring.
///
/// Construction failure is fatal
/// ([`Error::ProviderInit`](crate::Error::ProviderInit)); everything after
/// that only borrows the provider.
pub trait DeviceProvider {
    type Device: HardwareDevice;
    type Monitor: EventFeed<Device = Self::Device>;

    /// Scans currently attached devices matching `filter`. The result is a
    /// point-in-time snapshot; call again for a fresh one.
    fn enumerate(&self, filter: &Filter) -> Result<Vec<Self::Device>>;

    /// Opens and arms a change-event subscription for `filter`.
    fn monitor(&self, filter: &Filter) -> Result<Self::Monitor>;
}
