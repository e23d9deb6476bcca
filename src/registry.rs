use std::path::PathBuf;

use log::warn;

use crate::error::{Error, Result};
use crate::provider::{DeviceProvider, HardwareDevice};
use crate::record::{DeviceRecord, Filter, USB_DEVTYPE, USB_SUBSYSTEM};

/// What to do with a matched device that has no `usb`/`usb_device` ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AncestorPolicy {
    /// Omit the device from the result, log a warning, and report its syspath
    /// in [`Scan::skipped`]. The default.
    #[default]
    Skip,
    /// Abort the whole scan with [`Error::NoUsbAncestor`].
    Fatal,
}

/// Result of one registry scan.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    /// One record per matched device with a resolved USB ancestor, in the
    /// order the provider reported them.
    pub records: Vec<DeviceRecord>,
    /// Syspaths of matched devices omitted under [`AncestorPolicy::Skip`].
    pub skipped: Vec<PathBuf>,
}

/// Produces complete, filtered snapshots of currently attached devices.
///
/// For every matched device the registry walks the ancestor chain to the
/// nearest `usb`/`usb_device` parent and resolves the USB identity attributes
/// against that ancestor, not against the matched device itself.
pub struct DeviceRegistry<'p, P> {
    provider: &'p P,
    policy: AncestorPolicy,
}

impl<'p, P: DeviceProvider> DeviceRegistry<'p, P> {
    pub fn new(provider: &'p P) -> Self {
        Self {
            provider,
            policy: AncestorPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AncestorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Scans all attached devices matching `filter`.
    ///
    /// Per-device failures are isolated: a device the provider could not
    /// materialize is dropped from the batch, and an ancestor-less device is
    /// handled per the configured [`AncestorPolicy`]. Neither aborts the
    /// remaining scan.
    pub fn scan(&self, filter: &Filter) -> Result<Scan> {
        let mut scan = Scan::default();

        for device in self.provider.enumerate(filter)? {
            match device.ancestor_with(USB_SUBSYSTEM, USB_DEVTYPE) {
                Some(ancestor) => {
                    scan.records
                        .push(DeviceRecord::from_snapshot(&device, &ancestor));
                }
                None => {
                    let syspath = device.syspath();
                    if self.policy == AncestorPolicy::Fatal {
                        return Err(Error::NoUsbAncestor { syspath });
                    }
                    warn!(
                        "skipping {}: no usb ancestor found",
                        syspath.display()
                    );
                    scan.skipped.push(syspath);
                }
            }
        }

        Ok(scan)
    }
}
