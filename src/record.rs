use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::provider::HardwareDevice;

/// Subsystem the owning ancestor of every matched device must belong to.
pub(crate) const USB_SUBSYSTEM: &str = "usb";
/// Devtype of that ancestor.
pub(crate) const USB_DEVTYPE: &str = "usb_device";

/// Sysfs attributes resolved from the USB ancestor of each matched device.
/// They correspond directly to files in the ancestor's `/sys` directory.
pub(crate) const USB_ATTRIBUTES: [&str; 5] =
    ["idVendor", "idProduct", "manufacturer", "product", "serial"];

/// Matching criteria applied both at scan time and at monitor-subscription
/// time.
///
/// The no-missed-event guarantee only holds when the monitor and the scan use
/// the same filter; [`EventLoop`](crate::EventLoop) takes a single `Filter`
/// for that reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub subsystem: String,
    pub devtype: Option<String>,
}

impl Filter {
    /// Creates a filter matching every device of the given kernel subsystem.
    pub fn subsystem<T: Into<String>>(subsystem: T) -> Self {
        Self {
            subsystem: subsystem.into(),
            devtype: None,
        }
    }

    /// Restricts the filter to a single devtype within the subsystem.
    pub fn with_devtype<T: Into<String>>(mut self, devtype: T) -> Self {
        self.devtype = Some(devtype.into());
        self
    }
}

/// Kind of change reported by the kernel for a monitored device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    Add,
    Remove,
    Change,
    Online,
    Offline,
    #[default]
    Unknown,
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        match value {
            "add" => Action::Add,
            "remove" => Action::Remove,
            "change" => Action::Change,
            "online" => Action::Online,
            "offline" => Action::Offline,
            _ => Action::Unknown,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Action::Add => "add",
            Action::Remove => "remove",
            Action::Change => "change",
            Action::Online => "online",
            Action::Offline => "offline",
            Action::Unknown => "unknown",
        })
    }
}

/// Immutable snapshot of one device's identity and attributes at the time it
/// was read.
///
/// Records carry no handle back to the provider; attribute resolution happens
/// eagerly at construction, so a record may freely outlive the scan or
/// monitor that produced it and is safe to share between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    /// The device's identity in `/sys`.
    pub syspath: PathBuf,
    /// Path to the device node under `/dev`, when the device has one.
    pub devnode: Option<PathBuf>,
    pub subsystem: Option<String>,
    pub devtype: Option<String>,
    /// Present only on change-feed records; always `None` on initial-scan
    /// records.
    pub action: Option<Action>,
    /// Attribute values read from the nearest `usb`/`usb_device` ancestor.
    /// A key whose resolution failed is absent, never a placeholder.
    pub attributes: BTreeMap<String, String>,
}

impl DeviceRecord {
    /// Builds an initial-scan record for `device`, resolving attributes
    /// against its already-located USB `ancestor`.
    pub(crate) fn from_snapshot<D: HardwareDevice>(device: &D, ancestor: &D) -> Self {
        Self {
            syspath: device.syspath(),
            devnode: device.devnode(),
            subsystem: device.subsystem(),
            devtype: device.devtype(),
            action: None,
            attributes: collect_attributes(ancestor),
        }
    }

    /// Builds a change-feed record for `device`.
    ///
    /// A remove event usually cannot resolve the ancestor chain any more, so
    /// an empty attribute map is not an error here.
    pub(crate) fn from_event<D: HardwareDevice>(device: &D) -> Self {
        let attributes = device
            .ancestor_with(USB_SUBSYSTEM, USB_DEVTYPE)
            .map(|ancestor| collect_attributes(&ancestor))
            .unwrap_or_default();

        Self {
            syspath: device.syspath(),
            devnode: device.devnode(),
            subsystem: device.subsystem(),
            devtype: device.devtype(),
            action: device.action().map(|a| Action::from(a.as_str())),
            attributes,
        }
    }
}

fn collect_attributes<D: HardwareDevice>(ancestor: &D) -> BTreeMap<String, String> {
    USB_ATTRIBUTES
        .iter()
        .filter_map(|name| {
            ancestor
                .attribute(name)
                .map(|value| (name.to_string(), value))
        })
        .collect()
}
