//! libudev-backed implementation of the provider seam.
//!
//! Thin, purpose-shaped wrappers over the `libudev-sys` FFI: a ref-counted
//! [`Udev`] context, an [`Enumerator`] for one-shot scans, and a netlink
//! [`MonitorSocket`] for the change-event feed. All handles release their
//! underlying reference on drop, on every exit path.

use std::collections::BTreeMap;
use std::ffi::{CStr, CString, OsStr};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use libc::{c_char, c_int};
use libudev_sys as ffi;

use crate::error::{Error, Result};
use crate::provider::DeviceProvider;
use crate::record::Filter;

/// Null from a libudev allocator means ENOMEM.
macro_rules! try_alloc {
    ($exp:expr) => {{
        let ptr = $exp;

        if ptr.is_null() {
            return Err(std::io::Error::from_raw_os_error(libc::ENOMEM).into());
        }

        ptr
    }};
}

mod device;
mod enumerator;
mod monitor;

pub use device::{Device, Properties};
pub use enumerator::Enumerator;
pub use monitor::{MonitorBuilder, MonitorSocket};

/// Ref-counted handle to the opaque libudev context.
///
/// Every other wrapper holds a clone, so the context outlives whatever was
/// created from it regardless of drop order.
pub struct Udev {
    udev: *mut ffi::udev,
}

impl Clone for Udev {
    fn clone(&self) -> Self {
        Self {
            udev: unsafe { ffi::udev_ref(self.udev) },
        }
    }
}

impl Drop for Udev {
    fn drop(&mut self) {
        unsafe { ffi::udev_unref(self.udev) };
    }
}

impl Udev {
    /// Creates a new libudev context.
    pub fn new() -> io::Result<Self> {
        let ptr = unsafe { ffi::udev_new() };
        if ptr.is_null() {
            return Err(io::Error::from_raw_os_error(libc::ENOMEM));
        }
        Ok(Self { udev: ptr })
    }

    pub(crate) fn as_raw(&self) -> *mut ffi::udev {
        self.udev
    }
}

pub(crate) fn str_to_cstring(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| Error::InvalidName)
}

pub(crate) fn path_to_cstring(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| Error::InvalidName)
}

pub(crate) unsafe fn ptr_to_os_str<'a>(ptr: *const c_char) -> Option<&'a OsStr> {
    if ptr.is_null() {
        return None;
    }

    Some(ptr_to_os_str_unchecked(ptr))
}

pub(crate) unsafe fn ptr_to_os_str_unchecked<'a>(ptr: *const c_char) -> &'a OsStr {
    OsStr::from_bytes(CStr::from_ptr(ptr).to_bytes())
}

pub(crate) fn errno_to_result(errno: c_int) -> Result<()> {
    match errno {
        x if x >= 0 => Ok(()),
        e => Err(io::Error::from_raw_os_error(-e).into()),
    }
}

/// The real device subsystem: owns the [`Udev`] context consumed by both the
/// registry scan and the monitor subscription.
pub struct UdevProvider {
    udev: Udev,
}

impl UdevProvider {
    /// Acquires the libudev context. Failure here is fatal for the caller;
    /// nothing else can be constructed without the context.
    pub fn new() -> Result<Self> {
        Udev::new()
            .map(|udev| Self { udev })
            .map_err(Error::ProviderInit)
    }

    /// Looks up a single device by its `/dev` node path and returns its full
    /// udev property list.
    ///
    /// `Ok(None)` when the path is no device node, or when udev knows no
    /// device for its device number.
    pub fn lookup_by_devnode(&self, devnode: &Path) -> Result<Option<BTreeMap<String, String>>> {
        let cpath = path_to_cstring(devnode)?;

        let mut stat = std::mem::MaybeUninit::<libc::stat>::uninit();
        if unsafe { libc::stat(cpath.as_ptr(), stat.as_mut_ptr()) } < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let stat = unsafe { stat.assume_init() };

        let kind = match stat.st_mode & libc::S_IFMT {
            libc::S_IFBLK => b'b',
            libc::S_IFCHR => b'c',
            _ => return Ok(None),
        };

        let device = match Device::from_devnum(&self.udev, kind as c_char, stat.st_rdev) {
            Some(device) => device,
            None => return Ok(None),
        };

        let properties = device
            .properties()
            .map(|(name, value)| {
                (
                    name.to_string_lossy().into_owned(),
                    value.map_or_else(String::new, |v| v.to_string_lossy().into_owned()),
                )
            })
            .collect();
        Ok(Some(properties))
    }
}

impl DeviceProvider for UdevProvider {
    type Device = Device;
    type Monitor = MonitorSocket;

    fn enumerate(&self, filter: &Filter) -> Result<Vec<Device>> {
        let mut enumerator = Enumerator::new(&self.udev)?;
        enumerator.match_subsystem(&filter.subsystem)?;
        if let Some(devtype) = &filter.devtype {
            enumerator.match_property("DEVTYPE", devtype)?;
        }
        enumerator.scan_devices()
    }

    fn monitor(&self, filter: &Filter) -> Result<MonitorSocket> {
        let mut builder = MonitorBuilder::new(&self.udev)?;
        builder.match_subsystem_devtype(&filter.subsystem, filter.devtype.as_deref())?;
        builder.listen()
    }
}
