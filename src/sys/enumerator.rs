use std::path::Path;

use libudev_sys as ffi;

use super::{errno_to_result, ptr_to_os_str_unchecked, str_to_cstring, Device, Udev};
use crate::error::Result;

/// One-shot scan of `/sys` for devices matching the attached filters.
///
/// Filters are added with the `match_*` methods, then `scan_devices()`
/// performs the scan. The result is a point-in-time snapshot; create a new
/// `Enumerator` for a fresh one.
pub struct Enumerator {
    udev: Udev,
    enumerator: *mut ffi::udev_enumerate,
}

impl Drop for Enumerator {
    fn drop(&mut self) {
        unsafe { ffi::udev_enumerate_unref(self.enumerator) };
    }
}

impl Enumerator {
    pub fn new(udev: &Udev) -> Result<Self> {
        let ptr = try_alloc!(unsafe { ffi::udev_enumerate_new(udev.as_raw()) });

        Ok(Self {
            udev: udev.clone(),
            enumerator: ptr,
        })
    }

    /// Matches only devices of the given kernel subsystem.
    pub fn match_subsystem(&mut self, subsystem: &str) -> Result<()> {
        let subsystem = str_to_cstring(subsystem)?;

        errno_to_result(unsafe {
            ffi::udev_enumerate_add_match_subsystem(self.enumerator, subsystem.as_ptr())
        })
    }

    /// Matches only devices with the given udev property value. Devtype
    /// filtering at scan time goes through the `DEVTYPE` property.
    pub fn match_property(&mut self, property: &str, value: &str) -> Result<()> {
        let property = str_to_cstring(property)?;
        let value = str_to_cstring(value)?;

        errno_to_result(unsafe {
            ffi::udev_enumerate_add_match_property(
                self.enumerator,
                property.as_ptr(),
                value.as_ptr(),
            )
        })
    }

    /// Scans `/sys` and materializes every matching device, in the
    /// dependency order libudev reports them.
    pub fn scan_devices(&mut self) -> Result<Vec<Device>> {
        errno_to_result(unsafe { ffi::udev_enumerate_scan_devices(self.enumerator) })?;

        let mut devices = Vec::new();
        let mut entry = unsafe { ffi::udev_enumerate_get_list_entry(self.enumerator) };
        while !entry.is_null() {
            let syspath = Path::new(unsafe {
                ptr_to_os_str_unchecked(ffi::udev_list_entry_get_name(entry))
            });

            // A device can detach between listing and materialization; losing
            // it is isolated to that device, not the scan.
            if let Ok(device) = Device::from_syspath(&self.udev, syspath) {
                devices.push(device);
            }

            entry = unsafe { ffi::udev_list_entry_get_next(entry) };
        }

        Ok(devices)
    }
}
