use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use libc::{c_char, dev_t};
use libudev_sys as ffi;

use super::{path_to_cstring, ptr_to_os_str, ptr_to_os_str_unchecked, str_to_cstring, Udev};
use crate::error::Result;
use crate::provider::HardwareDevice;

/// One kernel device, as materialized by libudev.
///
/// `udev_device` is ref-counted; cloning takes another reference and dropping
/// releases one, so instances can be passed around freely.
pub struct Device {
    udev: Udev,
    device: *mut ffi::udev_device,
}

impl Clone for Device {
    fn clone(&self) -> Self {
        Self {
            udev: self.udev.clone(),
            device: unsafe { ffi::udev_device_ref(self.device) },
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe { ffi::udev_device_unref(self.device) };
    }
}

impl Device {
    pub(crate) fn from_syspath(udev: &Udev, syspath: &Path) -> Result<Self> {
        let cpath = path_to_cstring(syspath)?;
        let ptr = try_alloc!(unsafe {
            ffi::udev_device_new_from_syspath(udev.as_raw(), cpath.as_ptr())
        });

        Ok(Self {
            udev: udev.clone(),
            device: ptr,
        })
    }

    /// Materializes the device with the given char/block device number, or
    /// `None` when udev knows no such device.
    pub(crate) fn from_devnum(udev: &Udev, kind: c_char, devnum: dev_t) -> Option<Self> {
        let ptr = unsafe { ffi::udev_device_new_from_devnum(udev.as_raw(), kind, devnum) };
        if ptr.is_null() {
            return None;
        }

        Some(Self {
            udev: udev.clone(),
            device: ptr,
        })
    }

    /// Takes ownership of an already-referenced `udev_device`.
    pub(crate) unsafe fn from_raw(udev: Udev, device: *mut ffi::udev_device) -> Self {
        Self { udev, device }
    }

    pub fn syspath(&self) -> &Path {
        Path::new(unsafe {
            ptr_to_os_str_unchecked(ffi::udev_device_get_syspath(self.device))
        })
    }

    pub fn devnode(&self) -> Option<&Path> {
        unsafe { ptr_to_os_str(ffi::udev_device_get_devnode(self.device)) }.map(Path::new)
    }

    pub fn subsystem(&self) -> Option<&OsStr> {
        unsafe { ptr_to_os_str(ffi::udev_device_get_subsystem(self.device)) }
    }

    pub fn devtype(&self) -> Option<&OsStr> {
        unsafe { ptr_to_os_str(ffi::udev_device_get_devtype(self.device)) }
    }

    /// The change that delivered this device on a monitor feed. `None` for
    /// enumerated devices.
    pub fn action(&self) -> Option<&OsStr> {
        unsafe { ptr_to_os_str(ffi::udev_device_get_action(self.device)) }
    }

    /// Reads a sysfs attribute of this device. The returned strings are
    /// UTF-8 encoded by libudev, even for USB descriptor strings.
    pub fn attribute_value(&self, attribute: &str) -> Option<&OsStr> {
        let attribute = str_to_cstring(attribute).ok()?;

        unsafe {
            ptr_to_os_str(ffi::udev_device_get_sysattr_value(
                self.device,
                attribute.as_ptr(),
            ))
        }
    }

    /// Walks up the device tree to the nearest ancestor matching the
    /// subsystem/devtype pair, which may be several levels up.
    pub fn parent_with_subsystem_devtype(
        &self,
        subsystem: &str,
        devtype: &str,
    ) -> Option<Self> {
        let subsystem = str_to_cstring(subsystem).ok()?;
        let devtype = str_to_cstring(devtype).ok()?;

        let ptr = unsafe {
            ffi::udev_device_get_parent_with_subsystem_devtype(
                self.device,
                subsystem.as_ptr(),
                devtype.as_ptr(),
            )
        };
        if ptr.is_null() {
            return None;
        }

        // The parent pointer is borrowed from the child; take our own
        // reference so the returned device owns it.
        Some(Self {
            udev: self.udev.clone(),
            device: unsafe { ffi::udev_device_ref(ptr) },
        })
    }

    /// Iterates the device's udev properties as `(name, value)` pairs.
    pub fn properties(&self) -> Properties<'_> {
        Properties {
            _device: self,
            entry: unsafe { ffi::udev_device_get_properties_list_entry(self.device) },
        }
    }
}

impl HardwareDevice for Device {
    fn syspath(&self) -> PathBuf {
        Device::syspath(self).to_path_buf()
    }

    fn devnode(&self) -> Option<PathBuf> {
        Device::devnode(self).map(Path::to_path_buf)
    }

    fn subsystem(&self) -> Option<String> {
        Device::subsystem(self).map(|s| s.to_string_lossy().into_owned())
    }

    fn devtype(&self) -> Option<String> {
        Device::devtype(self).map(|s| s.to_string_lossy().into_owned())
    }

    fn action(&self) -> Option<String> {
        Device::action(self).map(|s| s.to_string_lossy().into_owned())
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attribute_value(name)
            .map(|s| s.to_string_lossy().into_owned())
    }

    fn ancestor_with(&self, subsystem: &str, devtype: &str) -> Option<Self> {
        self.parent_with_subsystem_devtype(subsystem, devtype)
    }
}

/// Iterator over a device's udev property list.
pub struct Properties<'a> {
    _device: &'a Device,
    entry: *mut ffi::udev_list_entry,
}

impl<'a> Iterator for Properties<'a> {
    type Item = (&'a OsStr, Option<&'a OsStr>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.entry.is_null() {
            return None;
        }

        let name = unsafe { ptr_to_os_str_unchecked(ffi::udev_list_entry_get_name(self.entry)) };
        let value = unsafe { ptr_to_os_str(ffi::udev_list_entry_get_value(self.entry)) };

        self.entry = unsafe { ffi::udev_list_entry_get_next(self.entry) };

        Some((name, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }
}
