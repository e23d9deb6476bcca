use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::ptr;
use std::time::Duration;

use libc::c_int;
use libudev_sys as ffi;

use super::{errno_to_result, str_to_cstring, Device, Udev};
use crate::error::Result;
use crate::provider::EventFeed;

struct MonitorHandle {
    udev: Udev,
    monitor: *mut ffi::udev_monitor,
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        unsafe { ffi::udev_monitor_unref(self.monitor) };
    }
}

/// Configures a change-event subscription before it starts receiving.
///
/// Events come from the `"udev"` netlink source, i.e. after udev has
/// processed them and the device node exists, rather than the earlier
/// `"kernel"` source.
pub struct MonitorBuilder {
    handle: MonitorHandle,
}

impl MonitorBuilder {
    pub fn new(udev: &Udev) -> Result<Self> {
        let ptr = try_alloc!(unsafe {
            ffi::udev_monitor_new_from_netlink(udev.as_raw(), c"udev".as_ptr())
        });

        Ok(Self {
            handle: MonitorHandle {
                udev: udev.clone(),
                monitor: ptr,
            },
        })
    }

    /// Filters delivered events by subsystem and, optionally, devtype.
    pub fn match_subsystem_devtype(
        &mut self,
        subsystem: &str,
        devtype: Option<&str>,
    ) -> Result<()> {
        let subsystem = str_to_cstring(subsystem)?;
        let devtype = devtype.map(str_to_cstring).transpose()?;

        errno_to_result(unsafe {
            ffi::udev_monitor_filter_add_match_subsystem_devtype(
                self.handle.monitor,
                subsystem.as_ptr(),
                devtype.as_ref().map_or(ptr::null(), |dt| dt.as_ptr()),
            )
        })
    }

    /// Enables receiving. Every matching event from this point on is queued
    /// on the socket, which is what makes subscribe-before-scan sound.
    pub fn listen(self) -> Result<MonitorSocket> {
        errno_to_result(unsafe { ffi::udev_monitor_enable_receiving(self.handle.monitor) })?;
        let fd = unsafe { ffi::udev_monitor_get_fd(self.handle.monitor) };

        Ok(MonitorSocket {
            handle: self.handle,
            fd,
        })
    }
}

/// An armed subscription delivering matching device events.
///
/// The underlying netlink socket is non-blocking, so receiving never stalls
/// the caller.
pub struct MonitorSocket {
    handle: MonitorHandle,
    fd: RawFd,
}

impl AsRawFd for MonitorSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl MonitorSocket {
    /// Reads one pending event, or `None` when nothing is queued or the read
    /// failed transiently.
    pub fn receive(&mut self) -> Option<Device> {
        let ptr = unsafe { ffi::udev_monitor_receive_device(self.handle.monitor) };
        if ptr.is_null() {
            return None;
        }

        Some(unsafe { Device::from_raw(self.handle.udev.clone(), ptr) })
    }
}

impl EventFeed for MonitorSocket {
    type Device = Device;

    fn poll_readiness(&mut self, timeout: Duration) -> Result<bool> {
        let mut fds = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX);

        let rc = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            // A signal during the wait is not an error; the caller polls
            // again on its next iteration.
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err.into());
        }

        Ok(rc > 0 && fds.revents & libc::POLLIN != 0)
    }

    fn try_receive(&mut self) -> Option<Device> {
        self.receive()
    }
}
