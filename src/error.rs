use std::io;
use std::path::PathBuf;

/// Errors surfaced by device scanning and monitoring.
///
/// Provider-level failures abort the run. Per-device failures during a scan
/// are isolated to that device, and per-event failures during monitoring are
/// isolated to that poll iteration; neither reaches this type unless the
/// caller opted into a fatal policy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The udev context could not be created. Nothing can run without it.
    #[error("failed to initialize the udev context: {0}")]
    ProviderInit(#[source] io::Error),

    /// A scanned device has no `usb`/`usb_device` ancestor. Only raised under
    /// [`AncestorPolicy::Fatal`](crate::AncestorPolicy::Fatal); the default
    /// policy skips the device instead.
    #[error("device {} has no usb ancestor", .syspath.display())]
    NoUsbAncestor { syspath: PathBuf },

    /// A subsystem, devtype, or attribute name contained an interior NUL and
    /// cannot cross the C boundary.
    #[error("name contains an interior NUL byte")]
    InvalidName,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
