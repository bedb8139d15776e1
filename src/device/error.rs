//! Error taxonomy for device open/close.
//!
//! Every variant maps to an errno so the C ABI can report it as a negative
//! return value.

use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use crate::device::DeviceId;

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

#[derive(Error, Debug)]
pub enum DeviceError {
    /// `id` is the raw index as requested, which may be negative when it
    /// arrives through the C ABI and so cannot be a [`DeviceId`].
    #[error("No accelerator node for device {id} at {}", .path.display())]
    DeviceNotFound { id: i64, path: PathBuf },

    #[error("Permission denied opening {}", .path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Device {id} unavailable: {reason}")]
    ResourceUnavailable { id: DeviceId, reason: String },

    #[error("Invalid device handle (fd {fd})")]
    InvalidHandle { fd: i32 },

    #[error("{} is not a character device", .path.display())]
    NotCharDevice { path: PathBuf },

    #[error("Device layer already configured")]
    AlreadyConfigured,

    #[error("Failed to close fd {fd}: {source}")]
    Close { fd: i32, source: Errno },

    #[error("I/O error on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl DeviceError {
    /// Positive errno equivalent of this error.
    pub fn errno(&self) -> i32 {
        let errno = match self {
            DeviceError::DeviceNotFound { .. } => Errno::ENOENT,
            DeviceError::PermissionDenied { .. } => Errno::EACCES,
            DeviceError::ResourceUnavailable { .. } => Errno::EBUSY,
            DeviceError::InvalidHandle { .. } => Errno::EBADF,
            DeviceError::NotCharDevice { .. } => Errno::ENOTTY,
            DeviceError::AlreadyConfigured => Errno::EALREADY,
            DeviceError::Close { source, .. } => *source,
            DeviceError::Io { source, .. } => {
                return source.raw_os_error().unwrap_or(Errno::EIO as i32)
            }
        };
        errno as i32
    }
}

/// Classify a failed `open(2)` on a device node.
pub(crate) fn map_open_error(id: DeviceId, path: PathBuf, err: io::Error) -> DeviceError {
    match err.raw_os_error().map(Errno::from_raw) {
        Some(Errno::ENOENT | Errno::ENODEV | Errno::ENXIO) => DeviceError::DeviceNotFound {
            id: id.into(),
            path,
        },
        Some(Errno::EACCES | Errno::EPERM) => DeviceError::PermissionDenied { path },
        Some(Errno::EBUSY | Errno::EAGAIN) => DeviceError::ResourceUnavailable {
            id,
            reason: format!("node busy ({err})"),
        },
        _ => DeviceError::Io { path, source: err },
    }
}

/// Classify a failed `close(2)`. The descriptor is gone either way.
pub(crate) fn map_close_error(fd: i32, errno: Errno) -> DeviceError {
    match errno {
        Errno::EBADF => DeviceError::InvalidHandle { fd },
        other => DeviceError::Close { fd, source: other },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os_err(errno: Errno) -> io::Error {
        io::Error::from_raw_os_error(errno as i32)
    }

    #[test]
    fn test_open_error_mapping() {
        let id = DeviceId::new(3);
        let path = PathBuf::from("/dev/accel/accel3");

        let err = map_open_error(id, path.clone(), os_err(Errno::ENOENT));
        assert!(matches!(err, DeviceError::DeviceNotFound { id: 3, .. }));

        let err = map_open_error(id, path.clone(), os_err(Errno::ENXIO));
        assert!(matches!(err, DeviceError::DeviceNotFound { .. }));

        let err = map_open_error(id, path.clone(), os_err(Errno::EPERM));
        assert!(matches!(err, DeviceError::PermissionDenied { .. }));

        let err = map_open_error(id, path.clone(), os_err(Errno::EACCES));
        assert!(matches!(err, DeviceError::PermissionDenied { .. }));
        assert_eq!(err.errno(), libc::EACCES);

        let err = map_open_error(id, path.clone(), os_err(Errno::EBUSY));
        assert!(matches!(err, DeviceError::ResourceUnavailable { .. }));

        let err = map_open_error(id, path, os_err(Errno::EIO));
        assert!(matches!(err, DeviceError::Io { .. }));
    }

    #[test]
    fn test_close_error_mapping() {
        assert!(matches!(
            map_close_error(7, Errno::EBADF),
            DeviceError::InvalidHandle { fd: 7 }
        ));
        assert!(matches!(
            map_close_error(7, Errno::EINTR),
            DeviceError::Close { fd: 7, .. }
        ));
    }

    #[test]
    fn test_errno_values() {
        let err = DeviceError::DeviceNotFound {
            id: 99,
            path: PathBuf::from("/dev/accel/accel99"),
        };
        assert_eq!(err.errno(), libc::ENOENT);
        assert_eq!(DeviceError::InvalidHandle { fd: 1 }.errno(), libc::EBADF);

        let err = DeviceError::Io {
            path: PathBuf::new(),
            source: io::Error::new(io::ErrorKind::Other, "synthetic"),
        };
        assert_eq!(err.errno(), libc::EIO);
    }
}
