//! C ABI mirroring libane's `ane_device.h`:
//!
//! ```c
//! int  ane_device_open(int dev_id);
//! void ane_device_close(int fd);
//! ```
//!
//! Handles live in a process-global fd table so that closing a descriptor
//! this layer never issued, or one already closed, is detected instead of
//! closing an unrelated fd.

use std::os::fd::{AsRawFd, RawFd};
use std::os::raw::c_int;

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use tracing::{debug, warn};

use crate::config::DeviceConfig;
use crate::device::node;
use crate::device::{DeviceError, DeviceHandle, DeviceManager, DeviceResult};

static MANAGER: OnceCell<DeviceManager> = OnceCell::new();

static HANDLES: Lazy<DashMap<RawFd, DeviceHandle>> = Lazy::new(DashMap::new);

/// Install the configuration used by the C ABI.
///
/// Must run before the first `ane_device_open`; afterwards the default
/// configuration is already in place and this returns `AlreadyConfigured`.
pub fn configure(config: DeviceConfig) -> DeviceResult<()> {
    MANAGER
        .set(DeviceManager::new(config))
        .map_err(|_| DeviceError::AlreadyConfigured)
}

/// The process-global manager behind the C ABI.
pub fn manager() -> &'static DeviceManager {
    MANAGER.get_or_init(|| DeviceManager::new(DeviceConfig::default()))
}

/// Open device `dev_id` and return its raw fd.
pub fn open_fd(dev_id: i32) -> DeviceResult<RawFd> {
    let mgr = manager();
    let id = u32::try_from(dev_id).map_err(|_| DeviceError::DeviceNotFound {
        id: dev_id.into(),
        path: node::index_path(mgr.config(), dev_id.into()),
    })?;

    let handle = mgr.open(id)?;
    let fd = handle.as_raw_fd();
    if let Some(stale) = HANDLES.insert(fd, handle) {
        // The caller closed `fd` without going through this layer and the
        // kernel reused the number; the stale entry must not close it again.
        warn!(fd, device = %stale.id(), "Descriptor closed outside ane_device_close");
        stale.abandon();
    }
    Ok(fd)
}

/// Close an fd returned by [`open_fd`].
///
/// Unknown or already-closed descriptors yield `InvalidHandle` and are left
/// untouched.
pub fn close_fd(fd: RawFd) -> DeviceResult<()> {
    let (_, handle) = HANDLES
        .remove(&fd)
        .ok_or(DeviceError::InvalidHandle { fd })?;
    handle.close()
}

/// Number of descriptors currently issued through the C ABI.
pub fn open_fds() -> usize {
    HANDLES.len()
}

/// Close every descriptor still issued through the C ABI.
///
/// Returns how many were released. Close errors are logged; the descriptors
/// are gone regardless.
pub fn close_all() -> usize {
    let fds: Vec<RawFd> = HANDLES.iter().map(|e| *e.key()).collect();
    let mut closed = 0;
    for fd in fds {
        let Some((_, handle)) = HANDLES.remove(&fd) else {
            continue;
        };
        if let Err(e) = handle.close() {
            warn!(fd, error = %e, "Close failed during cleanup");
        }
        closed += 1;
    }
    debug!(closed, "Released all C ABI handles");
    closed
}

/// Open accelerator `dev_id`. Returns the fd, or a negative errno.
#[no_mangle]
pub extern "C" fn ane_device_open(dev_id: c_int) -> c_int {
    match open_fd(dev_id) {
        Ok(fd) => fd,
        Err(e) => {
            warn!(dev_id, error = %e, "ane_device_open failed");
            -e.errno()
        }
    }
}

/// Close an fd returned by `ane_device_open`.
#[no_mangle]
pub extern "C" fn ane_device_close(fd: c_int) {
    if let Err(e) = close_fd(fd) {
        warn!(fd, error = %e, "ane_device_close failed");
    }
}
