//! Owned handle to an open accelerator node.
//!
//! The handle is the only owner of its file descriptor. `close` consumes it,
//! so a closed handle cannot be used or closed again; dropping an unclosed
//! handle releases it the same way.

use std::fmt;
use std::fs::File;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, RawFd};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::device::error::{map_close_error, DeviceResult};
use crate::device::registry::RegistrySlot;
use crate::device::DeviceId;

pub struct DeviceHandle {
    id: DeviceId,
    path: PathBuf,
    // Field order matters on drop: the fd (and its flock) is closed before
    // the registry slot is freed.
    file: File,
    slot: RegistrySlot,
}

impl DeviceHandle {
    pub(crate) fn new(id: DeviceId, path: PathBuf, file: File, slot: RegistrySlot) -> Self {
        Self {
            id,
            path,
            file,
            slot,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the node, reporting any error from `close(2)`.
    ///
    /// The descriptor is released even when an error is returned.
    pub fn close(self) -> DeviceResult<()> {
        let DeviceHandle { id, file, slot, .. } = self;
        let fd = file.into_raw_fd();
        let closed = nix::unistd::close(fd).map_err(|errno| map_close_error(fd, errno));
        drop(slot);
        closed?;

        debug!(device = %id, fd, "Closed node");
        Ok(())
    }

    /// Give up the handle without closing its fd number.
    ///
    /// For descriptors the caller already closed behind our back: the number
    /// may since have been reused by an unrelated open, so only the registry
    /// slot is freed.
    pub(crate) fn abandon(self) {
        let DeviceHandle { id, file, slot, .. } = self;
        let fd = file.into_raw_fd();
        drop(slot);
        debug!(device = %id, fd, "Abandoned device handle without closing its fd");
    }
}

impl AsFd for DeviceHandle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for DeviceHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("fd", &self.file.as_raw_fd())
            .finish()
    }
}
