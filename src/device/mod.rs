//! Accelerator device nodes and their handles.
//!
//! - [`node`]: node path resolution and discovery
//! - [`registry`]: per-device reference counting and access policy
//! - [`handle`]: owned handle to an open node
//! - [`manager`]: open/close entry points
//! - [`error`]: error taxonomy

pub mod error;
pub mod handle;
pub mod manager;
pub mod node;
pub mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use error::{DeviceError, DeviceResult};
pub use handle::DeviceHandle;
pub use manager::DeviceManager;

/// Index selecting one accelerator node, e.g. `3` for `/dev/accel/accel3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u32);

impl DeviceId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DeviceId {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

impl From<DeviceId> for i64 {
    fn from(id: DeviceId) -> Self {
        id.0 as i64
    }
}
