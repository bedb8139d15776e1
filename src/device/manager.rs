//! Device handle manager: the open/close entry points.
//!
//! A manager owns one configuration and one registry. Handles it returns keep
//! the registry alive, so they may outlive the manager itself.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{AccessPolicy, DeviceConfig};
use crate::device::error::DeviceResult;
use crate::device::handle::DeviceHandle;
use crate::device::node::{self, DeviceInfo};
use crate::device::registry::{Registry, RegistryStats};
use crate::device::DeviceId;

pub struct DeviceManager {
    config: Arc<DeviceConfig>,
    registry: Arc<Registry>,
}

impl DeviceManager {
    /// Create a manager for the given device configuration.
    pub fn new(config: DeviceConfig) -> Self {
        let registry = Arc::new(Registry::new(config.access_policy));
        info!(
            device_dir = %config.device_dir.display(),
            prefix = %config.node_prefix,
            policy = ?config.access_policy,
            "Device manager ready"
        );
        Self {
            config: Arc::new(config),
            registry,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn policy(&self) -> AccessPolicy {
        self.registry.policy()
    }

    /// Open the accelerator node with the given index.
    ///
    /// Fails with `DeviceNotFound`, `PermissionDenied` or `ResourceUnavailable`
    /// without leaving any descriptor or registry reference behind.
    pub fn open(&self, index: u32) -> DeviceResult<DeviceHandle> {
        self.open_device(DeviceId::new(index))
    }

    /// [`open`](Self::open) taking a [`DeviceId`].
    pub fn open_device(&self, id: DeviceId) -> DeviceResult<DeviceHandle> {
        let (file, slot) = self
            .registry
            .acquire(id, || node::open_node(&self.config, id))?;
        let path = node::node_path(&self.config, id);
        debug!(device = %id, open = self.registry.open_count(id), "Device handle issued");
        Ok(DeviceHandle::new(id, path, file, slot))
    }

    /// Release `handle`. Equivalent to [`DeviceHandle::close`].
    pub fn close(&self, handle: DeviceHandle) -> DeviceResult<()> {
        handle.close()
    }

    /// Nodes present on the host.
    pub fn devices(&self) -> DeviceResult<Vec<DeviceInfo>> {
        node::discover(&self.config)
    }

    /// Handles currently open on `id` through this manager.
    pub fn open_count(&self, index: u32) -> usize {
        self.registry.open_count(DeviceId::new(index))
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }
}
