//! Process-wide registry of open device handles.
//!
//! Tracks how many handles are live per device so the access policy can be
//! enforced before touching the OS, and keeps lifetime counters for stats.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::config::AccessPolicy;
use crate::device::error::{DeviceError, DeviceResult};
use crate::device::DeviceId;

/// Per-device bookkeeping.
#[derive(Debug, Default)]
struct NodeEntry {
    /// Handles currently open.
    live: usize,

    /// Successful opens since the entry was created.
    opens: u64,
}

/// Snapshot of registry counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total_opens: u64,
    pub total_closes: u64,
    pub failed_opens: u64,
    pub active_handles: usize,
}

/// One held reference in a [`Registry`], released on drop.
#[derive(Debug)]
pub struct RegistrySlot {
    registry: Arc<Registry>,
    id: DeviceId,
}

impl Drop for RegistrySlot {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

/// Reference-counted registry keyed by device.
#[derive(Debug)]
pub struct Registry {
    entries: DashMap<DeviceId, NodeEntry>,
    policy: AccessPolicy,
    total_opens: AtomicU64,
    total_closes: AtomicU64,
    failed_opens: AtomicU64,
}

impl Registry {
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
            total_opens: AtomicU64::new(0),
            total_closes: AtomicU64::new(0),
            failed_opens: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    /// Reserve a slot for `id`, then run `open` without holding any lock.
    ///
    /// The policy check and the reservation happen atomically under the
    /// device's entry lock; a failed `open` rolls the reservation back, so it
    /// leaves no reference behind. Under `Exclusive`, a reservation whose open
    /// is still in flight already counts as held.
    pub fn acquire<T>(
        self: &Arc<Self>,
        id: DeviceId,
        open: impl FnOnce() -> DeviceResult<T>,
    ) -> DeviceResult<(T, RegistrySlot)> {
        if let Err(e) = self.reserve(id) {
            self.failed_opens.fetch_add(1, Ordering::Relaxed);
            debug!(device = %id, error = %e, "Open refused");
            return Err(e);
        }

        match open() {
            Ok(value) => {
                if let Some(mut node) = self.entries.get_mut(&id) {
                    node.opens += 1;
                }
                self.total_opens.fetch_add(1, Ordering::Relaxed);
                let slot = RegistrySlot {
                    registry: Arc::clone(self),
                    id,
                };
                Ok((value, slot))
            }
            Err(e) => {
                self.drop_ref(id);
                self.failed_opens.fetch_add(1, Ordering::Relaxed);
                debug!(device = %id, error = %e, "Open failed");
                Err(e)
            }
        }
    }

    fn reserve(&self, id: DeviceId) -> DeviceResult<()> {
        match self.entries.entry(id) {
            Entry::Occupied(mut occupied) => {
                if self.policy == AccessPolicy::Exclusive && occupied.get().live > 0 {
                    return Err(DeviceError::ResourceUnavailable {
                        id,
                        reason: "already open in this process (exclusive)".to_string(),
                    });
                }
                occupied.get_mut().live += 1;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(NodeEntry { live: 1, opens: 0 });
            }
        }
        Ok(())
    }

    /// Drop one reference for `id`. Returns false if none was held.
    fn drop_ref(&self, id: DeviceId) -> bool {
        match self.entries.entry(id) {
            Entry::Occupied(mut occupied) => {
                let node = occupied.get_mut();
                node.live = node.live.saturating_sub(1);
                if node.live == 0 {
                    occupied.remove();
                }
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Release a handle's reference for `id`. Returns false if none was held.
    fn release(&self, id: DeviceId) -> bool {
        let released = self.drop_ref(id);
        if released {
            self.total_closes.fetch_add(1, Ordering::Relaxed);
        }
        released
    }

    /// Handles currently open on `id`.
    pub fn open_count(&self, id: DeviceId) -> usize {
        self.entries.get(&id).map(|e| e.live).unwrap_or(0)
    }

    /// Handles currently open across all devices.
    pub fn active_handles(&self) -> usize {
        self.entries.iter().map(|e| e.live).sum()
    }

    /// Devices with at least one open handle, sorted.
    pub fn open_devices(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.entries.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_opens: self.total_opens.load(Ordering::Relaxed),
            total_closes: self.total_closes.load(Ordering::Relaxed),
            failed_opens: self.failed_opens.load(Ordering::Relaxed),
            active_handles: self.active_handles(),
        }
    }
}
