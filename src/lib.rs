//! ane-device: open/close lifecycle for neural-accelerator device nodes.
//!
//! Resolves a device index to its `/dev/accel/accelN` node and hands out an
//! owned [`DeviceHandle`] that is released exactly once. Command submission,
//! memory mapping and ioctl encoding sit above this crate and reach the
//! device through the handle's file descriptor.
//!
//! - [`device`]: handles, registry, discovery, manager
//! - [`config`]: CLI and JSON configuration
//! - [`ffi`]: `ane_device_open` / `ane_device_close` C ABI

pub mod config;
pub mod device;
pub mod ffi;

pub use config::{AccessMode, AccessPolicy, Config, DeviceConfig};
pub use device::{DeviceError, DeviceHandle, DeviceId, DeviceManager, DeviceResult};
