//! Device node resolution, discovery and the raw open path.
//!
//! Nodes follow the DRM accel convention `<device_dir>/<prefix><index>`
//! (`/dev/accel/accel0` by default). Discovery scans that directory and
//! optionally reads the bound driver from sysfs.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AccessMode, AccessPolicy, DeviceConfig};
use crate::device::error::{map_open_error, DeviceError, DeviceResult};
use crate::device::DeviceId;

/// A node found on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device index.
    pub id: DeviceId,

    /// Node path (e.g., "/dev/accel/accel0").
    pub path: PathBuf,

    /// Kernel driver bound to the node, when sysfs exposes it.
    pub driver: Option<String>,
}

/// Path of the node for `id`.
pub fn node_path(config: &DeviceConfig, id: DeviceId) -> PathBuf {
    index_path(config, id.into())
}

/// Path a raw, possibly out-of-range, index would name.
pub fn index_path(config: &DeviceConfig, index: i64) -> PathBuf {
    config
        .device_dir
        .join(format!("{}{}", config.node_prefix, index))
}

/// Parse a directory entry name like `accel12` into its index.
fn parse_node_name(name: &str, prefix: &str) -> Option<DeviceId> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().map(DeviceId::new)
}

/// Driver name from `<sysfs_class_dir>/<prefix><id>/device/driver`.
fn read_driver(config: &DeviceConfig, id: DeviceId) -> Option<String> {
    let link = config
        .sysfs_class_dir
        .join(format!("{}{}", config.node_prefix, id.index()))
        .join("device/driver");
    let target = fs::read_link(link).ok()?;
    Some(target.file_name()?.to_string_lossy().to_string())
}

/// Enumerate accelerator nodes, sorted by index.
///
/// A missing device directory means no accelerator driver is loaded and
/// yields an empty list.
pub fn discover(config: &DeviceConfig) -> DeviceResult<Vec<DeviceInfo>> {
    discover_in(config, &config.device_dir)
}

fn discover_in(config: &DeviceConfig, dir: &Path) -> DeviceResult<Vec<DeviceInfo>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Device directory absent");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(DeviceError::Io {
                path: dir.to_path_buf(),
                source: e,
            })
        }
    };

    let mut out: Vec<DeviceInfo> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let id = parse_node_name(&name, &config.node_prefix)?;
            Some(DeviceInfo {
                id,
                path: entry.path(),
                driver: read_driver(config, id),
            })
        })
        .collect();
    out.sort_by_key(|d| d.id);
    Ok(out)
}

/// Open the node for `id`, verify its file type and take the policy lock.
pub(crate) fn open_node(config: &DeviceConfig, id: DeviceId) -> DeviceResult<File> {
    let path = node_path(config, id);
    let file = OpenOptions::new()
        .read(true)
        .write(config.access_mode == AccessMode::ReadWrite)
        .open(&path)
        .map_err(|e| map_open_error(id, path.clone(), e))?;

    if config.require_char_device {
        let meta = file.metadata().map_err(|e| DeviceError::Io {
            path: path.clone(),
            source: e,
        })?;
        if !meta.file_type().is_char_device() {
            return Err(DeviceError::NotCharDevice { path });
        }
    }

    lock_node(&file, &path, id, config.access_policy)?;

    debug!(device = %id, path = %path.display(), fd = file.as_raw_fd(), "Opened node");
    Ok(file)
}

/// Take a non-blocking advisory lock matching `policy`.
///
/// Shared opens hold `LOCK_SH` so an exclusive holder in another process
/// shuts them out, and vice versa.
fn lock_node(file: &File, path: &Path, id: DeviceId, policy: AccessPolicy) -> DeviceResult<()> {
    let op = match policy {
        AccessPolicy::Shared => libc::LOCK_SH,
        AccessPolicy::Exclusive => libc::LOCK_EX,
    } | libc::LOCK_NB;

    // SAFETY: the fd is owned by `file` and stays open for the duration of the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), op) };
    match Errno::result(rc) {
        Ok(_) => Ok(()),
        Err(Errno::EWOULDBLOCK) => Err(DeviceError::ResourceUnavailable {
            id,
            reason: "node locked by another holder".to_string(),
        }),
        Err(errno) => Err(DeviceError::Io {
            path: path.to_path_buf(),
            source: io::Error::from(errno),
        }),
    }
}
