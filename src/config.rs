//! Runtime configuration for ane-device.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! Node naming, access policy and open flags live here.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "ane-device", about = "Inspect and exercise accelerator device nodes")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "ane-device.json")]
    pub config: PathBuf,

    /// Open nodes exclusively, overriding the configured policy.
    #[arg(long)]
    pub exclusive: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List accelerator nodes present on this host.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Open a device and close it again.
    Probe {
        /// Device index.
        id: u32,
    },

    /// Open a device and hold it until the timeout elapses or Ctrl-C.
    Hold {
        /// Device index.
        id: u32,

        /// Seconds to hold the handle (0 = until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        secs: u64,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device node settings.
    pub device: DeviceConfig,
}

/// Whether several handles may be open on one node at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// Any number of handles; each open gets its own fd.
    #[default]
    Shared,
    /// At most one handle per node, enforced in-process and via `flock`.
    Exclusive,
}

/// Open flags for the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

/// Device node naming and access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Directory holding the accelerator nodes.
    pub device_dir: PathBuf,

    /// Node name prefix; the device index is appended.
    pub node_prefix: String,

    /// sysfs class directory used to look up the bound driver.
    pub sysfs_class_dir: PathBuf,

    /// Shared or exclusive access.
    pub access_policy: AccessPolicy,

    /// Read-write or read-only open.
    pub access_mode: AccessMode,

    /// Reject paths that are not character devices.
    pub require_char_device: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_dir: PathBuf::from("/dev/accel"),
            node_prefix: "accel".to_string(),
            sysfs_class_dir: PathBuf::from("/sys/class/accel"),
            access_policy: AccessPolicy::Shared,
            access_mode: AccessMode::ReadWrite,
            require_char_device: true,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.device.device_dir, PathBuf::from("/dev/accel"));
        assert_eq!(cfg.device.node_prefix, "accel");
        assert_eq!(cfg.device.access_policy, AccessPolicy::Shared);
        assert!(cfg.device.require_char_device);
    }

    #[test]
    fn test_partial_config_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cfg.json");
        std::fs::write(
            &path,
            r#"{ "device": { "access_policy": "exclusive", "access_mode": "read_only" } }"#,
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.device.access_policy, AccessPolicy::Exclusive);
        assert_eq!(cfg.device.access_mode, AccessMode::ReadOnly);
        assert_eq!(cfg.device.node_prefix, "accel");
    }

    #[test]
    fn test_missing_config_file() {
        let cfg = Config::load(Path::new("/nonexistent/ane-device.json")).unwrap();
        assert_eq!(cfg.device.sysfs_class_dir, PathBuf::from("/sys/class/accel"));
    }

    #[test]
    fn test_cli_parses_hold() {
        let cli = Cli::parse_from(["ane-device", "--exclusive", "hold", "2", "--secs", "5"]);
        assert!(cli.exclusive);
        assert!(matches!(cli.command, Command::Hold { id: 2, secs: 5 }));
    }
}
