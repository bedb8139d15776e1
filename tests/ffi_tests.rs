//! Tests for the C ABI layer.
//!
//! The ABI uses a process-global manager, so everything runs in one test to
//! keep configuration and fd accounting deterministic.

use std::fs::{self, File};
use std::path::Path;

use tempfile::TempDir;

use ane_device::ffi::{self, ane_device_close, ane_device_open};
use ane_device::{DeviceConfig, DeviceError};

fn open_fd_count() -> usize {
    fs::read_dir(Path::new("/proc/self/fd")).unwrap().count()
}

#[test]
fn test_c_abi_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let device_dir = tmp.path().join("accel");
    fs::create_dir_all(&device_dir).unwrap();
    File::create(device_dir.join("accel0")).unwrap();

    ffi::configure(DeviceConfig {
        device_dir,
        sysfs_class_dir: tmp.path().join("sys"),
        require_char_device: false,
        ..DeviceConfig::default()
    })
    .unwrap();
    assert!(matches!(
        ffi::configure(DeviceConfig::default()),
        Err(DeviceError::AlreadyConfigured)
    ));

    let baseline = open_fd_count();

    // open(0) -> fd, close(fd) -> back to baseline.
    let fd = ane_device_open(0);
    assert!(fd >= 0, "open failed with {fd}");
    assert_eq!(ffi::open_fds(), 1);
    assert_eq!(open_fd_count(), baseline + 1);
    ane_device_close(fd);
    assert_eq!(ffi::open_fds(), 0);
    assert_eq!(open_fd_count(), baseline);

    // Missing and negative ids.
    assert_eq!(ane_device_open(99), -libc::ENOENT);
    assert_eq!(ane_device_open(-1), -libc::ENOENT);
    assert_eq!(open_fd_count(), baseline);

    // Double close is reported, not executed.
    let fd = ane_device_open(0);
    assert!(fd >= 0);
    ffi::close_fd(fd).unwrap();
    assert!(matches!(
        ffi::close_fd(fd),
        Err(DeviceError::InvalidHandle { .. })
    ));
    ane_device_close(fd);
    assert_eq!(open_fd_count(), baseline);

    // A foreign fd is never closed by the ABI.
    let foreign = File::open(tmp.path()).unwrap();
    let foreign_fd = std::os::fd::AsRawFd::as_raw_fd(&foreign);
    assert!(matches!(
        ffi::close_fd(foreign_fd),
        Err(DeviceError::InvalidHandle { .. })
    ));
    assert!(foreign.metadata().is_ok());
    drop(foreign);

    // Shared policy: two opens, two fds, cleaned up together.
    let a = ane_device_open(0);
    let b = ane_device_open(0);
    assert!(a >= 0 && b >= 0 && a != b);
    assert_eq!(ffi::manager().open_count(0), 2);
    assert_eq!(ffi::close_all(), 2);
    assert_eq!(ffi::open_fds(), 0);
    assert_eq!(ffi::manager().open_count(0), 0);
    assert_eq!(open_fd_count(), baseline);

    // A descriptor closed behind the ABI's back: when the kernel reuses its
    // number for the next open, the new fd must stay open and tracked.
    let fd = ane_device_open(0);
    assert!(fd >= 0);
    assert_eq!(unsafe { libc::close(fd) }, 0);
    let reopened = ane_device_open(0);
    assert!(reopened >= 0);
    assert_ne!(unsafe { libc::fcntl(reopened, libc::F_GETFD) }, -1);
    assert_eq!(ffi::manager().open_count(0), if reopened == fd { 1 } else { 2 });
    ffi::close_fd(reopened).unwrap();
    assert_eq!(unsafe { libc::fcntl(reopened, libc::F_GETFD) }, -1);
    if reopened != fd {
        // No reuse happened; the orphaned entry is reported on close.
        assert!(matches!(
            ffi::close_fd(fd),
            Err(DeviceError::InvalidHandle { .. })
        ));
    }
    assert_eq!(ffi::open_fds(), 0);
    assert_eq!(ffi::manager().open_count(0), 0);
    assert_eq!(open_fd_count(), baseline);
}
