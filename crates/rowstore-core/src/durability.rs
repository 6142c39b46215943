//! Platform-specific sync for snapshot files
//!
//! A flush has only truly reached the disk once the kernel (and on Apple
//! platforms, the drive cache) has been told to write it out. `SyncMode`
//! picks how far each flush goes.

use std::fs::File;
use std::io;

/// How far a sync pushes written data toward persistent storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Leave data in the OS page cache
    None,
    /// File contents and size, skipping unrelated metadata where the platform allows
    #[default]
    Data,
    /// Contents and all metadata, bypassing volatile drive caches where possible
    Full,
}

/// Sync `file` according to `mode`.
///
/// Blocks for as long as the device takes. Callers must not hold the
/// row set lock while calling this.
pub fn sync_file(file: &File, mode: SyncMode) -> io::Result<()> {
    match mode {
        SyncMode::None => Ok(()),
        SyncMode::Data => sync_data(file),
        SyncMode::Full => sync_full(file),
    }
}

#[cfg(target_os = "linux")]
fn sync_data(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    // SAFETY: the descriptor comes from a live `File` borrowed for this call.
    let result = unsafe { libc::fdatasync(file.as_raw_fd()) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(target_os = "linux"))]
fn sync_data(file: &File) -> io::Result<()> {
    file.sync_data()
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn sync_full(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    // Plain fsync on Apple platforms stops at the drive's volatile cache.
    // SAFETY: the descriptor comes from a live `File` borrowed for this call.
    let result = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn sync_full(file: &File) -> io::Result<()> {
    file.sync_all()
}
