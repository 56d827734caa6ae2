//! Directory-relative file opening, matching the `open(dir_fd,
//! relative_path)` shape of the filesystem bridge contract. Kept in its own
//! small module the way the rest of this crate isolates a single OS
//! primitive per file.

use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{FromRawFd, RawFd};
use std::path::Path;

/// Opens `relative_path` for reading relative to the open directory `dir_fd`,
/// the way `openat(2)` does. `dir_fd` is borrowed, not consumed.
pub fn open_relative(dir_fd: RawFd, relative_path: &Path) -> io::Result<File> {
    let c_path = CString::new(relative_path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let fd = unsafe { libc::openat(dir_fd, c_path.as_ptr(), libc::O_RDONLY) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { File::from_raw_fd(fd) })
}
