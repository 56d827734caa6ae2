//! C API for the `ecm` reader, matching the reader library contract
//! consumed by the filesystem bridge: `open(dir_fd, relative_path)`,
//! `close(handle)`, `read(handle, buf, offset, length)`, `size(handle)`.
//!
//! Handles are opaque pointers obtained from [`Box::into_raw`] and released
//! with [`Box::from_raw`], mirroring the handle lifecycle of the reader
//! this crate wraps in Rust.

use ecm::EcmReader;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::path::Path;

#[allow(non_camel_case_types)]
pub type ecm_file = EcmReader;

pub use ecm::EcmError as ecm_error;

fn ffi_expose(reader: EcmReader) -> *mut ecm_file {
    Box::into_raw(Box::new(reader))
}

/// Opens `file` (and its sibling `<file>.edi` index) relative to the open
/// directory `dir_fd`. On success, `*out` receives the new handle and
/// `ecm_error::None` is returned; on failure `*out` is left untouched.
#[no_mangle]
pub extern "C" fn ecm_open_file(
    dir_fd: c_int,
    file: *const c_char,
    out: *mut *mut ecm_file,
) -> ecm_error {
    if file.is_null() || out.is_null() {
        return ecm_error::InvalidParameter;
    }

    let c_path = unsafe { CStr::from_ptr(file) };
    let relative_path = match std::str::from_utf8(c_path.to_bytes()) {
        Ok(s) => Path::new(s),
        Err(_) => return ecm_error::InvalidParameter,
    };

    match EcmReader::open_at(dir_fd, relative_path) {
        Ok(reader) => {
            unsafe { *out = ffi_expose(reader) };
            ecm_error::None
        }
        Err(e) => {
            log::warn!("ecm_open_file({}): {e}", relative_path.display());
            e
        }
    }
}

/// Releases a handle opened by [`ecm_open_file`]. Passing a null pointer is
/// a no-op.
#[no_mangle]
pub extern "C" fn ecm_close_file(ecm: *mut ecm_file) {
    if ecm.is_null() {
        return;
    }
    unsafe { drop(Box::from_raw(ecm)) }
}

/// Reads up to `len` bytes at logical `offset` into `buf`. Returns the
/// number of bytes produced, or `-1` on error. A return of `0` with `len >
/// 0` means clean end-of-file.
#[no_mangle]
pub extern "C" fn ecm_read(
    ecm: *const ecm_file,
    buf: *mut c_void,
    offset: i64,
    len: usize,
) -> isize {
    if offset < 0 {
        return -1;
    }
    let reader = match unsafe { ecm.as_ref() } {
        Some(reader) => reader,
        None => return -1,
    };
    let out = unsafe { std::slice::from_raw_parts_mut(buf as *mut u8, len) };
    match reader.read(offset as u64, out) {
        Ok(n) => n as isize,
        Err(e) => {
            log::warn!("ecm_read(offset={offset}, len={len}): {e}");
            -1
        }
    }
}

/// Returns the uncompressed size, in bytes, of the image behind `ecm`.
#[no_mangle]
pub extern "C" fn ecm_get_file_size(ecm: *const ecm_file) -> u64 {
    match unsafe { ecm.as_ref() } {
        Some(reader) => reader.size(),
        None => 0,
    }
}

/// Returns a heap-allocated, NUL-terminated diagnostic string for `err`.
/// The caller owns the returned pointer; this is intended for logging, not
/// for parsing.
#[no_mangle]
pub extern "C" fn ecm_error_string(err: ecm_error) -> *const c_char {
    // SAFETY: leaks the string, but handing the C caller an internal
    // pointer to reclaim instead would let it corrupt our state.
    let err_string = unsafe { CString::new(err.to_string()).unwrap_unchecked() };
    err_string.into_raw()
}
