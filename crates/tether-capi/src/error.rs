//! Status codes and thread-local error reporting for the C ABI.
//!
//! Functions return a [`LibdatabaseStatus`] (or a null handle) and store a
//! human-readable message in thread-local storage, retrievable with
//! [`libdatabase_last_error`].

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use tether_core::TetherError;

/// Status codes returned by C ABI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibdatabaseStatus {
    Ok = 0,
    NullPointer = 1,
    StaleHandle = 2,
    ChildrenOpen = 3,
    AllocationFailed = 4,
    Internal = 5,
}

impl From<&TetherError> for LibdatabaseStatus {
    fn from(err: &TetherError) -> Self {
        match err {
            TetherError::NullParent { .. } => LibdatabaseStatus::NullPointer,
            TetherError::StaleHandle { .. } => LibdatabaseStatus::StaleHandle,
            TetherError::ChildrenOpen { .. } => LibdatabaseStatus::ChildrenOpen,
            TetherError::AllocationFailed { .. } => LibdatabaseStatus::AllocationFailed,
            TetherError::Other(_) => LibdatabaseStatus::Internal,
        }
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store an error message for later retrieval via [`libdatabase_last_error`].
pub fn set_last_error(msg: &str) {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = CString::new(msg).ok();
    });
}

/// Store a [`TetherError`] and return the matching status code.
pub fn set_error(err: &TetherError) -> LibdatabaseStatus {
    set_last_error(&err.to_string());
    LibdatabaseStatus::from(err)
}

/// Returns the last error message on this thread, or null if there is none.
///
/// The pointer stays valid until the next failing call on this thread or
/// `libdatabase_clear_error`. The caller must NOT free it.
#[no_mangle]
pub extern "C" fn libdatabase_last_error() -> *const c_char {
    LAST_ERROR.with(|cell| {
        cell.borrow()
            .as_ref()
            .map_or(std::ptr::null(), |s| s.as_ptr())
    })
}

/// Clears the last error on this thread.
#[no_mangle]
pub extern "C" fn libdatabase_clear_error() {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

/// Borrow a C string for the duration of one call, reporting null.
///
/// No encoding validation is done; any NUL-terminated byte string is accepted.
pub fn cstr_from_ptr<'a>(ptr: *const c_char, what: &str) -> Result<&'a CStr, LibdatabaseStatus> {
    if ptr.is_null() {
        set_last_error(&format!("Null {} pointer", what));
        return Err(LibdatabaseStatus::NullPointer);
    }
    // SAFETY: Caller guarantees ptr is a valid, NUL-terminated C string that
    // stays alive for the duration of this call. The registry copies it.
    Ok(unsafe { CStr::from_ptr(ptr) })
}
