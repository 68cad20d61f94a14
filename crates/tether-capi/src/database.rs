//! `libdatabase_*` exports: the database → table → row chain.
//!
//! Every create function returns a handle or NULL; every close function
//! accepts NULL as a no-op. Closing a parent while children are open, and any
//! use of a closed handle, is refused with a status code instead of being
//! undefined behaviour.

use std::io::Write;
use std::os::raw::{c_char, c_uint};
use std::ptr;

use tether_core::{RegistryStats, TetherError};

use crate::error::{cstr_from_ptr, set_error, set_last_error, LibdatabaseStatus};
use crate::state::{lock_state, OpaqueDatabase, OpaqueRow, OpaqueTable};

/// Live object counts, as reported by `libdatabase_stats`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibdatabaseStats {
    pub databases: usize,
    pub tables: usize,
    pub rows: usize,
    pub adders: usize,
}

// =========================================================================
// Database
// =========================================================================

/// Create a new database named `database_name`.
///
/// The name is copied; the caller may free it as soon as this returns.
/// Returns NULL on error (check `libdatabase_last_error()`).
#[no_mangle]
pub extern "C" fn libdatabase_database_create(database_name: *const c_char) -> *mut OpaqueDatabase {
    let Ok(name) = cstr_from_ptr(database_name, "database name") else {
        return ptr::null_mut();
    };
    let Ok(mut state) = lock_state() else {
        return ptr::null_mut();
    };
    match state.registry.create_database(name) {
        Ok(handle) => OpaqueDatabase::into_ptr(handle),
        Err(e) => {
            set_error(&e);
            ptr::null_mut()
        }
    }
}

/// Add a table named `table_name` to `p_database`.
///
/// Returns NULL if `p_database` is NULL or closed, or on error.
#[no_mangle]
pub extern "C" fn libdatabase_database_add_table(
    p_database: *mut OpaqueDatabase,
    table_name: *const c_char,
) -> *mut OpaqueTable {
    if p_database.is_null() {
        set_error(&TetherError::NullParent {
            kind: tether_core::HandleKind::Table,
        });
        return ptr::null_mut();
    }
    let Ok(name) = cstr_from_ptr(table_name, "table name") else {
        return ptr::null_mut();
    };
    let Ok(mut state) = lock_state() else {
        return ptr::null_mut();
    };
    let database = OpaqueDatabase::from_ptr(p_database, state.registry.owner());
    match state.registry.add_table(database, name) {
        Ok(handle) => OpaqueTable::into_ptr(handle),
        Err(e) => {
            set_error(&e);
            ptr::null_mut()
        }
    }
}

/// Close a database handle. NULL is a no-op.
///
/// Returns `CHILDREN_OPEN` (and keeps the database open) while any of its
/// tables is open, `STALE_HANDLE` if it was already closed.
#[no_mangle]
pub extern "C" fn libdatabase_database_close(p_database: *mut OpaqueDatabase) -> LibdatabaseStatus {
    if p_database.is_null() {
        return LibdatabaseStatus::Ok;
    }
    let mut state = match lock_state() {
        Ok(state) => state,
        Err(status) => return status,
    };
    let database = OpaqueDatabase::from_ptr(p_database, state.registry.owner());
    match state.registry.close_database(database) {
        Ok(()) => LibdatabaseStatus::Ok,
        Err(e) => set_error(&e),
    }
}

// =========================================================================
// Table
// =========================================================================

/// Open row `row_index` of `p_table`.
///
/// Returns NULL if `p_table` is NULL or closed, or on error.
#[no_mangle]
pub extern "C" fn libdatabase_table_get_row(
    p_table: *mut OpaqueTable,
    row_index: c_uint,
) -> *mut OpaqueRow {
    let Ok(mut state) = lock_state() else {
        return ptr::null_mut();
    };
    let table = OpaqueTable::from_ptr(p_table, state.registry.owner());
    match state.registry.get_row(table, row_index) {
        Ok(handle) => OpaqueRow::into_ptr(handle),
        Err(e) => {
            set_error(&e);
            ptr::null_mut()
        }
    }
}

/// Close a table handle. NULL is a no-op.
///
/// Returns `CHILDREN_OPEN` (and keeps the table open) while any of its rows
/// is open, `STALE_HANDLE` if it was already closed.
#[no_mangle]
pub extern "C" fn libdatabase_table_close(p_table: *mut OpaqueTable) -> LibdatabaseStatus {
    if p_table.is_null() {
        return LibdatabaseStatus::Ok;
    }
    let mut state = match lock_state() {
        Ok(state) => state,
        Err(status) => return status,
    };
    let table = OpaqueTable::from_ptr(p_table, state.registry.owner());
    match state.registry.close_table(table) {
        Ok(()) => LibdatabaseStatus::Ok,
        Err(e) => set_error(&e),
    }
}

// =========================================================================
// Row
// =========================================================================

/// Print a row to stdout as `DB: <db>, Table: <table>, Row: <index>`.
///
/// Labels are written as the exact bytes they were created with. NULL is a
/// no-op. A closed row is reported as `STALE_HANDLE` and nothing is printed.
#[no_mangle]
pub extern "C" fn libdatabase_row_print(p_row: *mut OpaqueRow) -> LibdatabaseStatus {
    if p_row.is_null() {
        return LibdatabaseStatus::Ok;
    }
    let mut line = {
        let state = match lock_state() {
            Ok(state) => state,
            Err(status) => return status,
        };
        let Some(row) = OpaqueRow::from_ptr(p_row, state.registry.owner()) else {
            return LibdatabaseStatus::Ok;
        };
        match state.registry.describe_row(row) {
            Ok(description) => description.to_bytes(),
            Err(e) => return set_error(&e),
        }
    };
    line.push(b'\n');

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&line).and_then(|()| stdout.flush()) {
        Ok(()) => LibdatabaseStatus::Ok,
        Err(e) => {
            set_last_error(&format!("Failed to print row: {}", e));
            LibdatabaseStatus::Internal
        }
    }
}

/// Write a row's description into `buf`, snprintf-style.
///
/// Labels are copied byte for byte, so the output is only UTF-8 if they were.
///
/// At most `buf_len - 1` bytes are written, always followed by a NUL when
/// `buf_len > 0`. Returns the full description length excluding the NUL, so a
/// return value `>= buf_len` means the output was truncated. Pass a NULL
/// `buf` to query the length. Returns 0 on error (check
/// `libdatabase_last_error()`).
#[no_mangle]
pub extern "C" fn libdatabase_row_describe(
    p_row: *mut OpaqueRow,
    buf: *mut c_char,
    buf_len: usize,
) -> usize {
    if p_row.is_null() {
        set_last_error("Null row pointer");
        return 0;
    }
    let text = {
        let Ok(state) = lock_state() else {
            return 0;
        };
        let Some(row) = OpaqueRow::from_ptr(p_row, state.registry.owner()) else {
            return 0;
        };
        match state.registry.describe_row(row) {
            Ok(description) => description.to_bytes(),
            Err(e) => {
                set_error(&e);
                return 0;
            }
        }
    };

    if !buf.is_null() && buf_len > 0 {
        let copied = text.len().min(buf_len - 1);
        // SAFETY: Caller guarantees `buf` points to at least `buf_len`
        // writable bytes. We write `copied + 1 <= buf_len` bytes.
        let out = unsafe { std::slice::from_raw_parts_mut(buf.cast::<u8>(), buf_len) };
        out[..copied].copy_from_slice(&text[..copied]);
        out[copied] = 0;
    }
    text.len()
}

/// Close a row handle. NULL is a no-op; a closed row is `STALE_HANDLE`.
#[no_mangle]
pub extern "C" fn libdatabase_row_close(p_row: *mut OpaqueRow) -> LibdatabaseStatus {
    if p_row.is_null() {
        return LibdatabaseStatus::Ok;
    }
    let mut state = match lock_state() {
        Ok(state) => state,
        Err(status) => return status,
    };
    let row = OpaqueRow::from_ptr(p_row, state.registry.owner());
    match state.registry.close_row(row) {
        Ok(()) => LibdatabaseStatus::Ok,
        Err(e) => set_error(&e),
    }
}

// =========================================================================
// Introspection
// =========================================================================

/// Fill `out` with the number of live objects of each kind.
#[no_mangle]
pub extern "C" fn libdatabase_stats(out: *mut LibdatabaseStats) -> LibdatabaseStatus {
    if out.is_null() {
        set_last_error("Null stats pointer");
        return LibdatabaseStatus::NullPointer;
    }
    let state = match lock_state() {
        Ok(state) => state,
        Err(status) => return status,
    };
    let RegistryStats {
        databases,
        tables,
        rows,
    } = state.registry.stats();
    let stats = LibdatabaseStats {
        databases,
        tables,
        rows,
        adders: state.live_adders(),
    };
    // SAFETY: `out` is non-null and the caller guarantees it points to a
    // writable `libdatabase_stats_t`.
    unsafe { out.write(stats) };
    LibdatabaseStatus::Ok
}

/// Returns the library version string. The pointer is static and must NOT be freed.
#[no_mangle]
pub extern "C" fn libdatabase_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr().cast::<c_char>()
}
