//! C ABI for tether-core.
//!
//! Exposes the `libdatabase_*` database → table → row chain and the
//! `magicadder_*` value/pointer functions declared in `include/libdatabase.h`
//! and `include/magic_adder.h`.
//!
//! # Memory Management
//!
//! Every handle returned by a `*_create`, `*_add_table`, `*_get_row` or
//! `magicadder_allocate` call must be released with its matching close/free
//! function, children before parents. NULL is accepted by every close/free
//! function as a no-op. Names passed in are copied.
//!
//! Database, table and row handles are opaque tokens checked against a
//! process-wide registry on every call, so double closes, use after close and
//! closing a parent with open children come back as status codes.
//!
//! # Error Handling
//!
//! Functions return NULL or a [`LibdatabaseStatus`]. On error, call
//! [`libdatabase_last_error`] to retrieve a message. The error is
//! thread-local.
//!
//! # Thread Safety
//!
//! All calls are serialised through one lock. Handles are valid on any
//! thread, but a chain should still have one logical owner: the library does
//! not order concurrent closes for you.

// The C boundary needs `#[no_mangle]` and raw-pointer reads; every unsafe
// block carries a `SAFETY:` comment.
#![allow(unsafe_code)]

mod adder;
mod database;
mod error;
mod logging;
mod state;

pub use adder::{magicadder_allocate, magicadder_free, magicadder_new, magicadder_process_value};
pub use database::{
    libdatabase_database_add_table, libdatabase_database_close, libdatabase_database_create,
    libdatabase_row_close, libdatabase_row_describe, libdatabase_row_print, libdatabase_stats,
    libdatabase_table_close, libdatabase_table_get_row, libdatabase_version, LibdatabaseStats,
};
pub use error::{libdatabase_clear_error, libdatabase_last_error, LibdatabaseStatus};
pub use logging::libdatabase_init_logging;
pub use state::{OpaqueDatabase, OpaqueRow, OpaqueTable};
pub use tether_core::MagicAdder;
