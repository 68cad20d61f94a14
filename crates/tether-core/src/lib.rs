//! Tether Core - parent-owned object chains and dual value/pointer types
//! that stay memory-safe behind a C ABI.
//!
//! Two independent pieces live here:
//!
//! - A database → table → row chain. Objects are owned by a [`Registry`] and
//!   addressed through generation-checked handles, so use after close, double
//!   close and closing a parent before its children are reported as
//!   [`TetherError`]s. [`Session`] layers borrow-checked RAII wrappers on top,
//!   which turn the same mistakes into compile errors.
//! - [`MagicAdder`], a `#[repr(C)]` value type, and [`HeapAdder`], the same
//!   value behind a fallible allocation. Both process input through one
//!   function.
//!
//! Nothing in this crate synchronises internally. A registry and every handle
//! it issues belong to one owner at a time.
//!
//! # Example
//!
//! ```
//! use tether_core::{HeapAdder, MagicAdder, Registry};
//!
//! let mut registry = Registry::new();
//! let db = registry.create_database(c"example_db")?;
//! let table = registry.add_table(Some(db), c"example_table")?;
//! let row = registry.get_row(Some(table), 10)?;
//! assert_eq!(
//!     registry.describe_row(row)?.to_string(),
//!     "DB: example_db, Table: example_table, Row: 10"
//! );
//! registry.close_row(Some(row))?;
//! registry.close_table(Some(table))?;
//! registry.close_database(Some(db))?;
//!
//! let heap = HeapAdder::try_new(5)?;
//! assert_eq!(heap.process_value(6), MagicAdder::new(5).process_value(6));
//! heap.destroy();
//! # Ok::<(), tether_core::TetherError>(())
//! ```

pub mod adder;
pub mod arena;
pub mod config;
pub mod error;
pub mod registry;
pub mod scoped;

// Re-export commonly used types
pub use adder::{process, HeapAdder, MagicAdder};
pub use arena::{Arena, HandleId, OwnerId};
pub use config::{LoggingConfig, RegistryConfig};
pub use error::{HandleKind, Result, TetherError};
pub use registry::{
    DatabaseHandle, Registry, RegistryBuilder, RegistryStats, RowDescription, RowHandle,
    TableHandle,
};
pub use scoped::{Database, Row, Session, Table};
