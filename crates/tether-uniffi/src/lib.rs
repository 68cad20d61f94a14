//! UniFFI bindings for tether-core.
//!
//! Exposes the database → table → row chain to managed languages as
//! reference-counted objects. Every child keeps an `Arc` to its parent, so a
//! parent stays open for as long as any child is reachable, and the last
//! reference to go closes the object. The `MagicAdder` value type is exposed
//! both as an object (heap embodiment) and as a record (value embodiment).
//!
//! # Usage
//!
//! Generate bindings using `--library` mode:
//!
//! ```bash
//! # Build the cdylib
//! cargo build -p tether-uniffi --release
//!
//! # Generate Python bindings
//! tether-uniffi-bindgen generate --library --language python \
//!     --out-dir ./bindings/python target/release/libtether_uniffi.so
//! ```

use std::ffi::CString;
use std::sync::{Arc, Mutex, MutexGuard};

use tether_core::{
    DatabaseHandle, HeapAdder, MagicAdder, Registry, RowDescription, RowHandle, TableHandle,
    TetherError,
};
use tracing::warn;

/// FFI-friendly error type.
///
/// Flattens `TetherError` into message-carrying variants that can cross the
/// FFI boundary.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Error, thiserror::Error)]
pub enum FfiError {
    #[error("Missing parent: {message}")]
    MissingParent { message: String },

    #[error("Stale handle: {message}")]
    StaleHandle { message: String },

    #[error("Children open: {message}")]
    ChildrenOpen { message: String },

    #[error("Allocation failed: {message}")]
    AllocationFailed { message: String },

    #[error("Invalid name: {message}")]
    InvalidName { message: String },

    #[error("{message}")]
    Other { message: String },
}

impl From<TetherError> for FfiError {
    fn from(err: TetherError) -> Self {
        let message = err.to_string();
        match err {
            TetherError::NullParent { .. } => FfiError::MissingParent { message },
            TetherError::StaleHandle { .. } => FfiError::StaleHandle { message },
            TetherError::ChildrenOpen { .. } => FfiError::ChildrenOpen { message },
            TetherError::AllocationFailed { .. } => FfiError::AllocationFailed { message },
            TetherError::Other(_) => FfiError::Other { message },
        }
    }
}

/// Result type for FFI operations.
pub type FfiResult<T> = Result<T, FfiError>;

// UniFFI scaffolding - this generates the FFI glue code
uniffi::setup_scaffolding!();

/// Get the version of the tether-uniffi bindings.
#[uniffi::export]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn label(name: String, what: &str) -> FfiResult<CString> {
    CString::new(name).map_err(|e| FfiError::InvalidName {
        message: format!("{} name has an interior NUL at byte {}", what, e.nul_position()),
    })
}

// =============================================================================
// Handle chain
// =============================================================================

/// A row and its ancestors' names, as plain data.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct RowParts {
    pub database: String,
    pub table: String,
    pub row: u32,
}

impl From<RowDescription> for RowParts {
    fn from(d: RowDescription) -> Self {
        Self {
            database: d.database.to_string_lossy().into_owned(),
            table: d.table.to_string_lossy().into_owned(),
            row: d.row,
        }
    }
}

/// Root of a chain. Owns the registry its tables and rows live in.
#[derive(uniffi::Object)]
pub struct Database {
    registry: Mutex<Registry>,
    handle: DatabaseHandle,
}

impl Database {
    fn registry(&self) -> FfiResult<MutexGuard<'_, Registry>> {
        self.registry.lock().map_err(|_| FfiError::Other {
            message: "Failed to acquire registry lock".to_string(),
        })
    }
}

#[uniffi::export]
impl Database {
    /// Open a database. The name is copied.
    #[uniffi::constructor]
    pub fn new(name: String) -> FfiResult<Arc<Self>> {
        let name = label(name, "Database")?;
        let mut registry = Registry::new();
        let handle = registry.create_database(&name)?;
        Ok(Arc::new(Self {
            registry: Mutex::new(registry),
            handle,
        }))
    }

    pub fn name(&self) -> FfiResult<String> {
        let registry = self.registry()?;
        Ok(registry
            .database_name(self.handle)?
            .to_string_lossy()
            .into_owned())
    }

    /// Number of tables of this database still reachable.
    pub fn open_tables(&self) -> FfiResult<u32> {
        Ok(self.registry()?.open_tables(self.handle)?)
    }

    /// Add a table. The table keeps this database alive.
    pub fn add_table(self: Arc<Self>, name: String) -> FfiResult<Arc<Table>> {
        let name = label(name, "Table")?;
        let handle = self.registry()?.add_table(Some(self.handle), &name)?;
        Ok(Arc::new(Table {
            database: self,
            handle,
        }))
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Children hold an Arc to us, so none can be open here.
        let closed = match self.registry.get_mut() {
            Ok(registry) => registry.close_database(Some(self.handle)),
            Err(poisoned) => poisoned.into_inner().close_database(Some(self.handle)),
        };
        if let Err(e) = closed {
            warn!(handle = %self.handle, "Failed to close database: {}", e);
        }
    }
}

/// A table. Holds its database open.
#[derive(uniffi::Object)]
pub struct Table {
    database: Arc<Database>,
    handle: TableHandle,
}

#[uniffi::export]
impl Table {
    pub fn name(&self) -> FfiResult<String> {
        let registry = self.database.registry()?;
        Ok(registry
            .table_name(self.handle)?
            .to_string_lossy()
            .into_owned())
    }

    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.database)
    }

    /// Number of rows of this table still reachable.
    pub fn open_rows(&self) -> FfiResult<u32> {
        Ok(self.database.registry()?.open_rows(self.handle)?)
    }

    /// Get a row. The row keeps this table alive.
    pub fn get_row(self: Arc<Self>, index: u32) -> FfiResult<Arc<Row>> {
        let handle = self.database.registry()?.get_row(Some(self.handle), index)?;
        Ok(Arc::new(Row {
            table: self,
            handle,
        }))
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        let closed = match self.database.registry.lock() {
            Ok(mut registry) => registry.close_table(Some(self.handle)),
            Err(poisoned) => poisoned.into_inner().close_table(Some(self.handle)),
        };
        if let Err(e) = closed {
            warn!(handle = %self.handle, "Failed to close table: {}", e);
        }
    }
}

/// A row. Holds its table open.
#[derive(uniffi::Object)]
pub struct Row {
    table: Arc<Table>,
    handle: RowHandle,
}

impl Row {
    fn description(&self) -> FfiResult<RowDescription> {
        Ok(self
            .table
            .database
            .registry()?
            .describe_row(self.handle)?)
    }
}

#[uniffi::export]
impl Row {
    pub fn index(&self) -> FfiResult<u32> {
        Ok(self.table.database.registry()?.row_index(self.handle)?)
    }

    pub fn table(&self) -> Arc<Table> {
        Arc::clone(&self.table)
    }

    /// `DB: <database>, Table: <table>, Row: <index>`
    pub fn describe(&self) -> FfiResult<String> {
        Ok(self.description()?.to_string())
    }

    pub fn parts(&self) -> FfiResult<RowParts> {
        Ok(self.description()?.into())
    }
}

impl Drop for Row {
    fn drop(&mut self) {
        let closed = match self.table.database.registry.lock() {
            Ok(mut registry) => registry.close_row(Some(self.handle)),
            Err(poisoned) => poisoned.into_inner().close_row(Some(self.handle)),
        };
        if let Err(e) = closed {
            warn!(handle = %self.handle, "Failed to close row: {}", e);
        }
    }
}

// =============================================================================
// MagicAdder
// =============================================================================

/// By-value adder. Copied across the boundary on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Record)]
pub struct AdderValue {
    pub amount: u32,
}

impl From<MagicAdder> for AdderValue {
    fn from(adder: MagicAdder) -> Self {
        Self {
            amount: adder.amount(),
        }
    }
}

impl From<AdderValue> for MagicAdder {
    fn from(value: AdderValue) -> Self {
        MagicAdder::new(value.amount)
    }
}

#[uniffi::export]
pub fn adder_value(amount: u32) -> AdderValue {
    MagicAdder::new(amount).into()
}

/// `adder.amount + value`, wrapping on overflow.
#[uniffi::export]
pub fn adder_process(adder: AdderValue, value: u32) -> u32 {
    tether_core::process(&adder.into(), value)
}

/// Heap-allocated adder, released when the last reference goes.
#[derive(uniffi::Object)]
pub struct Adder {
    inner: HeapAdder,
}

#[uniffi::export]
impl Adder {
    #[uniffi::constructor]
    pub fn new(amount: u32) -> FfiResult<Arc<Self>> {
        Ok(Arc::new(Self {
            inner: HeapAdder::try_new(amount)?,
        }))
    }

    pub fn amount(&self) -> u32 {
        self.inner.amount()
    }

    pub fn process_value(&self, value: u32) -> u32 {
        self.inner.process_value(value)
    }

    pub fn value(&self) -> AdderValue {
        self.inner.value().into()
    }
}
