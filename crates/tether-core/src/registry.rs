//! The database → table → row handle chain.
//!
//! A [`Registry`] owns every object in the chain. Callers hold typed handles
//! (generation-checked ids), never references, so a handle that outlives its
//! object is reported as stale instead of dangling. Each parent tracks how
//! many children are open and refuses to close until they are all gone.
//!
//! Labels are copied into the registry at creation time; callers do not need
//! to keep their strings alive. They are kept as raw bytes and only converted
//! to text for display.
//!
//! Every registry has its own [`OwnerId`]. A handle issued by one registry is
//! stale in every other.

use std::ffi::{CStr, CString};
use std::fmt;

use tracing::{debug, warn};

use crate::arena::{Arena, HandleId, OwnerId};
use crate::config::RegistryConfig;
use crate::error::{HandleKind, Result, TetherError};

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(HandleId);

        impl $name {
            pub const fn id(&self) -> HandleId {
                self.0
            }

            pub const fn from_id(id: HandleId) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

typed_handle!(
    /// Handle to an open database.
    DatabaseHandle
);
typed_handle!(
    /// Handle to an open table.
    TableHandle
);
typed_handle!(
    /// Handle to an open row.
    RowHandle
);

#[derive(Debug)]
struct DatabaseRecord {
    name: CString,
    open_tables: u32,
}

#[derive(Debug)]
struct TableRecord {
    database: DatabaseHandle,
    name: CString,
    open_rows: u32,
}

#[derive(Debug)]
struct RowRecord {
    table: TableHandle,
    index: u32,
}

/// The composite view of a row and its ancestors.
///
/// Labels are the exact bytes supplied at creation. [`RowDescription::to_bytes`]
/// renders them unchanged; `Display` replaces invalid UTF-8 with U+FFFD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDescription {
    pub database: CString,
    pub table: CString,
    pub row: u32,
}

impl RowDescription {
    /// `DB: <database>, Table: <table>, Row: <row>` with the labels' raw bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let row = self.row.to_string();
        let database = self.database.as_bytes();
        let table = self.table.as_bytes();
        let mut out = Vec::with_capacity(database.len() + table.len() + row.len() + 20);
        out.extend_from_slice(b"DB: ");
        out.extend_from_slice(database);
        out.extend_from_slice(b", Table: ");
        out.extend_from_slice(table);
        out.extend_from_slice(b", Row: ");
        out.extend_from_slice(row.as_bytes());
        out
    }
}

impl fmt::Display for RowDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DB: {}, Table: {}, Row: {}",
            self.database.to_string_lossy(),
            self.table.to_string_lossy(),
            self.row
        )
    }
}

/// Live object counts per level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub databases: usize,
    pub tables: usize,
    pub rows: usize,
}

impl RegistryStats {
    pub fn total(&self) -> usize {
        self.databases + self.tables + self.rows
    }
}

/// Owner of every database, table and row in a handle chain.
///
/// A registry is not `Sync`-shared internally: all objects belong to whoever
/// owns the registry. Callers that need concurrent access wrap it in their
/// own lock.
#[derive(Debug)]
pub struct Registry {
    owner: OwnerId,
    databases: Arena<DatabaseRecord>,
    tables: Arena<TableRecord>,
    rows: Arena<RowRecord>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create a registry with the default limits from [`RegistryConfig`].
    pub fn new() -> Self {
        RegistryBuilder::new().build()
    }

    /// Create a builder for a registry with custom limits.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Owner stamped into every handle this registry issues.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    // ========================================
    // Database
    // ========================================

    /// Open a new database named `name`.
    pub fn create_database(&mut self, name: &CStr) -> Result<DatabaseHandle> {
        let id = self.databases.try_insert(DatabaseRecord {
            name: name.to_owned(),
            open_tables: 0,
        })?;
        debug!(kind = "database", handle = %id, name = ?name, "opened");
        Ok(DatabaseHandle(id))
    }

    /// Close a database. `None` is a no-op.
    ///
    /// Fails with [`TetherError::ChildrenOpen`] while any of its tables is
    /// open, leaving the database open.
    pub fn close_database(&mut self, database: Option<DatabaseHandle>) -> Result<()> {
        let Some(database) = database else {
            return Ok(());
        };
        let record = self.databases.lookup(database.0).inspect_err(log_rejected)?;
        if record.open_tables > 0 {
            let err = TetherError::ChildrenOpen {
                kind: HandleKind::Database,
                id: database.0,
                open: record.open_tables,
            };
            log_rejected(&err);
            return Err(err);
        }
        self.databases.remove(database.0);
        debug!(kind = "database", handle = %database, "closed");
        Ok(())
    }

    pub fn database_name(&self, database: DatabaseHandle) -> Result<&CStr> {
        Ok(self.databases.lookup(database.0)?.name.as_c_str())
    }

    /// Number of open tables derived from `database`.
    pub fn open_tables(&self, database: DatabaseHandle) -> Result<u32> {
        Ok(self.databases.lookup(database.0)?.open_tables)
    }

    pub fn is_database_open(&self, database: DatabaseHandle) -> bool {
        self.databases.contains(database.0)
    }

    // ========================================
    // Table
    // ========================================

    /// Open a table named `name` in `database`.
    pub fn add_table(
        &mut self,
        database: Option<DatabaseHandle>,
        name: &CStr,
    ) -> Result<TableHandle> {
        let database = database.ok_or(TetherError::NullParent {
            kind: HandleKind::Table,
        })?;
        self.databases.lookup(database.0).inspect_err(log_rejected)?;

        let id = self.tables.try_insert(TableRecord {
            database,
            name: name.to_owned(),
            open_rows: 0,
        })?;
        // Presence was checked above and nothing closed in between.
        if let Some(parent) = self.databases.get_mut(database.0) {
            parent.open_tables += 1;
        }
        debug!(kind = "table", handle = %id, parent = %database, name = ?name, "opened");
        Ok(TableHandle(id))
    }

    /// Close a table. `None` is a no-op.
    ///
    /// Fails with [`TetherError::ChildrenOpen`] while any of its rows is open.
    pub fn close_table(&mut self, table: Option<TableHandle>) -> Result<()> {
        let Some(table) = table else {
            return Ok(());
        };
        let record = self.tables.lookup(table.0).inspect_err(log_rejected)?;
        if record.open_rows > 0 {
            let err = TetherError::ChildrenOpen {
                kind: HandleKind::Table,
                id: table.0,
                open: record.open_rows,
            };
            log_rejected(&err);
            return Err(err);
        }
        let database = record.database;
        self.tables.remove(table.0);
        if let Some(parent) = self.databases.get_mut(database.0) {
            parent.open_tables = parent.open_tables.saturating_sub(1);
        }
        debug!(kind = "table", handle = %table, "closed");
        Ok(())
    }

    pub fn table_name(&self, table: TableHandle) -> Result<&CStr> {
        Ok(self.tables.lookup(table.0)?.name.as_c_str())
    }

    /// The database a table was opened from.
    pub fn table_database(&self, table: TableHandle) -> Result<DatabaseHandle> {
        Ok(self.tables.lookup(table.0)?.database)
    }

    /// Number of open rows derived from `table`.
    pub fn open_rows(&self, table: TableHandle) -> Result<u32> {
        Ok(self.tables.lookup(table.0)?.open_rows)
    }

    pub fn is_table_open(&self, table: TableHandle) -> bool {
        self.tables.contains(table.0)
    }

    // ========================================
    // Row
    // ========================================

    /// Open row `index` of `table`.
    pub fn get_row(&mut self, table: Option<TableHandle>, index: u32) -> Result<RowHandle> {
        let table = table.ok_or(TetherError::NullParent {
            kind: HandleKind::Row,
        })?;
        self.tables.lookup(table.0).inspect_err(log_rejected)?;

        let id = self.rows.try_insert(RowRecord { table, index })?;
        if let Some(parent) = self.tables.get_mut(table.0) {
            parent.open_rows += 1;
        }
        debug!(kind = "row", handle = %id, parent = %table, index, "opened");
        Ok(RowHandle(id))
    }

    /// Close a row. `None` is a no-op.
    pub fn close_row(&mut self, row: Option<RowHandle>) -> Result<()> {
        let Some(row) = row else {
            return Ok(());
        };
        let record = self.rows.remove(row.0).ok_or_else(|| {
            let err = TetherError::StaleHandle {
                kind: HandleKind::Row,
                id: row.0,
            };
            log_rejected(&err);
            err
        })?;
        if let Some(parent) = self.tables.get_mut(record.table.0) {
            parent.open_rows = parent.open_rows.saturating_sub(1);
        }
        debug!(kind = "row", handle = %row, "closed");
        Ok(())
    }

    pub fn row_index(&self, row: RowHandle) -> Result<u32> {
        Ok(self.rows.lookup(row.0)?.index)
    }

    /// The table a row was opened from.
    pub fn row_table(&self, row: RowHandle) -> Result<TableHandle> {
        Ok(self.rows.lookup(row.0)?.table)
    }

    pub fn is_row_open(&self, row: RowHandle) -> bool {
        self.rows.contains(row.0)
    }

    /// Walk from a row up to its database, checking every link.
    pub fn describe_row(&self, row: RowHandle) -> Result<RowDescription> {
        let row_record = self.rows.lookup(row.0).inspect_err(log_rejected)?;
        let table_record = self
            .tables
            .lookup(row_record.table.0)
            .inspect_err(log_rejected)?;
        let database_record = self
            .databases
            .lookup(table_record.database.0)
            .inspect_err(log_rejected)?;

        Ok(RowDescription {
            database: database_record.name.clone(),
            table: table_record.name.clone(),
            row: row_record.index,
        })
    }

    /// Live object counts.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            databases: self.databases.len(),
            tables: self.tables.len(),
            rows: self.rows.len(),
        }
    }

    /// Whether every object ever opened has been closed.
    pub fn is_empty(&self) -> bool {
        self.stats().total() == 0
    }
}

fn log_rejected(err: &TetherError) {
    warn!(kind = ?err.kind(), "Rejected handle: {}", err);
}

/// Builder for configuring a [`Registry`].
///
/// # Example
///
/// ```
/// use tether_core::Registry;
///
/// let registry = Registry::builder()
///     .initial_capacity(4)
///     .max_live_handles(Some(64))
///     .build();
/// assert!(registry.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    initial_capacity: usize,
    max_live_handles: Option<usize>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            initial_capacity: RegistryConfig::DEFAULT_INITIAL_CAPACITY,
            max_live_handles: RegistryConfig::DEFAULT_MAX_LIVE_HANDLES,
        }
    }

    /// Slots reserved up front in each level's arena.
    ///
    /// Default: [`RegistryConfig::DEFAULT_INITIAL_CAPACITY`]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Cap on simultaneously open objects per level. Creation beyond the cap
    /// fails with [`TetherError::AllocationFailed`].
    ///
    /// Default: unbounded
    pub fn max_live_handles(mut self, max: Option<usize>) -> Self {
        self.max_live_handles = max;
        self
    }

    /// Build a registry with a fresh [`OwnerId`].
    pub fn build(self) -> Registry {
        let owner = OwnerId::fresh();
        let (capacity, max_live) = (self.initial_capacity, self.max_live_handles);
        Registry {
            owner,
            databases: Arena::with_limits(HandleKind::Database, owner, capacity, max_live),
            tables: Arena::with_limits(HandleKind::Table, owner, capacity, max_live),
            rows: Arena::with_limits(HandleKind::Row, owner, capacity, max_live),
        }
    }
}
