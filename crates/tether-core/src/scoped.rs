//! Lifetime-checked wrappers over a [`Registry`].
//!
//! Each wrapper borrows its parent, so the borrow checker rejects closing a
//! database before its tables or a table before its rows. Dropping a wrapper
//! closes the underlying handle; [`Database::close`] and friends consume the
//! wrapper, so a second close does not compile.
//!
//! ```
//! use tether_core::Session;
//!
//! let session = Session::new();
//! let db = session.open_database(c"example_db")?;
//! let table = db.add_table(c"example_table")?;
//! let row = table.get_row(10)?;
//! assert_eq!(
//!     row.describe()?.to_string(),
//!     "DB: example_db, Table: example_table, Row: 10"
//! );
//! # Ok::<(), tether_core::TetherError>(())
//! ```
//!
//! ```compile_fail
//! use tether_core::Session;
//!
//! let session = Session::new();
//! let db = session.open_database(c"db").unwrap();
//! let table = db.add_table(c"t").unwrap();
//! drop(db); // `db` is still borrowed by `table`
//! table.get_row(0).unwrap();
//! ```

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;

use tracing::warn;

use crate::error::Result;
use crate::registry::{
    DatabaseHandle, Registry, RegistryStats, RowDescription, RowHandle, TableHandle,
};

/// Single-owner scope that hands out borrowing wrappers.
///
/// `Session` is neither `Sync` nor meant to be shared: the chain belongs to
/// the code that owns the session.
#[derive(Debug, Default)]
pub struct Session {
    registry: RefCell<Registry>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Use a pre-configured registry, e.g. one built with limits.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry: RefCell::new(registry),
        }
    }

    /// Open a database that lives no longer than this session.
    pub fn open_database(&self, name: &CStr) -> Result<Database<'_>> {
        let handle = self.registry.borrow_mut().create_database(name)?;
        Ok(Database {
            session: self,
            handle,
        })
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.borrow().stats()
    }

    /// Take the registry back, e.g. to inspect it after every wrapper is gone.
    pub fn into_registry(self) -> Registry {
        self.registry.into_inner()
    }
}

/// An open database borrowed from a [`Session`].
#[derive(Debug)]
pub struct Database<'s> {
    session: &'s Session,
    handle: DatabaseHandle,
}

impl<'s> Database<'s> {
    pub fn handle(&self) -> DatabaseHandle {
        self.handle
    }

    pub fn name(&self) -> Result<CString> {
        Ok(self
            .session
            .registry
            .borrow()
            .database_name(self.handle)?
            .to_owned())
    }

    /// Open a table that cannot outlive this database.
    pub fn add_table(&self, name: &CStr) -> Result<Table<'_>> {
        let handle = self
            .session
            .registry
            .borrow_mut()
            .add_table(Some(self.handle), name)?;
        Ok(Table {
            session: self.session,
            handle,
        })
    }

    /// Close now, reporting any failure.
    pub fn close(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        this.session
            .registry
            .borrow_mut()
            .close_database(Some(this.handle))
    }
}

impl Drop for Database<'_> {
    fn drop(&mut self) {
        let result = self
            .session
            .registry
            .borrow_mut()
            .close_database(Some(self.handle));
        if let Err(e) = result {
            warn!("Failed to close database on drop: {}", e);
        }
    }
}

/// An open table borrowed from a [`Database`].
#[derive(Debug)]
pub struct Table<'d> {
    session: &'d Session,
    handle: TableHandle,
}

impl<'d> Table<'d> {
    pub fn handle(&self) -> TableHandle {
        self.handle
    }

    pub fn name(&self) -> Result<CString> {
        Ok(self
            .session
            .registry
            .borrow()
            .table_name(self.handle)?
            .to_owned())
    }

    /// Open a row that cannot outlive this table.
    pub fn get_row(&self, index: u32) -> Result<Row<'_>> {
        let handle = self
            .session
            .registry
            .borrow_mut()
            .get_row(Some(self.handle), index)?;
        Ok(Row {
            session: self.session,
            handle,
        })
    }

    pub fn close(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        this.session
            .registry
            .borrow_mut()
            .close_table(Some(this.handle))
    }
}

impl Drop for Table<'_> {
    fn drop(&mut self) {
        let result = self
            .session
            .registry
            .borrow_mut()
            .close_table(Some(self.handle));
        if let Err(e) = result {
            warn!("Failed to close table on drop: {}", e);
        }
    }
}

/// An open row borrowed from a [`Table`].
#[derive(Debug)]
pub struct Row<'t> {
    session: &'t Session,
    handle: RowHandle,
}

impl<'t> Row<'t> {
    pub fn handle(&self) -> RowHandle {
        self.handle
    }

    pub fn index(&self) -> Result<u32> {
        self.session.registry.borrow().row_index(self.handle)
    }

    pub fn describe(&self) -> Result<RowDescription> {
        self.session.registry.borrow().describe_row(self.handle)
    }

    pub fn close(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        this.session.registry.borrow_mut().close_row(Some(this.handle))
    }
}

impl Drop for Row<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.session.registry.borrow_mut().close_row(Some(self.handle)) {
            warn!("Failed to close row on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_closes_in_reverse_order() {
        let session = Session::new();
        {
            let db = session.open_database(c"db").unwrap();
            let table = db.add_table(c"t").unwrap();
            let _a = table.get_row(0).unwrap();
            let _b = table.get_row(1).unwrap();
            assert_eq!(session.stats().total(), 4);
        }
        assert_eq!(session.stats().total(), 0);
    }

    #[test]
    fn test_explicit_close() {
        let session = Session::new();
        let db = session.open_database(c"db").unwrap();
        let table = db.add_table(c"t").unwrap();
        let row = table.get_row(7).unwrap();

        assert_eq!(row.index(), Ok(7));
        row.close().unwrap();
        table.close().unwrap();
        db.close().unwrap();
        assert!(session.into_registry().is_empty());
    }

    #[test]
    fn test_names_are_owned_copies() {
        let session = Session::new();
        let db = {
            let name = CString::new("scoped").unwrap();
            session.open_database(&name).unwrap()
        };
        assert_eq!(db.name().unwrap().as_c_str(), c"scoped");
        let table = db.add_table(c"inner").unwrap();
        assert_eq!(table.name().unwrap().as_c_str(), c"inner");
    }

    #[test]
    fn test_forgotten_child_keeps_parent_open() {
        let session = Session::new();
        let db = session.open_database(c"db").unwrap();
        let table = db.add_table(c"t").unwrap();
        std::mem::forget(table);

        // The leaked table still counts, so the database refuses to close.
        assert!(db.close().unwrap_err().is_lifetime_violation());
        assert_eq!(session.stats().databases, 1);
    }

    #[test]
    fn test_error_propagates_from_limits() {
        let registry = Registry::builder().max_live_handles(Some(1)).build();
        let session = Session::with_registry(registry);
        let db = session.open_database(c"db").unwrap();
        assert!(session.open_database(c"second").is_err());
        let table = db.add_table(c"t").unwrap();
        assert!(db.add_table(c"u").is_err());
        let _row = table.get_row(0).unwrap();
        assert!(table.get_row(1).is_err());
    }
}
