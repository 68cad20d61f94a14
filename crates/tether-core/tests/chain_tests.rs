//! Integration tests for the handle chain and the adder through the public API.

use std::ffi::CString;

use tether_core::{
    HandleKind, HeapAdder, MagicAdder, Registry, RowHandle, Session, TableHandle, TetherError,
};

/// Build `databases × tables × rows` objects and return every row with the
/// labels it was built from.
fn build_chain(
    registry: &mut Registry,
    databases: usize,
    tables: usize,
    rows: u32,
) -> Vec<(RowHandle, CString, CString, u32)> {
    let mut out = Vec::new();
    for d in 0..databases {
        let db_name = CString::new(format!("db_{}", d)).unwrap();
        let db = registry.create_database(&db_name).unwrap();
        for t in 0..tables {
            let table_name = CString::new(format!("db_{}_table_{}", d, t)).unwrap();
            let table = registry.add_table(Some(db), &table_name).unwrap();
            for r in 0..rows {
                let index = r * 7 + t as u32;
                let row = registry.get_row(Some(table), index).unwrap();
                out.push((row, db_name.clone(), table_name.clone(), index));
            }
        }
    }
    out
}

#[test]
fn test_example_scenario() {
    let mut registry = Registry::new();
    let db = registry.create_database(c"example_db").unwrap();
    let table = registry.add_table(Some(db), c"example_table").unwrap();
    let row = registry.get_row(Some(table), 10).unwrap();

    assert_eq!(
        registry.describe_row(row).unwrap().to_string(),
        "DB: example_db, Table: example_table, Row: 10"
    );

    assert!(registry.close_row(Some(row)).is_ok());
    assert!(registry.close_table(Some(table)).is_ok());
    assert!(registry.close_database(Some(db)).is_ok());
    assert!(registry.is_empty());
}

#[test]
fn test_every_row_describes_its_own_chain() {
    let mut registry = Registry::new();
    let rows = build_chain(&mut registry, 3, 4, 5);
    assert_eq!(rows.len(), 60);

    for (row, db_name, table_name, index) in &rows {
        let description = registry.describe_row(*row).unwrap();
        assert_eq!(&description.database, db_name);
        assert_eq!(&description.table, table_name);
        assert_eq!(description.row, *index);
    }
}

#[test]
fn test_chain_survives_interleaved_closes() {
    let mut registry = Registry::new();
    let rows = build_chain(&mut registry, 2, 2, 4);

    // Close every other row, then re-check the survivors.
    for (row, ..) in rows.iter().step_by(2) {
        registry.close_row(Some(*row)).unwrap();
    }
    for (i, (row, db_name, table_name, index)) in rows.iter().enumerate() {
        if i % 2 == 0 {
            assert!(!registry.is_row_open(*row));
            continue;
        }
        let description = registry.describe_row(*row).unwrap();
        assert_eq!(
            (&description.database, &description.table, description.row),
            (db_name, table_name, *index)
        );
    }
}

#[test]
fn test_closing_absent_handles_is_a_no_op() {
    let mut registry = Registry::new();
    let db = registry.create_database(c"db").unwrap();
    let before = registry.stats();

    for _ in 0..3 {
        assert_eq!(registry.close_row(None), Ok(()));
        assert_eq!(registry.close_table(None), Ok(()));
        assert_eq!(registry.close_database(None), Ok(()));
    }

    assert_eq!(registry.stats(), before);
    assert!(registry.is_database_open(db));
}

#[test]
fn test_parent_is_required() {
    let mut registry = Registry::new();

    assert_eq!(
        registry.add_table(None, c"orphan"),
        Err(TetherError::NullParent {
            kind: HandleKind::Table
        })
    );
    assert_eq!(
        registry.get_row(None, 0),
        Err(TetherError::NullParent {
            kind: HandleKind::Row
        })
    );
    assert!(registry.is_empty());
}

#[test]
fn test_closed_parent_cannot_create_children() {
    let mut registry = Registry::new();
    let db = registry.create_database(c"db").unwrap();
    let table = registry.add_table(Some(db), c"t").unwrap();
    registry.close_table(Some(table)).unwrap();

    let err = registry.get_row(Some(table), 0).unwrap_err();
    assert_eq!(
        err,
        TetherError::StaleHandle {
            kind: HandleKind::Table,
            id: table.id()
        }
    );

    registry.close_database(Some(db)).unwrap();
    assert!(registry.add_table(Some(db), c"t").is_err());
}

#[test]
fn test_double_close_is_reported() {
    let mut registry = Registry::new();
    let db = registry.create_database(c"db").unwrap();
    let table = registry.add_table(Some(db), c"t").unwrap();
    let row = registry.get_row(Some(table), 1).unwrap();

    registry.close_row(Some(row)).unwrap();
    let err = registry.close_row(Some(row)).unwrap_err();
    assert!(err.is_lifetime_violation());

    registry.close_table(Some(table)).unwrap();
    assert!(registry.close_table(Some(table)).is_err());
    registry.close_database(Some(db)).unwrap();
    assert!(registry.close_database(Some(db)).is_err());
}

#[test]
fn test_use_after_close_is_reported() {
    let mut registry = Registry::new();
    let db = registry.create_database(c"db").unwrap();
    let table = registry.add_table(Some(db), c"t").unwrap();
    let row = registry.get_row(Some(table), 1).unwrap();
    registry.close_row(Some(row)).unwrap();

    assert!(matches!(
        registry.describe_row(row),
        Err(TetherError::StaleHandle {
            kind: HandleKind::Row,
            ..
        })
    ));
    assert!(registry.row_index(row).is_err());
}

#[test]
fn test_stale_handle_does_not_alias_reused_slot() {
    let mut registry = Registry::new();
    let db = registry.create_database(c"db").unwrap();
    let first = registry.add_table(Some(db), c"first").unwrap();
    registry.close_table(Some(first)).unwrap();
    let second = registry.add_table(Some(db), c"second").unwrap();

    assert_eq!(first.id().index(), second.id().index());
    assert!(registry.table_name(first).is_err());
    assert_eq!(registry.table_name(second).unwrap(), c"second");
    // Closing through the stale handle must not touch the new table.
    assert!(registry.close_table(Some(first)).is_err());
    assert!(registry.is_table_open(second));
}

#[test]
fn test_handles_from_another_registry_are_stale() {
    let mut a = Registry::new();
    let mut b = Registry::new();
    let a_db = a.create_database(c"a").unwrap();
    let a_table = a.add_table(Some(a_db), c"t").unwrap();
    // B holds live objects in the very slots A's handles name.
    let b_db = b.create_database(c"b").unwrap();
    let b_table = b.add_table(Some(b_db), c"u").unwrap();
    assert_eq!(a_table.id().index(), b_table.id().index());
    assert_eq!(a_table.id().generation(), b_table.id().generation());

    assert!(b.get_row(Some(a_table), 0).is_err());
    assert!(matches!(
        b.close_table(Some(TableHandle::from_id(a_table.id()))),
        Err(TetherError::StaleHandle {
            kind: HandleKind::Table,
            ..
        })
    ));
    assert!(b.close_database(Some(a_db)).is_err());

    assert!(b.is_table_open(b_table));
    assert!(b.is_database_open(b_db));
    assert_eq!(b.open_tables(b_db), Ok(1));
    assert!(a.is_table_open(a_table));
}

#[test]
fn test_scoped_session_scenario() {
    let session = Session::new();
    let db = session.open_database(c"example_db").unwrap();
    let table = db.add_table(c"example_table").unwrap();
    let row = table.get_row(10).unwrap();
    assert_eq!(
        row.describe().unwrap().to_string(),
        "DB: example_db, Table: example_table, Row: 10"
    );

    row.close().unwrap();
    table.close().unwrap();
    db.close().unwrap();
    assert_eq!(session.stats().total(), 0);
}

#[test]
fn test_adder_embodiments_agree() {
    let bases = [0u32, 1, 5, 1 << 16, u32::MAX / 2, u32::MAX];
    let inputs = [0u32, 1, 6, 1 << 31, u32::MAX];

    for &base in &bases {
        let value = MagicAdder::new(base);
        let heap = HeapAdder::try_new(base).unwrap();
        for &input in &inputs {
            let expected = base.wrapping_add(input);
            assert_eq!(tether_core::process(&value, input), expected);
            assert_eq!(value.process_value(input), expected);
            assert_eq!(heap.process_value(input), expected);
        }
        heap.destroy();
    }
}

#[test]
fn test_adder_heap_scenario() {
    let heap = HeapAdder::try_new(5).unwrap();
    assert_eq!(heap.process_value(6), 11);
    heap.destroy();
}
