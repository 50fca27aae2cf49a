//! File-level round trips of state tables.
//!
//! To run: cargo test -p msk-table --test sto_roundtrip

#![allow(clippy::unwrap_used, clippy::expect_used)]

use approx::assert_relative_eq;
use msk_table::{FilterSpec, Header, StateTable, TableError, filter, read_table, write_table};
use tempfile::tempdir;

fn trajectory() -> StateTable {
    StateTable::from_columns(
        vec![
            "time".into(),
            "/jointset/knee/knee_flexion/value".into(),
            "/jointset/knee/knee_flexion/speed".into(),
            "/forceset/soleus/activation".into(),
        ],
        vec![
            vec![0.0, 0.01, 0.02, 0.03],
            vec![0.1, 0.125, 0.15, 0.175],
            vec![2.5, 2.5, 2.5, 2.5],
            vec![0.05, 0.1, 0.2, 0.4],
        ],
    )
    .unwrap()
}

#[test]
fn written_table_reads_back_identically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("walk_success.sto");
    let header = Header::new(["walk", "version=1", "nRows=0", "inDegrees=no"]);

    write_table(&path, &trajectory(), &header).unwrap();
    let (table, read_header) = read_table(&path).unwrap();

    assert_eq!(table, trajectory());
    assert_eq!(read_header.get("nRows"), Some("4"));
    assert_eq!(read_header.lines()[0], "walk");
    assert_eq!(read_header.in_degrees(), Some(false));
}

#[test]
fn write_overwrites_existing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.sto");
    std::fs::write(&path, "stale content that is not a table").unwrap();

    write_table(&path, &trajectory(), &Header::minimal("run", false)).unwrap();
    let (table, _) = read_table(&path).unwrap();
    assert_eq!(table.row_count(), 4);
}

#[test]
fn filtered_table_keeps_shape_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("masked.sto");
    let spec = FilterSpec::new(["FORCESET"]);

    let masked = filter::apply(&trajectory(), &spec);
    write_table(&path, &masked, &Header::minimal("masked", false)).unwrap();
    let (table, _) = read_table(&path).unwrap();

    assert_eq!(table.column_count(), 4);
    assert_eq!(table.time(), trajectory().time());
    assert!(table.column("/forceset/soleus/activation").unwrap().iter().all(|v| *v == 0.0));
    assert_relative_eq!(table.column("/jointset/knee/knee_flexion/value").unwrap()[3], 0.175);
}

#[test]
fn unsupported_extension_is_rejected_before_io() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.csv");
    let err = write_table(&path, &trajectory(), &Header::default()).unwrap_err();
    assert!(matches!(err, TableError::UnsupportedFormat { .. }));
    assert!(!path.exists());
}
