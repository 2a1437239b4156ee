use gridtrace_core::{ElementId, Kilovolts};
use gridtrace_io::{load_path, write_tables, Table, Value};
use tempfile::tempdir;

fn tables() -> Vec<Table> {
    vec![
        Table::new("Element", &["Element_ID", "Name", "VoltLevel_ID", "Flag_State"])
            .with_row(vec![Value::Int(1), "Cable 1".into(), Value::Int(1), Value::Int(1)])
            .with_row(vec![Value::Int(2), "Cable 2".into(), Value::Int(1), Value::Int(1)]),
        Table::new(
            "Terminal",
            &["Terminal_ID", "Element_ID", "Node_ID", "TerminalNo", "Flag_Terminal"],
        )
        .with_row(vec![Value::Int(10), Value::Int(1), Value::Int(100), Value::Int(1), Value::Int(7)])
        .with_row(vec![Value::Int(11), Value::Int(1), Value::Int(101), Value::Int(2), Value::Int(7)])
        .with_row(vec![Value::Int(20), Value::Int(2), Value::Int(101), Value::Int(1), Value::Int(7)])
        .with_row(vec![Value::Int(21), Value::Int(2), Value::Int(102), Value::Int(2), Value::Int(7)]),
        Table::new("VoltageLevel", &["VoltLevel_ID", "Un"])
            .with_row(vec![Value::Int(1), Value::Real(0.4)]),
        Table::new("Line", &["Element_ID", "Flag_Variant", "l", "Flag_LineTyp", "r", "x"])
            .with_row(vec![
                Value::Int(1),
                Value::Int(1),
                Value::Real(0.1),
                Value::Int(1),
                Value::Real(0.2),
                Value::Real(0.08),
            ])
            .with_row(vec![
                Value::Int(2),
                Value::Int(1),
                Value::Real(0.2),
                Value::Int(2),
                Value::Real(0.3),
                Value::Null,
            ]),
        Table::new("Breaker", &["Breaker_ID", "Terminal_ID", "Name", "Flag_Variant", "Flag_State"])
            .with_row(vec![Value::Int(5), Value::Int(21), "Fuse 2".into(), Value::Int(1), Value::Int(0)]),
    ]
}

#[test]
fn test_load_path_reads_sqlite_database() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("network.db");
    write_tables(&path, &tables()).unwrap();

    let (store, diagnostics) = load_path(&path).unwrap();
    assert!(!diagnostics.has_errors());
    assert_eq!(store.element_count(), 2);
    assert_eq!(store.bus_count(), 3);

    let second = store.element(&ElementId::from("2")).unwrap();
    let breaker = second.terminal(2).unwrap().breaker.as_ref().unwrap();
    assert_eq!(breaker.name, "Fuse 2");
    assert!(!breaker.closed);
    assert_eq!(second.voltage_kv, Some(Kilovolts(0.4)));
}

#[test]
fn test_database_without_terminals_is_fatal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("network.db");
    let element = Table::new("Element", &["Element_ID", "Name"])
        .with_row(vec![Value::Int(1), "x".into()]);
    write_tables(&path, &[element]).unwrap();
    let err = load_path(&path).unwrap_err();
    assert!(format!("{err:#}").contains("Terminal"));
}

#[test]
fn test_load_path_rejects_missing_input() {
    let dir = tempdir().unwrap();
    let err = load_path(dir.path().join("nope")).unwrap_err();
    assert!(err.to_string().contains("is not a directory or a database file"));
}
