//! Unit tests for the interop layer, run against the build's own shim.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use test_case::test_case;

use super::*;
use crate::params;
use crate::platform::{self, NativeStorage, Platform, Storage};
use crate::provider::NativeProvider;

fn exec(conn: &Connection, sql: &str) {
    conn.prepare(sql)
        .unwrap_or_else(|e| panic!("prepare {sql:?}: {e}"))
        .step()
        .unwrap_or_else(|e| panic!("step {sql:?}: {e}"));
}

// ── Connection lifecycle ────────────────────────────────────────────────

#[test]
fn open_and_close_in_memory() {
    let mut conn = Connection::open_in_memory().expect("open in-memory db");
    exec(&conn, "CREATE TABLE t (x INTEGER)");
    conn.close();
    conn.close(); // idempotent
    let err = conn.prepare("SELECT 1").expect_err("closed connection");
    assert!(matches!(err, Error::Sqlite { code: 21, .. }));
}

#[test]
fn open_temporary_database() {
    let conn = Connection::open(TEMPORARY_DB).expect("open temporary db");
    exec(&conn, "CREATE TABLE t (x INTEGER)");
    exec(&conn, "INSERT INTO t (x) VALUES (1)");
}

#[test]
fn open_file_database_persists() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("t.db");
    let path = path.to_str().expect("utf-8 path");

    {
        let conn = Connection::open(path).expect("create file db");
        exec(&conn, "CREATE TABLE t (x INTEGER)");
        exec(&conn, "INSERT INTO t (x) VALUES (42)");
    }

    let conn = Connection::open(path).expect("reopen file db");
    let mut stmt = conn.prepare("SELECT x FROM t").expect("prepare");
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(stmt.column_i64(0).expect("read"), 42);
}

#[test]
fn open_rejects_unrepresentable_path_before_native() {
    let err = Connection::open("bad\0path.db").expect_err("nul in path");
    assert!(matches!(err, Error::InvalidPath { .. }));
}

#[test]
fn open_missing_directory_reports_engine_error() {
    let err = Connection::open("/crosslite-no-such-dir/t.db").expect_err("cannot open");
    match err {
        Error::Sqlite { code, message } => {
            assert_eq!(code, 14); // SQLITE_CANTOPEN
            assert!(message.contains("unable to open database file"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn prepare_failure_leaves_connection_usable() {
    let conn = Connection::open_in_memory().expect("open");
    let err = conn.prepare("AN INVALID STATEMENT;").expect_err("bad sql");
    match err {
        Error::Sqlite { message, .. } => {
            assert!(message.contains("AN INVALID STATEMENT"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(conn.error_message().is_some());
    exec(&conn, "CREATE TABLE t (x INTEGER)");
}

// ── Binding and reading ─────────────────────────────────────────────────

fn round_trip(value: Value) -> ColumnValue {
    let conn = Connection::open_in_memory().expect("open");
    exec(&conn, "CREATE TABLE t (v)");
    let mut insert = conn.prepare("INSERT INTO t (v) VALUES (?1)").expect("prepare");
    insert.bind(1, value).expect("bind");
    insert.step().expect("insert");

    let mut select = conn.prepare("SELECT v FROM t").expect("prepare");
    assert_eq!(select.step().expect("step"), StepResult::Row);
    select.column_value(0).expect("read")
}

#[test_case(Value::Int(-7), ColumnValue::Integer(-7); "int32")]
#[test_case(Value::Int64(1 << 40), ColumnValue::Integer(1 << 40); "int64")]
#[test_case(Value::Text("smörgåsbord".to_string()), ColumnValue::Text("smörgåsbord".to_string()); "text")]
#[test_case(Value::Blob(vec![0xDE, 0xAD, 0xBE, 0xEF]), ColumnValue::Blob(vec![0xDE, 0xAD, 0xBE, 0xEF]); "blob")]
#[test_case(Value::Null, ColumnValue::Null; "null")]
fn bound_value_round_trips(value: Value, expected: ColumnValue) {
    assert_eq!(round_trip(value), expected);
}

#[test]
fn float_round_trips_within_tolerance() {
    let bound = 1234.567_890_123_4_f64;
    match round_trip(Value::Double(bound)) {
        ColumnValue::Float(read) => {
            assert!((read - bound).abs() <= bound.abs() * 1e-12, "{read} vs {bound}");
        }
        other => panic!("expected a float, got {other:?}"),
    }
}

#[test]
fn zero_length_blob_is_empty_not_null() {
    let read = round_trip(Value::Blob(Vec::new()));
    assert_eq!(read, ColumnValue::Blob(Vec::new()));
    assert!(!read.is_null());
}

#[test]
fn column_type_is_read_per_row() {
    let conn = Connection::open_in_memory().expect("open");
    exec(&conn, "CREATE TABLE mixed (v)");
    exec(&conn, "INSERT INTO mixed (v) VALUES (42)");
    exec(&conn, "INSERT INTO mixed (v) VALUES ('forty-two')");

    let mut stmt = conn
        .prepare("SELECT v FROM mixed ORDER BY rowid")
        .expect("prepare");
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(stmt.column_value(0).expect("read"), ColumnValue::Integer(42));
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    assert_eq!(
        stmt.column_value(0).expect("read"),
        ColumnValue::Text("forty-two".to_string())
    );
}

#[test]
fn bind_by_name_resolves_parameter_index() {
    let conn = Connection::open_in_memory().expect("open");
    exec(&conn, "CREATE TABLE t (x INTEGER, y TEXT)");

    let mut insert = conn
        .prepare("INSERT INTO t (x, y) VALUES (:x, :y)")
        .expect("prepare");
    insert.bind_name(":y", "named").expect("bind :y");
    insert.bind_name(":x", 3_i64).expect("bind :x");
    insert.step().expect("insert");

    let err = insert.bind_name(":missing", 1_i64).expect_err("unknown name");
    assert!(matches!(err, Error::Sqlite { code: 25, .. }));

    let mut select = conn.prepare("SELECT x, y FROM t").expect("prepare");
    assert_eq!(select.step().expect("step"), StepResult::Row);
    assert_eq!(select.column_i64(0).expect("x"), 3);
    assert_eq!(select.column_text(1).expect("y"), "named");
}

#[test]
fn parameter_metadata() {
    let conn = Connection::open_in_memory().expect("open");
    exec(&conn, "CREATE TABLE t (x INTEGER, y TEXT)");
    let stmt = conn
        .prepare("INSERT INTO t (x, y) VALUES (:x, ?)")
        .expect("prepare");
    assert_eq!(stmt.parameter_count().expect("count"), 2);
    assert_eq!(stmt.parameter_name(1).expect("name").as_deref(), Some(":x"));
    // Bare `?` parameters are the only nameless kind.
    assert_eq!(stmt.parameter_name(2).expect("name"), None);
}

#[test]
fn statement_reuse_with_reset_and_clear_bindings() {
    let conn = Connection::open_in_memory().expect("open");
    exec(&conn, "CREATE TABLE t (x INTEGER)");

    let mut insert = conn.prepare("INSERT INTO t (x) VALUES (?1)").expect("prepare");
    for i in 0..3_i64 {
        insert.bind(1, i).expect("bind");
        assert_eq!(insert.step().expect("insert"), StepResult::Done);
        insert.reset().expect("reset");
        insert.clear_bindings().expect("clear");
    }

    let mut count = conn.prepare("SELECT COUNT(*) FROM t").expect("prepare");
    assert_eq!(count.step().expect("step"), StepResult::Row);
    assert_eq!(count.column_i64(0).expect("count"), 3);
}

#[test]
fn column_names_and_lookup() {
    let conn = Connection::open_in_memory().expect("open");
    let stmt = conn
        .prepare("SELECT 1 AS first, 'two' AS Second")
        .expect("prepare");
    assert_eq!(stmt.column_name(0).expect("name").as_deref(), Some("first"));
    assert_eq!(stmt.column_index("second").expect("lookup"), Some(1));
    assert_eq!(stmt.column_index("third").expect("lookup"), None);
}

#[test]
fn column_index_out_of_range_fails() {
    let conn = Connection::open_in_memory().expect("open");
    let mut stmt = conn.prepare("SELECT 1").expect("prepare");
    assert_eq!(stmt.step().expect("step"), StepResult::Row);
    let err = stmt.column_value(5).expect_err("out of range");
    assert!(matches!(err, Error::Sqlite { code: 25, .. }));
}

// ── data_count life cycle ───────────────────────────────────────────────

#[test]
fn data_count_tracks_row_availability() {
    let conn = Connection::open_in_memory().expect("open");
    exec(&conn, "CREATE TABLE t (x INTEGER, y TEXT)");
    exec(&conn, "INSERT INTO t (x, y) VALUES (1, 'a')");
    exec(&conn, "INSERT INTO t (x, y) VALUES (2, 'b')");

    let mut stmt = conn.prepare("SELECT x, y FROM t").expect("prepare");
    assert_eq!(stmt.data_count().expect("before"), 0);

    let mut rows = 0;
    while stmt.step().expect("step") == StepResult::Row {
        rows += 1;
        assert_eq!(
            stmt.data_count().expect("during"),
            stmt.column_count().expect("columns")
        );
    }
    assert_eq!(rows, 2);
    assert_eq!(stmt.data_count().expect("after"), 0);
}

// ── Release semantics ───────────────────────────────────────────────────

#[test]
fn finalized_statement_fails_fast() {
    let conn = Connection::open_in_memory().expect("open");
    let mut stmt = conn.prepare("SELECT 1").expect("prepare");
    stmt.finalize();
    stmt.finalize(); // idempotent

    let err = stmt.step().expect_err("use after finalize");
    assert!(matches!(err, Error::Sqlite { code: 21, .. }));
    assert!(stmt.column_count().is_err());
    assert!(stmt.bind(1, 1_i64).is_err());
}

// ── The insert/select scenario ──────────────────────────────────────────

#[test]
fn five_rows_round_trip_in_order() {
    let conn = Connection::open_in_memory().expect("open");
    exec(&conn, "CREATE TABLE t (x INTEGER, y TEXT)");

    let mut insert = conn
        .prepare("INSERT INTO t (x, y) VALUES (?1, ?2)")
        .expect("prepare");
    for i in 0..5_i64 {
        insert.bind_all(params![i, format!("s{i}")]).expect("bind");
        assert_eq!(insert.step().expect("insert"), StepResult::Done);
        insert.reset().expect("reset");
    }

    let mut select = conn
        .prepare("SELECT x, y FROM t ORDER BY x")
        .expect("prepare");
    let mut expected = 0_i64;
    while select.step().expect("step") == StepResult::Row {
        assert_eq!(select.column_i64(0).expect("x"), expected);
        assert_eq!(select.column_text(1).expect("y"), format!("s{expected}"));
        expected += 1;
    }
    assert_eq!(expected, 5);
}

// ── Custom scalar functions ─────────────────────────────────────────────

#[test]
fn scalar_function_matches_host_computation() {
    let conn = Connection::open_in_memory().expect("open");
    conn.create_scalar_function("imax", 2, true, |args| {
        let a = args[0]
            .as_integer()
            .ok_or_else(|| FunctionError::new("imax expects integers"))?;
        let b = args[1]
            .as_integer()
            .ok_or_else(|| FunctionError::new("imax expects integers"))?;
        Ok(Value::Int64(a.max(b)))
    })
    .expect("register imax");

    exec(&conn, "CREATE TABLE pairs (a INTEGER, b INTEGER)");
    let inputs: &[(i64, i64)] = &[(1, 9), (4, 4), (-3, -8), (100, 7), (0, -1)];
    let mut insert = conn
        .prepare("INSERT INTO pairs (a, b) VALUES (?1, ?2)")
        .expect("prepare");
    for &(a, b) in inputs {
        insert.bind_all(params![a, b]).expect("bind");
        insert.step().expect("insert");
        insert.reset().expect("reset");
    }

    let mut select = conn
        .prepare("SELECT imax(a, b) FROM pairs ORDER BY rowid")
        .expect("prepare");
    for &(a, b) in inputs {
        assert_eq!(select.step().expect("step"), StepResult::Row);
        assert_eq!(select.column_i64(0).expect("read"), a.max(b));
    }
    assert_eq!(select.step().expect("step"), StepResult::Done);
}

#[test]
fn scalar_function_over_zero_rows_never_runs() {
    let conn = Connection::open_in_memory().expect("open");
    conn.create_scalar_function("must_not_run", 1, false, |_| {
        Err(FunctionError::new("invoked over an empty table"))
    })
    .expect("register");

    exec(&conn, "CREATE TABLE empty (v)");
    let mut select = conn
        .prepare("SELECT must_not_run(v) FROM empty")
        .expect("prepare");
    assert_eq!(select.step().expect("step"), StepResult::Done);
}

#[test]
fn scalar_function_error_surfaces_through_step() {
    let conn = Connection::open_in_memory().expect("open");
    conn.create_scalar_function("always_fails", 0, false, |_| {
        Err(FunctionError::new("deliberate failure"))
    })
    .expect("register");

    let mut select = conn.prepare("SELECT always_fails()").expect("prepare");
    let err = select.step().expect_err("function error");
    match err {
        Error::Sqlite { message, .. } => {
            assert!(message.contains("deliberate failure"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn scalar_function_decodes_every_argument_kind() {
    let conn = Connection::open_in_memory().expect("open");
    conn.create_scalar_function("describe", -1, true, |args| {
        let tags: Vec<&str> = args
            .iter()
            .map(|arg| match arg {
                ColumnValue::Integer(_) => "int",
                ColumnValue::Float(_) => "float",
                ColumnValue::Text(_) => "text",
                ColumnValue::Blob(_) => "blob",
                ColumnValue::Null => "null",
            })
            .collect();
        Ok(Value::Text(tags.join(",")))
    })
    .expect("register");

    let mut select = conn
        .prepare("SELECT describe(1, 2.5, 'x', x'00ff', NULL)")
        .expect("prepare");
    assert_eq!(select.step().expect("step"), StepResult::Row);
    assert_eq!(
        select.column_text(0).expect("read"),
        "int,float,text,blob,null"
    );
}

// ── Custom aggregates ───────────────────────────────────────────────────

fn register_isum(conn: &Connection) {
    conn.create_aggregate(
        "isum",
        1,
        true,
        |state, args| {
            let v = args[0]
                .as_integer()
                .ok_or_else(|| FunctionError::new("isum expects an integer"))?;
            *state.get_or_default::<i64>() += v;
            Ok(())
        },
        |state| Ok(Value::Int64(state.into_inner::<i64>().unwrap_or(0))),
    )
    .expect("register isum");
}

#[test]
fn aggregate_reports_one_final_per_group() {
    let conn = Connection::open_in_memory().expect("open");
    register_isum(&conn);

    exec(&conn, "CREATE TABLE samples (grp TEXT, val INTEGER)");
    let rows: &[(&str, i64)] = &[
        ("a", 1),
        ("b", 10),
        ("a", 2),
        ("c", 5),
        ("b", 20),
        ("a", 3),
    ];
    let mut insert = conn
        .prepare("INSERT INTO samples (grp, val) VALUES (?1, ?2)")
        .expect("prepare");
    for &(grp, val) in rows {
        insert.bind_all(params![grp, val]).expect("bind");
        insert.step().expect("insert");
        insert.reset().expect("reset");
    }

    let mut select = conn
        .prepare("SELECT grp, isum(val) FROM samples GROUP BY grp ORDER BY grp")
        .expect("prepare");
    let mut finals = Vec::new();
    while select.step().expect("step") == StepResult::Row {
        finals.push((
            select.column_text(0).expect("grp"),
            select.column_i64(1).expect("sum"),
        ));
    }
    assert_eq!(
        finals,
        vec![
            ("a".to_string(), 6),
            ("b".to_string(), 30),
            ("c".to_string(), 5)
        ]
    );
}

#[test]
fn aggregate_over_empty_input_finalizes_once() {
    let conn = Connection::open_in_memory().expect("open");
    register_isum(&conn);
    exec(&conn, "CREATE TABLE samples (grp TEXT, val INTEGER)");

    let mut select = conn.prepare("SELECT isum(val) FROM samples").expect("prepare");
    assert_eq!(select.step().expect("step"), StepResult::Row);
    assert_eq!(select.column_i64(0).expect("sum"), 0);
    assert_eq!(select.step().expect("step"), StepResult::Done);
}

// ── Platform resolution and injection ───────────────────────────────────

/// Delegates to the built-in rules while counting calls, so an installed
/// override never changes behavior for concurrently running tests.
struct CountingStorage(&'static AtomicUsize);

impl Storage for CountingStorage {
    fn local_file_path(&self, name: &str) -> Result<PathBuf> {
        self.0.fetch_add(1, Ordering::SeqCst);
        NativeStorage.local_file_path(name)
    }

    fn temp_directory(&self) -> PathBuf {
        NativeStorage.temp_directory()
    }
}

static RESOLVER_GUARD: Mutex<()> = Mutex::new(());

#[test]
fn resolve_is_idempotent() {
    let _guard = RESOLVER_GUARD
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let first = platform::resolve().expect("resolve");
    let second = platform::resolve().expect("resolve");
    assert!(std::ptr::eq(first, second));
}

#[test]
fn resolver_override_substitutes_platform() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static STORAGE: CountingStorage = CountingStorage(&CALLS);
    static PROVIDER: NativeProvider = NativeProvider;
    static PLATFORM: Platform = Platform::new(&PROVIDER, &STORAGE);

    let _guard = RESOLVER_GUARD
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    platform::set_platform(Some(&PLATFORM));
    let resolved = platform::resolve().expect("resolve");
    assert!(std::ptr::eq(resolved, &PLATFORM));
    platform::set_platform(None);

    let builtin = platform::resolve().expect("resolve");
    assert!(!std::ptr::eq(builtin, &PLATFORM));
}

#[test]
fn open_with_consults_storage_exactly_once() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static STORAGE: CountingStorage = CountingStorage(&CALLS);
    static PROVIDER: NativeProvider = NativeProvider;
    static PLATFORM: Platform = Platform::new(&PROVIDER, &STORAGE);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("di.db");
    let conn = Connection::open_with(&PLATFORM, path.to_str().expect("utf-8 path"))
        .expect("open with injected platform");
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    exec(&conn, "CREATE TABLE t (x INTEGER)");
}

#[test]
fn reserved_targets_bypass_storage() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static STORAGE: CountingStorage = CountingStorage(&CALLS);
    static PROVIDER: NativeProvider = NativeProvider;
    static PLATFORM: Platform = Platform::new(&PROVIDER, &STORAGE);

    let _memory = Connection::open_with(&PLATFORM, MEMORY_DB).expect("open in-memory");
    let _temporary = Connection::open_with(&PLATFORM, TEMPORARY_DB).expect("open temporary");
    assert_eq!(CALLS.load(Ordering::SeqCst), 0);
}
