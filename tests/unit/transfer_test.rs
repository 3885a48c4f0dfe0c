use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use arrow::csv::reader::{Format, ReaderBuilder};
use arrow::datatypes::DataType;

use dbdesk::error::DbdeskError;
use dbdesk::transfer::{
    ChunkedTransfer, DEFAULT_CHUNK_SIZE, Direction, SPREADSHEET_ROW_CAP, derive_table_name,
    spreadsheet,
};
use dbdesk::verbose::Verbose;
use serde_json::{Value, json};

use crate::common::TestDb;

fn transfer(chunk_size: usize) -> ChunkedTransfer {
    ChunkedTransfer::new(chunk_size).unwrap()
}

// --- Construction ---

#[test]
fn zero_chunk_size_is_rejected() {
    let err = ChunkedTransfer::new(0).unwrap_err();
    assert!(matches!(err, DbdeskError::Config { .. }));
    assert_eq!(ChunkedTransfer::default().chunk_size(), DEFAULT_CHUNK_SIZE);
}

#[test]
fn table_name_is_file_stem() {
    assert_eq!(derive_table_name(Path::new("/tmp/data/sales 2024.csv")).unwrap(), "sales 2024");
    assert_eq!(derive_table_name(Path::new("people.json")).unwrap(), "people");
}

// --- Delimited import ---

#[test]
fn csv_import_commits_in_chunks() {
    let db = TestDb::new();
    let file = db.file("people.csv");
    fs::write(&file, "id,name\n1,ann\n2,bob\n3,cy\n4,dee\n5,eve\n").unwrap();

    let report = transfer(2).import_delimited(&file, db.session.connection().unwrap()).unwrap();
    assert_eq!(report.direction, Direction::Import);
    assert_eq!(report.table, "people");
    assert_eq!(report.rows, 5);
    assert_eq!(report.chunks, 3);
    assert_eq!(report.message(), "imported 5 rows into table people");
    assert_eq!(db.count("people"), 5);

    let (id, name): (i64, String) = db
        .session
        .connection()
        .unwrap()
        .query_row("SELECT id, name FROM people WHERE id = 4", [], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })
        .unwrap();
    assert_eq!((id, name.as_str()), (4, "dee"));
}

#[test]
fn csv_import_infers_declared_types() {
    let db = TestDb::new();
    let file = db.file("typed.csv");
    fs::write(&file, "n,x,s,flag\n1,1.5,a,true\n2,2.5,b,false\n").unwrap();

    transfer(100).import_delimited(&file, db.session.connection().unwrap()).unwrap();

    let conn = db.session.connection().unwrap();
    let mut stmt = conn.prepare("SELECT * FROM typed").unwrap();
    let types: Vec<String> = stmt
        .columns()
        .iter()
        .map(|c| c.decl_type().unwrap_or("").to_string())
        .collect();
    assert_eq!(types, vec!["INTEGER", "REAL", "TEXT", "BOOLEAN"]);
    let flag: i64 = stmt.query_row([], |r| r.get(3)).unwrap();
    assert_eq!(flag, 1);
}

#[test]
fn csv_column_empty_in_first_chunk_keeps_later_values() {
    let db = TestDb::new();
    let file = db.file("notes.csv");
    fs::write(&file, "name,note\na,\nb,\nc,hello\nd,world\n").unwrap();

    let report = transfer(2).import_delimited(&file, db.session.connection().unwrap()).unwrap();
    assert_eq!(report.rows, 4);

    let conn = db.session.connection().unwrap();
    let mut stmt = conn.prepare("SELECT note FROM notes ORDER BY name").unwrap();
    assert_eq!(stmt.columns()[0].decl_type(), Some("TEXT"));
    let notes: Vec<Option<String>> = stmt
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        notes,
        vec![None, None, Some("hello".to_string()), Some("world".to_string())]
    );
}

#[test]
fn csv_import_failure_keeps_committed_chunks() {
    let db = TestDb::new();
    let file = db.file("broken.csv");
    fs::write(&file, "id,name\n1,a\n2,b\nnot-a-number,c\n4,d\n").unwrap();

    let err = transfer(2)
        .import_delimited(&file, db.session.connection().unwrap())
        .unwrap_err();
    match err {
        DbdeskError::Import { file, chunks_committed, .. } => {
            assert_eq!(file, "broken.csv");
            assert_eq!(chunks_committed, 1);
        }
        other => panic!("expected import error, got {other:?}"),
    }
    assert_eq!(db.count("broken"), 2);
}

#[test]
fn csv_import_replaces_existing_table() {
    let db = TestDb::new();
    db.seed_numbers("numbers", 20);
    let file = db.file("numbers.csv");
    fs::write(&file, "only\nx\n").unwrap();

    transfer(10).import_delimited(&file, db.session.connection().unwrap()).unwrap();
    assert_eq!(db.count("numbers"), 1);
}

#[test]
fn csv_header_only_creates_empty_table() {
    let db = TestDb::new();
    let file = db.file("empty.csv");
    fs::write(&file, "a,b\n").unwrap();

    let report = transfer(10).import_delimited(&file, db.session.connection().unwrap()).unwrap();
    assert_eq!(report.rows, 0);
    assert_eq!(report.chunks, 0);
    assert_eq!(db.count("empty"), 0);
}

#[test]
fn csv_import_missing_file_is_import_error() {
    let db = TestDb::new();
    let err = transfer(10)
        .import_delimited(&db.file("absent.csv"), db.session.connection().unwrap())
        .unwrap_err();
    assert!(matches!(err, DbdeskError::Import { chunks_committed: 0, .. }), "got {err:?}");
}

// --- Delimited export ---

#[test]
fn csv_export_writes_header_once_across_chunks() {
    let db = TestDb::new();
    db.seed_numbers("numbers", 5);
    let file = db.file("out.csv");

    let report = transfer(2)
        .export_delimited("numbers", &file, db.session.connection().unwrap())
        .unwrap();
    assert_eq!(report.direction, Direction::Export);
    assert_eq!(report.rows, 5);
    assert_eq!(report.chunks, 3);
    assert!(!report.truncated);

    let text = fs::read_to_string(&file).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "id,label");
    assert_eq!(lines.iter().filter(|l| **l == "id,label").count(), 1);
    assert_eq!(lines[1], "1,row 1");
    assert_eq!(lines[5], "5,row 5");
}

#[test]
fn csv_export_reads_back_with_arrow() {
    let db = TestDb::new();
    db.seed_numbers("numbers", 7);
    let file = db.file("numbers.csv");
    transfer(3)
        .export_delimited("numbers", &file, db.session.connection().unwrap())
        .unwrap();

    let format = Format::default().with_header(true);
    let (schema, _) = format.infer_schema(File::open(&file).unwrap(), None).unwrap();
    assert_eq!(schema.field(0).data_type(), &DataType::Int64);
    assert_eq!(schema.field(1).data_type(), &DataType::Utf8);

    let reader = ReaderBuilder::new(Arc::new(schema))
        .with_format(format)
        .build(File::open(&file).unwrap())
        .unwrap();
    let rows: usize = reader.map(|batch| batch.unwrap().num_rows()).sum();
    assert_eq!(rows, 7);
}

#[test]
fn csv_export_quotes_fields_and_leaves_nulls_empty() {
    let db = TestDb::new();
    db.exec(
        "CREATE TABLE notes (id INTEGER, body TEXT);
         INSERT INTO notes VALUES (1, 'a,b'), (2, 'say \"hi\"'), (3, NULL);",
    );
    let file = db.file("notes.csv");

    transfer(10)
        .export_delimited("notes", &file, db.session.connection().unwrap())
        .unwrap();
    let text = fs::read_to_string(&file).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["id,body", "1,\"a,b\"", "2,\"say \"\"hi\"\"\"", "3,"]);
}

#[test]
fn csv_export_empty_table_writes_header() {
    let db = TestDb::new();
    db.exec("CREATE TABLE blank (a INTEGER, b TEXT);");
    let file = db.file("blank.csv");

    let report = transfer(10)
        .export_delimited("blank", &file, db.session.connection().unwrap())
        .unwrap();
    assert_eq!(report.rows, 0);
    assert_eq!(fs::read_to_string(&file).unwrap().trim_end(), "a,b");
}

#[test]
fn export_missing_table_creates_no_file() {
    let db = TestDb::new();
    let conn = db.session.connection().unwrap();
    let t = transfer(10);

    for name in ["ghost.csv", "ghost.json", "ghost.xlsx"] {
        let file = db.file(name);
        let err = match name {
            "ghost.csv" => t.export_delimited("ghost", &file, conn),
            "ghost.json" => t.export_structured("ghost", &file, conn),
            _ => t.export_spreadsheet("ghost", &file, conn),
        }
        .unwrap_err();
        assert!(matches!(err, DbdeskError::Export { .. }), "{name}: got {err:?}");
        assert!(!file.exists(), "{name} should not have been created");
    }
}

#[test]
fn csv_round_trip_preserves_rows() {
    let db = TestDb::new();
    db.exec(
        "CREATE TABLE src (id INTEGER, name TEXT, score REAL);
         INSERT INTO src VALUES (1, 'ann', 1.5), (2, 'bob', NULL), (3, 'cy, jr', 2.25);",
    );
    let file = db.file("copy.csv");
    let conn = db.session.connection().unwrap();

    transfer(2).export_delimited("src", &file, conn).unwrap();
    transfer(2).import_delimited(&file, conn).unwrap();

    let mut stmt = conn
        .prepare("SELECT id, name, score FROM copy ORDER BY id")
        .unwrap();
    let rows: Vec<(i64, String, Option<f64>)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            (1, "ann".to_string(), Some(1.5)),
            (2, "bob".to_string(), None),
            (3, "cy, jr".to_string(), Some(2.25)),
        ]
    );
}

#[test]
fn csv_round_trip_keeps_all_null_column() {
    let db = TestDb::new();
    db.exec(
        "CREATE TABLE src (id INTEGER, memo TEXT);
         INSERT INTO src VALUES (1, NULL), (2, NULL), (3, NULL);",
    );
    let file = db.file("blank.csv");
    let conn = db.session.connection().unwrap();

    transfer(2).export_delimited("src", &file, conn).unwrap();
    let report = transfer(2).import_delimited(&file, conn).unwrap();
    assert_eq!(report.rows, 3);

    let nulls: i64 = conn
        .query_row("SELECT COUNT(*) FROM blank WHERE memo IS NULL", [], |r| r.get(0))
        .unwrap();
    assert_eq!(nulls, 3);
}

#[test]
fn csv_round_trip_keeps_values_after_first_chunk() {
    let db = TestDb::new();
    db.exec(
        "CREATE TABLE src (id INTEGER, memo TEXT);
         INSERT INTO src VALUES (1, NULL), (2, NULL), (3, 'late'), (4, NULL), (5, 'later');",
    );
    let file = db.file("sparse.csv");
    let conn = db.session.connection().unwrap();

    transfer(2).export_delimited("src", &file, conn).unwrap();
    transfer(2).import_delimited(&file, conn).unwrap();

    let mut stmt = conn.prepare("SELECT id, memo FROM sparse ORDER BY id").unwrap();
    let rows: Vec<(i64, Option<String>)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            (1, None),
            (2, None),
            (3, Some("late".to_string())),
            (4, None),
            (5, Some("later".to_string())),
        ]
    );
}

// --- Structured ---

#[test]
fn json_import_unions_keys_in_first_seen_order() {
    let db = TestDb::new();
    let file = db.file("people.json");
    fs::write(
        &file,
        r#"[{"id": 1, "name": "ann"}, {"id": 2, "active": true}, {"name": "cy", "score": 2.5}]"#,
    )
    .unwrap();

    let report = transfer(10).import_structured(&file, db.session.connection().unwrap()).unwrap();
    assert_eq!(report.rows, 3);
    assert_eq!(report.table, "people");

    let conn = db.session.connection().unwrap();
    let stmt = conn.prepare("SELECT * FROM people").unwrap();
    let columns: Vec<(String, String)> = stmt
        .columns()
        .iter()
        .map(|c| (c.name().to_string(), c.decl_type().unwrap_or("").to_string()))
        .collect();
    assert_eq!(
        columns,
        vec![
            ("id".to_string(), "INTEGER".to_string()),
            ("name".to_string(), "TEXT".to_string()),
            ("active".to_string(), "BOOLEAN".to_string()),
            ("score".to_string(), "REAL".to_string()),
        ]
    );

    let missing: Option<String> = conn
        .query_row("SELECT name FROM people WHERE id = 2", [], |r| r.get(0))
        .unwrap();
    assert_eq!(missing, None);
}

#[test]
fn json_import_rejects_non_array_and_non_objects() {
    let db = TestDb::new();
    let conn = db.session.connection().unwrap();

    let object = db.file("object.json");
    fs::write(&object, r#"{"id": 1}"#).unwrap();
    assert!(matches!(
        transfer(10).import_structured(&object, conn).unwrap_err(),
        DbdeskError::Import { .. }
    ));

    let scalars = db.file("scalars.json");
    fs::write(&scalars, "[1, 2, 3]").unwrap();
    assert!(matches!(
        transfer(10).import_structured(&scalars, conn).unwrap_err(),
        DbdeskError::Import { .. }
    ));

    let empty = db.file("nothing.json");
    fs::write(&empty, "[]").unwrap();
    assert!(matches!(
        transfer(10).import_structured(&empty, conn).unwrap_err(),
        DbdeskError::Import { .. }
    ));
    assert!(db.session.table_names().unwrap().is_empty());
}

#[test]
fn json_export_writes_records_in_column_order() {
    let db = TestDb::new();
    db.exec(
        "CREATE TABLE items (name TEXT, qty INTEGER, price REAL, ok BOOLEAN, raw BLOB);
         INSERT INTO items VALUES ('pen', 3, 1.25, 1, x'0aff'), (NULL, 0, NULL, 0, NULL);",
    );
    let file = db.file("items.json");

    let report = transfer(10)
        .export_structured("items", &file, db.session.connection().unwrap())
        .unwrap();
    assert_eq!(report.rows, 2);

    let text = fs::read_to_string(&file).unwrap();
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        parsed,
        json!([
            {"name": "pen", "qty": 3, "price": 1.25, "ok": true, "raw": "0x0aff"},
            {"name": null, "qty": 0, "price": null, "ok": false, "raw": null}
        ])
    );
    let keys: Vec<&String> = parsed[0].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["name", "qty", "price", "ok", "raw"]);
}

#[test]
fn json_export_empty_table_is_empty_array() {
    let db = TestDb::new();
    db.exec("CREATE TABLE blank (a INTEGER);");
    let file = db.file("blank.json");

    transfer(10)
        .export_structured("blank", &file, db.session.connection().unwrap())
        .unwrap();
    let parsed: Value = serde_json::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(parsed, json!([]));
}

// --- Spreadsheet ---

#[test]
fn spreadsheet_export_under_cap_is_complete() {
    let db = TestDb::new();
    db.seed_numbers("numbers", 25);
    let file = db.file("numbers.xlsx");

    let report = transfer(10)
        .export_spreadsheet("numbers", &file, db.session.connection().unwrap())
        .unwrap();
    assert_eq!(report.rows, 25);
    assert!(!report.truncated);
    assert_eq!(report.message(), "table numbers exported to numbers.xlsx (25 rows)");

    let bytes = fs::read(&file).unwrap();
    assert!(bytes.starts_with(b"PK"), "xlsx is a zip container");
}

#[test]
fn spreadsheet_export_stops_at_cap() {
    let db = TestDb::new();
    db.seed_numbers("numbers", 30);
    let file = db.file("capped.xlsx");

    let report = spreadsheet::export(
        "numbers",
        &file,
        db.session.connection().unwrap(),
        20,
        Verbose::default(),
    )
    .unwrap();
    assert_eq!(report.rows, 20);
    assert!(report.truncated);
    assert_eq!(
        report.message(),
        "table numbers exported to capped.xlsx (truncated at 20 rows)"
    );
}

#[test]
fn spreadsheet_truncation_flag_at_cap_boundary() {
    let db = TestDb::new();
    db.seed_numbers("exact", 20);
    db.seed_numbers("under", 19);
    let conn = db.session.connection().unwrap();

    let exact =
        spreadsheet::export("exact", &db.file("exact.xlsx"), conn, 20, Verbose::default()).unwrap();
    assert_eq!(exact.rows, 20);
    assert!(exact.truncated);

    let under =
        spreadsheet::export("under", &db.file("under.xlsx"), conn, 20, Verbose::default()).unwrap();
    assert_eq!(under.rows, 19);
    assert!(!under.truncated);
}

#[test]
fn spreadsheet_sheet_names_are_sanitized() {
    assert_eq!(spreadsheet::sheet_name("sales"), "sales");
    assert_eq!(spreadsheet::sheet_name("a/b:c"), "a_b_c");
    assert_eq!(spreadsheet::sheet_name(&"x".repeat(40)).len(), 31);
    assert_eq!(spreadsheet::sheet_name("''"), "Sheet1");
    assert_eq!(spreadsheet::sheet_name("History"), "History_");
}

#[test]
#[ignore = "writes a million-row workbook"]
fn spreadsheet_export_caps_at_one_million_rows() {
    let db = TestDb::new();
    db.seed_numbers("big", SPREADSHEET_ROW_CAP + 5);
    let file = db.file("big.xlsx");

    let report = transfer(DEFAULT_CHUNK_SIZE)
        .export_spreadsheet("big", &file, db.session.connection().unwrap())
        .unwrap();
    assert_eq!(report.rows, SPREADSHEET_ROW_CAP);
    assert!(report.truncated);
}
