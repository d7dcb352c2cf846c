// End-to-end engine scenarios driven entirely through SQL text.

use reldb::execution::OutputRow;
use reldb::parser::SqlResponse;
use reldb::{Database, DatabaseConfig, Value};
use tempfile::TempDir;

fn open_db(dir: &TempDir) -> Database {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Database::open(DatabaseConfig::new(dir.path())).unwrap()
}

fn rows(response: SqlResponse) -> Vec<OutputRow> {
    match response {
        SqlResponse::Rows(rows) => rows,
        other => panic!("expected rows, got {:?}", other),
    }
}

fn get<'a>(row: &'a OutputRow, key: &str) -> Option<&'a Value> {
    row.iter().find(|(name, _)| name == key).map(|(_, v)| v)
}

#[test]
fn duplicate_primary_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.execute_sql("CREATE TABLE t (id INTEGER, name VARCHAR(10), PRIMARY KEY (id))")
        .unwrap();

    match db
        .execute_sql("INSERT INTO t (id, name) VALUES (1, 'a')")
        .unwrap()
    {
        SqlResponse::Inserted(row) => assert_eq!(row.row_id, 1),
        other => panic!("expected inserted row, got {:?}", other),
    }

    let err = db
        .execute_sql("INSERT INTO t (id, name) VALUES (1, 'b')")
        .unwrap_err();
    assert_eq!(err.code(), "PRIMARY_KEY_VIOLATION");
    let message = err.to_string();
    assert!(message.contains("id"));
    assert!(message.contains('1'));
}

#[test]
fn unique_column_is_enforced() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.execute_sql(
        "CREATE TABLE u (id INTEGER, email VARCHAR(64), PRIMARY KEY (id), UNIQUE (email))",
    )
    .unwrap();

    db.execute_sql("INSERT INTO u (id, email) VALUES (1, 'x@y')")
        .unwrap();
    db.execute_sql("INSERT INTO u (id, email) VALUES (2, 'z@y')")
        .unwrap();

    let err = db
        .execute_sql("INSERT INTO u (id, email) VALUES (3, 'x@y')")
        .unwrap_err();
    assert_eq!(err.code(), "UNIQUE_KEY_VIOLATION");
}

#[test]
fn indexed_range_query_reports_its_plan() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.execute_sql(
        "CREATE TABLE p (id INTEGER, price DECIMAL, name VARCHAR(32), \
         PRIMARY KEY (id), INDEX idx_price (price))",
    )
    .unwrap();
    for (id, price) in [(1, 10), (2, 20), (3, 30), (4, 40)] {
        db.execute_sql(&format!(
            "INSERT INTO p (id, price, name) VALUES ({}, {}, 'item{}')",
            id, price, id
        ))
        .unwrap();
    }

    let plan = match db
        .execute_sql("EXPLAIN SELECT * FROM p WHERE price > 20")
        .unwrap()
    {
        SqlResponse::Plan(plan) => plan,
        other => panic!("expected plan, got {:?}", other),
    };
    assert!(plan.index_used);
    assert_eq!(plan.index_name.as_deref(), Some("idx_price"));
    assert_eq!(plan.index_column.as_deref(), Some("price"));
    assert_eq!(
        plan.index_operation,
        Some(reldb::execution::IndexOperation::RangeScanGt)
    );
    assert_eq!(plan.rows_returned, 2);
    assert_eq!(plan.where_clause.as_deref(), Some("price > 20"));
}

#[test]
fn like_predicate_forces_a_full_scan() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.execute_sql(
        "CREATE TABLE p (id INTEGER, price DECIMAL, name VARCHAR(32), \
         PRIMARY KEY (id), INDEX idx_price (price))",
    )
    .unwrap();
    db.execute_sql("INSERT INTO p (id, price, name) VALUES (1, 5, 'foobar')")
        .unwrap();
    db.execute_sql("INSERT INTO p (id, price, name) VALUES (2, 6, 'other')")
        .unwrap();

    let plan = match db
        .execute_sql("EXPLAIN SELECT * FROM p WHERE name LIKE '%foo%'")
        .unwrap()
    {
        SqlResponse::Plan(plan) => plan,
        other => panic!("expected plan, got {:?}", other),
    };
    assert!(!plan.index_used);
    assert_eq!(plan.index_operation, None);
    assert_eq!(plan.rows_returned, 1);
}

#[test]
fn left_join_keeps_orphans_with_right_side_absent() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.execute_sql("CREATE TABLE prod (id INTEGER, cat_id INTEGER, PRIMARY KEY (id))")
        .unwrap();
    db.execute_sql("CREATE TABLE cat (id INTEGER, name VARCHAR(16), PRIMARY KEY (id))")
        .unwrap();
    db.execute_sql("INSERT INTO prod (id, cat_id) VALUES (1, 1)")
        .unwrap();
    db.execute_sql("INSERT INTO prod (id, cat_id) VALUES (2, 2)")
        .unwrap();
    db.execute_sql("INSERT INTO prod (id, cat_id) VALUES (3, NULL)")
        .unwrap();
    db.execute_sql("INSERT INTO cat (id, name) VALUES (1, 'a')")
        .unwrap();

    let result = rows(
        db.execute_sql("SELECT * FROM prod LEFT JOIN cat ON prod.cat_id = cat.id")
            .unwrap(),
    );
    assert_eq!(result.len(), 3);

    let matched = result
        .iter()
        .find(|row| get(row, "prod.id") == Some(&Value::Integer(1)))
        .unwrap();
    assert_eq!(get(matched, "cat.id"), Some(&Value::Integer(1)));
    assert_eq!(get(matched, "cat.name"), Some(&Value::String("a".to_string())));

    for orphan_id in [2, 3] {
        let orphan = result
            .iter()
            .find(|row| get(row, "prod.id") == Some(&Value::Integer(orphan_id)))
            .unwrap();
        assert_eq!(get(orphan, "cat.id"), None);
        assert_eq!(get(orphan, "cat.name"), None);
    }
}

#[test]
fn deleted_rows_are_invisible_and_counted_out() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.execute_sql("CREATE TABLE t (id INTEGER, PRIMARY KEY (id))")
        .unwrap();
    for id in 0..100 {
        db.execute_sql(&format!("INSERT INTO t (id) VALUES ({})", id))
            .unwrap();
    }

    match db.execute_sql("DELETE FROM t WHERE id >= 60").unwrap() {
        SqlResponse::Count(count) => assert_eq!(count, 40),
        other => panic!("expected count, got {:?}", other),
    }

    let result = rows(db.execute_sql("SELECT * FROM t").unwrap());
    assert_eq!(result.len(), 60);

    match db.execute_sql("SHOW TABLES").unwrap() {
        SqlResponse::Tables(tables) => {
            assert_eq!(tables.len(), 1);
            assert_eq!(tables[0].table_name, "t");
            assert_eq!(tables[0].row_count, 60);
        }
        other => panic!("expected table list, got {:?}", other),
    }
}

#[test]
fn drop_then_recreate_leaves_no_residue() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.execute_sql("CREATE TABLE t (id INTEGER, PRIMARY KEY (id))")
        .unwrap();
    db.execute_sql("INSERT INTO t (id) VALUES (1)").unwrap();
    db.execute_sql("DROP TABLE t").unwrap();
    db.execute_sql("CREATE TABLE t (id INTEGER, PRIMARY KEY (id))")
        .unwrap();

    let result = rows(db.execute_sql("SELECT * FROM t").unwrap());
    assert!(result.is_empty());

    // No residual index entry blocks the previously used key.
    db.execute_sql("INSERT INTO t (id) VALUES (1)").unwrap();
    let result = rows(db.execute_sql("SELECT * FROM t").unwrap());
    assert_eq!(result.len(), 1);
}

#[test]
fn order_limit_offset_pipeline() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.execute_sql("CREATE TABLE t (id INTEGER, score INTEGER, PRIMARY KEY (id))")
        .unwrap();
    for (id, score) in [(1, 50), (2, 10), (3, 40), (4, 20), (5, 30)] {
        db.execute_sql(&format!(
            "INSERT INTO t (id, score) VALUES ({}, {})",
            id, score
        ))
        .unwrap();
    }

    let result = rows(
        db.execute_sql(
            "SELECT id FROM t WHERE score > 10 ORDER BY score DESC LIMIT 2 OFFSET 1",
        )
        .unwrap(),
    );
    // Scores above 10 in descending order are 50, 40, 30, 20; skip one, take two.
    assert_eq!(
        result,
        vec![
            vec![("id".to_string(), Value::Integer(3))],
            vec![("id".to_string(), Value::Integer(5))],
        ]
    );
}

#[test]
fn update_through_sql_maintains_indexes() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.execute_sql(
        "CREATE TABLE t (id INTEGER, price DECIMAL, PRIMARY KEY (id), INDEX idx_price (price))",
    )
    .unwrap();
    db.execute_sql("INSERT INTO t (id, price) VALUES (1, 10)")
        .unwrap();
    db.execute_sql("INSERT INTO t (id, price) VALUES (2, 20)")
        .unwrap();

    match db
        .execute_sql("UPDATE t SET price = 99 WHERE id = 1")
        .unwrap()
    {
        SqlResponse::Count(count) => assert_eq!(count, 1),
        other => panic!("expected count, got {:?}", other),
    }

    // The moved entry is findable through the index path.
    let result = rows(db.execute_sql("SELECT id FROM t WHERE price = 99").unwrap());
    assert_eq!(result, vec![vec![("id".to_string(), Value::Integer(1))]]);
    let result = rows(db.execute_sql("SELECT id FROM t WHERE price = 10").unwrap());
    assert!(result.is_empty());
}

#[test]
fn describe_and_show_indexes() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.execute_sql(
        "CREATE TABLE t (id INTEGER NOT NULL, email VARCHAR(64), \
         PRIMARY KEY (id), UNIQUE (email))",
    )
    .unwrap();

    match db.execute_sql("DESCRIBE t").unwrap() {
        SqlResponse::TableDescription(schema) => {
            assert_eq!(schema.table_name, "t");
            assert_eq!(schema.columns.len(), 2);
            assert!(!schema.columns[0].nullable);
            assert_eq!(schema.columns[1].max_length, Some(64));
        }
        other => panic!("expected description, got {:?}", other),
    }

    match db.execute_sql("SHOW INDEXES").unwrap() {
        SqlResponse::Indexes(indexes) => {
            let names: Vec<&str> = indexes.iter().map(|i| i.index_name.as_str()).collect();
            assert_eq!(names, vec!["pk_t_id", "uq_t_email"]);
            assert!(indexes.iter().all(|i| i.unique));
        }
        other => panic!("expected index list, got {:?}", other),
    }
}

#[test]
fn explain_update_and_delete_share_the_plan_path() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    db.execute_sql("CREATE TABLE t (id INTEGER, flag BOOLEAN, PRIMARY KEY (id))")
        .unwrap();
    for id in 1..=4 {
        db.execute_sql(&format!(
            "INSERT INTO t (id, flag) VALUES ({}, false)",
            id
        ))
        .unwrap();
    }

    let plan = match db
        .execute_sql("EXPLAIN UPDATE t SET flag = true WHERE id <= 2")
        .unwrap()
    {
        SqlResponse::Plan(plan) => plan,
        other => panic!("expected plan, got {:?}", other),
    };
    assert_eq!(plan.query_type, "UPDATE");
    assert!(plan.index_used);
    assert_eq!(
        plan.index_operation,
        Some(reldb::execution::IndexOperation::RangeScanLte)
    );
    // EXPLAIN executes the statement.
    assert_eq!(plan.rows_returned, 2);

    let plan = match db
        .execute_sql("EXPLAIN DELETE FROM t WHERE id = 4")
        .unwrap()
    {
        SqlResponse::Plan(plan) => plan,
        other => panic!("expected plan, got {:?}", other),
    };
    assert_eq!(plan.query_type, "DELETE");
    assert_eq!(plan.rows_returned, 1);
    let remaining = rows(db.execute_sql("SELECT * FROM t").unwrap());
    assert_eq!(remaining.len(), 3);
}

#[test]
fn state_survives_reopen_end_to_end() {
    let dir = TempDir::new().unwrap();
    {
        let db = open_db(&dir);
        db.execute_sql(
            "CREATE TABLE t (id INTEGER, name VARCHAR(16), PRIMARY KEY (id))",
        )
        .unwrap();
        db.execute_sql("INSERT INTO t (id, name) VALUES (1, 'first')")
            .unwrap();
        db.execute_sql("INSERT INTO t (id, name) VALUES (2, 'second')")
            .unwrap();
        db.shutdown().unwrap();
    }

    let db = open_db(&dir);
    let result = rows(db.execute_sql("SELECT name FROM t WHERE id = 2").unwrap());
    assert_eq!(
        result,
        vec![vec![(
            "name".to_string(),
            Value::String("second".to_string())
        )]]
    );
    let err = db
        .execute_sql("INSERT INTO t (id, name) VALUES (2, 'dup')")
        .unwrap_err();
    assert_eq!(err.code(), "PRIMARY_KEY_VIOLATION");
}
