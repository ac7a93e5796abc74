use docseq_core::db::migrations::latest_version;
use docseq_core::db::{open_db, open_db_in_memory, DbError};
use docseq_core::{NodeKind, NodeRepoError, NodeRepository, SqliteNodeRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "documents");
    assert_table_exists(&conn, "nodes");
    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn reopening_file_database_keeps_schema_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docseq.db");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    assert!(SqliteNodeRepository::try_new(&second).is_ok());
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failing_schema_step_is_named_and_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 1;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    assert_eq!(err.code(), "db_migration_failed");
    match err {
        DbError::MigrationFailed { version, name, .. } => {
            assert_eq!(version, 2);
            assert_eq!(name, "document_outline");
        }
        other => panic!("unexpected error: {other}"),
    }

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 1);
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteNodeRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        NodeRepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn repository_rejects_schema_missing_outline_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE documents (document_uuid TEXT, title TEXT, raw_content TEXT, owner TEXT,
            is_public INTEGER, created_at INTEGER, updated_at INTEGER);
         CREATE TABLE nodes (node_uuid TEXT);",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let err = SqliteNodeRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        NodeRepoError::MissingRequiredColumn {
            table: "documents",
            column: "outline_json"
        }
    ));
}

#[test]
fn second_toc_row_is_rejected_by_schema() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO documents (document_uuid, title, owner) VALUES ('d', 't', 'o');
         INSERT INTO nodes (node_uuid, document_uuid, content, position, character_count, kind)
         VALUES ('a', 'd', 'toc', 0, 3, 'toc');",
    )
    .unwrap();

    let second = conn.execute(
        "INSERT INTO nodes (node_uuid, document_uuid, content, position, character_count, kind)
         VALUES ('b', 'd', 'toc', 1, 3, 'toc');",
        [],
    );
    assert!(second.is_err());
}

#[test]
fn repository_refuses_misplaced_toc_as_validation_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNodeRepository::try_new(&conn).unwrap();
    let document = repo.create_document("Doc", "", "local").unwrap();
    repo.insert_node(document.document_uuid, 0, "Body", NodeKind::Content)
        .unwrap();

    let misplaced = repo.insert_node(document.document_uuid, 1, "## Toc", NodeKind::Toc);
    assert!(matches!(misplaced, Err(NodeRepoError::Validation(_))));

    repo.insert_node(document.document_uuid, 0, "## Toc", NodeKind::Toc)
        .unwrap();
    let second = repo.insert_node(document.document_uuid, 0, "## Again", NodeKind::Toc);
    assert!(matches!(second, Err(NodeRepoError::Validation(_))));
    assert_eq!(repo.list_ordered(document.document_uuid).unwrap().len(), 2);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "expected table `{table_name}`");
}
