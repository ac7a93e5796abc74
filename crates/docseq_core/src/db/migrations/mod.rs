//! Ordered schema migrations for the document/node store.
//!
//! # Responsibility
//! - Keep the list of schema steps in one place, oldest first.
//! - Bring any older database up to `latest_version()` in one transaction.
//!
//! # Invariants
//! - Step versions are strictly increasing with no reuse.
//! - `PRAGMA user_version` always names the last step that was applied.
//! - Steps only add structure; none of them rewrites node positions.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "documents_and_nodes",
        sql: include_str!("0001_init.sql"),
    },
    SchemaStep {
        version: 2,
        name: "document_outline",
        sql: include_str!("0002_document_outline.sql"),
    },
];

/// Schema version produced by the newest step compiled into this crate.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Runs every step newer than the database's recorded version.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the file was written by a newer
///   build.
/// - `DbError::MigrationFailed` naming the step that failed; nothing from the
///   batch is kept.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let recorded = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let latest = latest_version();
    if recorded > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: recorded,
            latest_supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > recorded)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.execute_batch(&format!("PRAGMA user_version = {};", step.version)))
            .map_err(|source| DbError::MigrationFailed {
                version: step.version,
                name: step.name,
                source,
            })?;
    }
    tx.commit()?;

    for step in pending {
        info!(
            "event=schema_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    Ok(())
}
