//! Schema setup for the cache database.
//!
//! The store keeps every cache namespace in a single `kv_entries` table.
//! `schema_version` records each schema step applied to the file so that
//! reopening a database only runs the steps it lacks.

use crate::Error;
use tokio_rusqlite::{Connection, params};

/// Ordered schema steps, keyed by version.
const SCHEMA: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_kv_entries.sql"))];

/// Bring the cache schema up to the latest version.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .map_err(Error::from)?;

        let applied: i64 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
            .map_err(Error::from)?;

        for &(version, sql) in SCHEMA.iter().filter(|(version, _)| *version > applied) {
            let tx = conn.transaction().map_err(Error::from)?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("schema version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(Error::from)?;
            tx.commit().map_err(Error::from)?;
            tracing::info!(version, "cache schema upgraded");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn versions(conn: &Connection) -> Vec<i64> {
        conn.call(|conn| {
            let mut stmt = conn.prepare("SELECT version FROM schema_version ORDER BY version")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<Vec<i64>, _>>()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_database_gets_kv_table() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let columns: Vec<String> = conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('kv_entries') ORDER BY cid")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()
            })
            .await
            .unwrap();

        assert_eq!(columns, vec!["namespace", "key", "kind", "value", "updated_at"]);
        assert_eq!(versions(&conn).await, vec![1]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_entries_and_version() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        conn.call(|conn| {
            conn.execute(
                "INSERT INTO kv_entries (namespace, key, kind, value, updated_at) VALUES ('chapters', 'ch-1', 'record', x'00', 'now')",
                [],
            )
        })
        .await
        .unwrap();

        run(&conn).await.unwrap();

        let entries: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM kv_entries", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(entries, 1);
        assert_eq!(versions(&conn).await, vec![1]);
    }

    #[tokio::test]
    async fn test_kind_constraint() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let result = conn
            .call(|conn| {
                conn.execute(
                    "INSERT INTO kv_entries (namespace, key, kind, value, updated_at) VALUES ('chapters', 'ch-1', 'text', x'00', 'now')",
                    [],
                )
            })
            .await;
        assert!(result.is_err());
    }
}
