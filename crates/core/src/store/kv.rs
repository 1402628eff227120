//! `KvStore` implementation for the SQLite cache database.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::{params, rusqlite};

use super::{CacheDb, KvStore, Namespace, StoredValue};
use crate::Error;

fn decode(kind: &str, value: Vec<u8>) -> Result<StoredValue, Error> {
    match kind {
        "blob" => Ok(StoredValue::Blob(Bytes::from(value))),
        "record" => Ok(StoredValue::Record(serde_json::from_slice(&value)?)),
        other => Err(Error::Codec(format!("unknown value kind: {other}"))),
    }
}

fn encode(value: StoredValue) -> Result<(&'static str, Vec<u8>), Error> {
    let kind = value.kind();
    let bytes = match value {
        StoredValue::Blob(bytes) => bytes.to_vec(),
        StoredValue::Record(record) => serde_json::to_vec(&record)?,
    };
    Ok((kind, bytes))
}

#[async_trait]
impl KvStore for CacheDb {
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<StoredValue>, Error> {
        let key = key.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<(String, Vec<u8>)>, Error> {
                let mut stmt = conn.prepare("SELECT kind, value FROM kv_entries WHERE namespace = ?1 AND key = ?2")?;

                let result = stmt.query_row(params![ns.as_str(), key], |row| Ok((row.get(0)?, row.get(1)?)));

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(|(kind, value)| decode(&kind, value)).transpose()
    }

    async fn set(&self, ns: Namespace, key: &str, value: StoredValue) -> Result<(), Error> {
        let key = key.to_string();
        let (kind, bytes) = encode(value)?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv_entries (namespace, key, kind, value, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(namespace, key) DO UPDATE SET
                        kind = excluded.kind,
                        value = excluded.value,
                        updated_at = excluded.updated_at",
                    params![ns.as_str(), key, kind, bytes, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn remove(&self, ns: Namespace, key: &str) -> Result<(), Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM kv_entries WHERE namespace = ?1 AND key = ?2", params![ns.as_str(), key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, ns: Namespace) -> Result<Vec<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM kv_entries WHERE namespace = ?1 ORDER BY key ASC")?;
                let keys = stmt
                    .query_map(params![ns.as_str()], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn clear(&self, ns: Namespace) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let count = conn.execute("DELETE FROM kv_entries WHERE namespace = ?1", params![ns.as_str()])?;
                tracing::debug!(namespace = ns.as_str(), count, "cleared namespace");
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
