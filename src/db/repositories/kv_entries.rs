use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{helpers::parse_datetime, models::KvEntry, Database};

fn row_to_entry(row: &Row) -> Result<KvEntry, rusqlite::Error> {
    let updated_at: String = row.get("updated_at")?;

    Ok(KvEntry {
        key: row.get("key")?,
        value: row.get("value")?,
        updated_at: parse_datetime(&updated_at, "updated_at").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?,
    })
}

impl Database {
    /// Get a single entry by key
    pub async fn get_entry(&self, key: &str) -> Result<Option<KvEntry>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value, updated_at
                 FROM kv_entries
                 WHERE key = ?1",
            )?;

            let entry = stmt.query_row(params![key], row_to_entry).optional()?;
            Ok(entry)
        })
        .await
    }

    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_entry(key).await?.map(|entry| entry.value))
    }

    /// Insert or overwrite the value stored under `key`
    pub async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        let updated_at = Utc::now().to_rfc3339();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value, updated_at],
            )
            .with_context(|| "failed to upsert kv entry")?;
            Ok(())
        })
        .await
    }

    pub async fn delete_value(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
                .with_context(|| "failed to delete kv entry")?;
            Ok(())
        })
        .await
    }
}
