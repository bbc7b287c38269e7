//! Per-dataset sample storage and incremental queries.
//!
//! One samples table per dataset, named by the dataset. Rows are logically
//! partitioned by `hostname`; probers for unrelated targets write through the
//! same pool without coordinating in-process.

use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::storage::{Database, Sample, SampleBatch, StorageError};

/// Check that a dataset name is usable as a table identifier.
///
/// Table names cannot be bound as SQL parameters, so anything outside
/// `[A-Za-z_][A-Za-z0-9_]*` is rejected before it reaches a statement.
fn is_valid_dataset_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Append-only time series of connect-latency samples for one dataset.
///
/// Timestamps are assigned here at write time, so they are monotonic
/// non-decreasing per target as long as each target has a single writer.
#[derive(Clone)]
pub struct SampleStore {
    db: Database,
    table: String,
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl SampleStore {
    /// Open the samples table for `dataset`, creating it and its indexes if
    /// missing.
    pub async fn open(db: Database, dataset: &str) -> Result<Self, StorageError> {
        if !is_valid_dataset_name(dataset) {
            return Err(StorageError::InvalidDatasetName(dataset.to_string()));
        }

        let store = Self {
            db,
            table: dataset.to_string(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Name of the dataset this store is bound to.
    pub fn dataset(&self) -> &str {
        &self.table
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let table = &self.table;
        let ddl = [
            format!(
                r#"CREATE TABLE IF NOT EXISTS "{table}" (
                       t        BIGINT NOT NULL,
                       hostname TEXT NOT NULL,
                       delay    REAL
                   )"#
            ),
            format!(r#"CREATE INDEX IF NOT EXISTS "{table}_t_idx" ON "{table}" (t)"#),
            format!(
                r#"CREATE INDEX IF NOT EXISTS "{table}_hostname_t_idx" ON "{table}" (hostname, t)"#
            ),
        ];
        for stmt in &ddl {
            sqlx::query(stmt).execute(self.db.pool()).await?;
        }

        tracing::debug!(dataset = %table, "Sample table ready");
        Ok(())
    }

    /// Append one sample for `hostname`.
    ///
    /// The timestamp is assigned here, at write time. A `None` delay (probe
    /// attempted, connection failed or timed out) is stored as a NULL row,
    /// never rejected.
    pub async fn insert(&self, hostname: &str, delay_ms: Option<f64>) -> Result<(), StorageError> {
        let sql = format!(
            r#"INSERT INTO "{}" (t, hostname, delay) VALUES (?, ?, ?)"#,
            self.table
        );
        sqlx::query(&sql)
            .bind(Utc::now().timestamp_micros())
            .bind(hostname)
            .bind(delay_ms)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Samples for `hostname` strictly newer than `since`, ascending by
    /// timestamp; full history when `since` is absent.
    ///
    /// The returned batch's `last_fetched` is the maximum timestamp among the
    /// returned rows, or the caller's `since` unchanged when no rows matched.
    pub async fn query(
        &self,
        hostname: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<SampleBatch, StorageError> {
        let rows = match since {
            Some(cursor) => {
                let sql = format!(
                    r#"SELECT t, delay FROM "{}" WHERE hostname = ? AND t > ? ORDER BY t ASC"#,
                    self.table
                );
                sqlx::query(&sql)
                    .bind(hostname)
                    .bind(cursor.timestamp_micros())
                    .fetch_all(self.db.pool())
                    .await?
            }
            None => {
                let sql = format!(
                    r#"SELECT t, delay FROM "{}" WHERE hostname = ? ORDER BY t ASC"#,
                    self.table
                );
                sqlx::query(&sql)
                    .bind(hostname)
                    .fetch_all(self.db.pool())
                    .await?
            }
        };

        let mut batch = SampleBatch::with_cursor(since);
        for row in rows {
            let ts = DateTime::from_timestamp_micros(row.get::<i64, _>(0))
                .unwrap_or(DateTime::UNIX_EPOCH);
            batch.push(Sample {
                ts,
                delay_ms: row.get(1),
            });
        }
        Ok(batch)
    }

    /// Remove every stored sample for `hostname`. Returns the purged row count.
    pub async fn delete_target(&self, hostname: &str) -> Result<u64, StorageError> {
        let sql = format!(r#"DELETE FROM "{}" WHERE hostname = ?"#, self.table);
        let result = sqlx::query(&sql)
            .bind(hostname)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Targets with any stored history in this dataset.
    pub async fn distinct_targets(&self) -> Result<Vec<String>, StorageError> {
        let sql = format!(
            r#"SELECT DISTINCT hostname FROM "{}" ORDER BY hostname"#,
            self.table
        );
        let rows = sqlx::query(&sql).fetch_all(self.db.pool()).await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
    }
}

/// Dataset tables present in the database, SQLite internals excluded.
pub async fn list_datasets(db: &Database) -> Result<Vec<String>, StorageError> {
    let rows = sqlx::query(
        "SELECT name FROM sqlite_schema
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
         ORDER BY name",
    )
    .fetch_all(db.pool())
    .await?;
    Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    async fn open_test_store(dataset: &str) -> (SampleStore, Database, TempDir) {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("store.db").display());
        let db = Database::connect(&url).await.unwrap();
        let store = SampleStore::open(db.clone(), dataset).await.unwrap();
        (store, db, dir)
    }

    #[tokio::test]
    async fn test_insert_and_query_roundtrip() {
        let (store, _db, _dir) = open_test_store("office").await;

        store.insert("example.org", Some(42.5)).await.unwrap();
        store.insert("example.org", None).await.unwrap();

        let batch = store.query("example.org", None).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.delay, vec![Some(42.5), None]);
        assert_eq!(batch.disconnected, vec![None, Some(1)]);
        assert_eq!(batch.last_fetched, Some(batch.time[1]));
        // Ascending timestamps
        assert!(batch.time[0] <= batch.time[1]);
    }

    #[tokio::test]
    async fn test_query_unknown_target_is_empty() {
        let (store, _db, _dir) = open_test_store("office").await;
        let batch = store.query("nobody.invalid", None).await.unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.last_fetched, None);
    }

    #[tokio::test]
    async fn test_cursor_is_strictly_newer() {
        let (store, _db, _dir) = open_test_store("office").await;

        for delay in [Some(1.0), Some(2.0), None] {
            store.insert("example.org", delay).await.unwrap();
        }

        let first = store.query("example.org", None).await.unwrap();
        assert_eq!(first.len(), 3);
        let cursor = first.last_fetched;

        // Nothing new: empty batch, cursor unchanged
        let second = store.query("example.org", cursor).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(second.last_fetched, cursor);

        // One new row: only it is returned, cursor advances
        store.insert("example.org", Some(3.0)).await.unwrap();
        let third = store.query("example.org", cursor).await.unwrap();
        assert_eq!(third.len(), 1);
        assert_eq!(third.delay, vec![Some(3.0)]);
        assert!(third.last_fetched > cursor);
    }

    #[tokio::test]
    async fn test_delete_target_purges_only_that_target() {
        let (store, _db, _dir) = open_test_store("office").await;

        store.insert("a.example", Some(1.0)).await.unwrap();
        store.insert("a.example", Some(2.0)).await.unwrap();
        store.insert("b.example", Some(3.0)).await.unwrap();

        let purged = store.delete_target("a.example").await.unwrap();
        assert_eq!(purged, 2);

        assert!(store.query("a.example", None).await.unwrap().is_empty());
        assert_eq!(store.query("b.example", None).await.unwrap().len(), 1);
        assert_eq!(store.distinct_targets().await.unwrap(), vec!["b.example"]);
    }

    #[tokio::test]
    async fn test_distinct_targets() {
        let (store, _db, _dir) = open_test_store("office").await;
        assert!(store.distinct_targets().await.unwrap().is_empty());

        store.insert("b.example", None).await.unwrap();
        store.insert("a.example", Some(5.0)).await.unwrap();
        store.insert("a.example", Some(6.0)).await.unwrap();

        assert_eq!(
            store.distinct_targets().await.unwrap(),
            vec!["a.example", "b.example"]
        );
    }

    #[tokio::test]
    async fn test_dataset_name_validation() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("names.db").display());
        let db = Database::connect(&url).await.unwrap();

        for bad in ["", "1leading", "semi;colon", "drop table", "a-b"] {
            let err = SampleStore::open(db.clone(), bad).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidDatasetName(_)), "{bad}");
        }

        for good in ["office", "_private", "Lab_2"] {
            assert!(SampleStore::open(db.clone(), good).await.is_ok(), "{good}");
        }
    }

    #[tokio::test]
    async fn test_list_datasets() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("list.db").display());
        let db = Database::connect(&url).await.unwrap();

        assert!(list_datasets(&db).await.unwrap().is_empty());

        SampleStore::open(db.clone(), "office").await.unwrap();
        SampleStore::open(db.clone(), "home").await.unwrap();

        assert_eq!(list_datasets(&db).await.unwrap(), vec!["home", "office"]);
    }

    #[tokio::test]
    async fn test_writers_on_distinct_targets_interleave() {
        let (store, _db, _dir) = open_test_store("office").await;

        let mut joins = Vec::new();
        for host in ["a.example", "b.example", "c.example"] {
            let store = store.clone();
            joins.push(tokio::spawn(async move {
                for i in 0..10 {
                    store.insert(host, Some(f64::from(i))).await.unwrap();
                }
            }));
        }
        for join in joins {
            join.await.unwrap();
        }

        for host in ["a.example", "b.example", "c.example"] {
            let batch = store.query(host, None).await.unwrap();
            assert_eq!(batch.len(), 10);
            // Per-target order is non-decreasing even with concurrent writers
            assert!(batch.time.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
