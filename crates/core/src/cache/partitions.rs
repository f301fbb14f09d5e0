//! Whole-partition operations.
//!
//! Partitions are created lazily and only ever destroyed as a unit. Entry
//! rows go with them through `ON DELETE CASCADE`.

use super::connection::CacheDb;
use crate::Error;
use crate::registry::{PartitionClass, PartitionName};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// A stored partition and its size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PartitionSummary {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
}

impl CacheDb {
    /// Open a partition, creating it if it does not exist.
    ///
    /// Names outside the known classes are accepted and stored without a
    /// class; activation never touches them.
    pub async fn open_partition(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let (class, generation) = match PartitionName::parse(&name) {
            Ok(parsed) => (Some(parsed.class().prefix()), Some(parsed.generation())),
            Err(_) => (PartitionClass::of_name(&name).map(PartitionClass::prefix), None),
        };
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, class, generation, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![name, class, generation, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a partition exists.
    pub async fn has_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every stored partition, oldest first.
    pub async fn partition_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Every stored partition with its entry count.
    pub async fn partition_summaries(&self) -> Result<Vec<PartitionSummary>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<PartitionSummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT p.name, COUNT(e.key), p.created_at
                     FROM partitions p LEFT JOIN entries e ON e.partition = p.name
                     GROUP BY p.name
                     ORDER BY p.created_at ASC, p.name ASC",
                )?;
                let summaries = stmt
                    .query_map([], |row| {
                        Ok(PartitionSummary {
                            name: row.get(0)?,
                            entries: row.get::<_, i64>(1)? as u64,
                            created_at: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(summaries)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and all of its entries.
    ///
    /// Returns whether the partition existed. Deleting an absent partition
    /// is not an error.
    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
