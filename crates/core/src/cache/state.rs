//! Engine bookkeeping kept next to the partitions.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::{params, rusqlite};

const INSTALLED_DEPLOYMENT: &str = "installed_deployment";

impl CacheDb {
    /// Identifier of the last deployment whose install completed.
    pub async fn installed_deployment(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT value FROM worker_state WHERE key = ?1",
                    params![INSTALLED_DEPLOYMENT],
                    |row| row.get(0),
                );
                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Record that a deployment's install completed.
    pub async fn record_installed_deployment(&self, id: &str) -> Result<(), Error> {
        let id = id.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO worker_state (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![INSTALLED_DEPLOYMENT, id, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
