//! Entry reads and writes within a partition.
//!
//! An entry maps a request identity to an immutable response snapshot. Writes
//! are upserts: two concurrent misses for the same request both write, and
//! the last one wins.

use super::connection::CacheDb;
use crate::Error;
use crate::request::{Request, RequestIdentity};
use crate::response::{Response, ResponseType};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

/// A response snapshot as stored in a partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub partition: String,
    pub key: String,
    /// Request URL the entry is keyed by.
    pub url: String,
    /// Final URL of the stored response; differs from `url` after a redirect.
    pub response_url: Option<String>,
    pub method: String,
    pub status: u16,
    pub response_type: String,
    pub headers_json: String,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoredEntry {
    fn capture(partition: &str, request: &Request, response: &Response) -> Result<Self, Error> {
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::CorruptEntry(format!("failed to encode headers: {e}")))?;

        Ok(Self {
            partition: partition.to_string(),
            key: request.identity().as_str().to_string(),
            url: request.url.to_string(),
            response_url: Some(response.url.to_string()),
            method: request.method.clone(),
            status: response.status,
            response_type: response.response_type.as_str().to_string(),
            headers_json,
            body: response.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Rebuild the response this entry was captured from.
    pub fn into_response(self) -> Result<Response, Error> {
        let href = self.response_url.as_deref().unwrap_or(&self.url);
        let url = Url::parse(href).map_err(|e| Error::CorruptEntry(format!("{href}: {e}")))?;
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)
            .map_err(|e| Error::CorruptEntry(format!("failed to decode headers: {e}")))?;
        let response_type: ResponseType = self.response_type.parse()?;

        Ok(Response { url, status: self.status, response_type, headers, body: Bytes::from(self.body) })
    }
}

impl CacheDb {
    /// Store a response snapshot for a request.
    ///
    /// The partition must already exist.
    pub async fn put_entry(&self, partition: &str, request: &Request, response: &Response) -> Result<(), Error> {
        let entry = StoredEntry::capture(partition, request, response)?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                    partition, key, url, response_url, method, status, response_type, headers_json, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(partition, key) DO UPDATE SET
                    url = excluded.url,
                    response_url = excluded.response_url,
                    method = excluded.method,
                    status = excluded.status,
                    response_type = excluded.response_type,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![
                        &entry.partition,
                        &entry.key,
                        &entry.url,
                        &entry.response_url,
                        &entry.method,
                        entry.status,
                        &entry.response_type,
                        &entry.headers_json,
                        &entry.body,
                        &entry.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the stored entry for a request identity.
    ///
    /// Returns None if the partition or the entry doesn't exist.
    pub async fn get_entry(&self, partition: &str, identity: &RequestIdentity) -> Result<Option<StoredEntry>, Error> {
        let partition = partition.to_string();
        let key = identity.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT partition, key, url, response_url, method, status, response_type, headers_json, body,
                            stored_at
                     FROM entries WHERE partition = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![partition, key], |row| {
                    Ok(StoredEntry {
                        partition: row.get(0)?,
                        key: row.get(1)?,
                        url: row.get(2)?,
                        response_url: row.get(3)?,
                        method: row.get(4)?,
                        status: row.get(5)?,
                        response_type: row.get(6)?,
                        headers_json: row.get(7)?,
                        body: row.get(8)?,
                        stored_at: row.get(9)?,
                    })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for a request.
    pub async fn match_entry(&self, partition: &str, request: &Request) -> Result<Option<Response>, Error> {
        match self.get_entry(partition, &request.identity()).await? {
            Some(entry) => entry.into_response().map(Some),
            None => Ok(None),
        }
    }

    /// URLs stored in a partition, in insertion order.
    pub async fn entry_urls(&self, partition: &str) -> Result<Vec<String>, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE partition = ?1 ORDER BY rowid ASC")?;
                let urls = stmt
                    .query_map(params![partition], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a partition.
    pub async fn entry_count(&self, partition: &str) -> Result<u64, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![partition], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
