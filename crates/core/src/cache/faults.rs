//! Storage fault injection for tests.
//!
//! Installs SQLite triggers that abort selected writes, so callers can check
//! how a single failed deletion or insert is handled while the rest of the
//! database keeps working.

use super::connection::CacheDb;
use crate::Error;

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn trigger_name(kind: &str, target: &str) -> String {
    let key = crate::cache::hash::compute_request_key(kind, target);
    format!("fault_{kind}_{}", &key[..16])
}

impl CacheDb {
    /// Make every deletion of partition `name` fail with `reason`.
    pub async fn fail_partition_deletes(&self, name: &str, reason: &str) -> Result<(), Error> {
        let sql = format!(
            "CREATE TRIGGER IF NOT EXISTS {} BEFORE DELETE ON partitions WHEN old.name = {}
             BEGIN SELECT RAISE(ABORT, {}); END",
            trigger_name("delete", name),
            quote(name),
            quote(reason),
        );
        self.install_fault(sql).await
    }

    /// Make every write of an entry for request URL `url` fail with `reason`.
    pub async fn fail_entry_writes(&self, url: &str, reason: &str) -> Result<(), Error> {
        let sql = format!(
            "CREATE TRIGGER IF NOT EXISTS {} BEFORE INSERT ON entries WHEN new.url = {}
             BEGIN SELECT RAISE(ABORT, {}); END",
            trigger_name("write", url),
            quote(url),
            quote(reason),
        );
        self.install_fault(sql).await
    }

    async fn install_fault(&self, sql: String) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, Response, ResponseType};

    #[tokio::test]
    async fn test_delete_fault_is_scoped_to_one_partition() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_partition("appshell-v1").await.unwrap();
        db.open_partition("tiles-v1").await.unwrap();
        db.fail_partition_deletes("appshell-v1", "locked").await.unwrap();

        let err = db.delete_partition("appshell-v1").await.unwrap_err();
        assert!(err.to_string().contains("locked"));
        assert!(db.has_partition("appshell-v1").await.unwrap());
        assert!(db.delete_partition("tiles-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_write_fault_is_scoped_to_one_url() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_partition("appshell-v1").await.unwrap();
        db.fail_entry_writes("https://maps.example.com/b.css", "disk full").await.unwrap();

        let blocked = Request::parse("https://maps.example.com/b.css").unwrap();
        let allowed = Request::parse("https://maps.example.com/a.html").unwrap();
        let body = |r: &Request| Response::new(r.url.clone(), 200, ResponseType::Basic, &b"x"[..]);

        assert!(db.put_entry("appshell-v1", &blocked, &body(&blocked)).await.is_err());
        db.put_entry("appshell-v1", &allowed, &body(&allowed)).await.unwrap();
        assert_eq!(db.entry_count("appshell-v1").await.unwrap(), 1);
    }
}
