//! Read-through cache strategy.
//!
//! A hit is answered from the partition with no network access and no
//! freshness check. A miss goes to the network; a `200` basic response is
//! duplicated, one copy written back and the other returned. Everything else
//! is returned untouched and never stored.

use std::sync::Arc;

use serde::Serialize;
use tilecache_core::{CacheDb, Error, Request, Response};

use crate::fetch::Network;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServedFrom {
    Cache,
    Network,
}

/// A response together with how it was obtained.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: ServedFrom,
    /// Whether a copy was written to the partition on this call.
    pub stored: bool,
}

/// Entry-level reads and writes against a partition it is handed.
///
/// Never creates or deletes whole partitions beyond lazily opening the one
/// it serves from.
#[derive(Clone)]
pub struct CacheStrategy {
    db: CacheDb,
    network: Arc<dyn Network>,
}

impl CacheStrategy {
    pub fn new(db: CacheDb, network: Arc<dyn Network>) -> Self {
        Self { db, network }
    }

    /// Serve a request from `partition`, populating it on a miss.
    ///
    /// # Errors
    ///
    /// Returns the network error on a miss whose fetch fails, or a storage
    /// error if the partition cannot be opened or read.
    pub async fn serve(&self, request: &Request, partition: &str) -> Result<Served, Error> {
        if !request.is_cacheable_method() {
            return self.passthrough(request).await;
        }

        self.db.open_partition(partition).await?;

        if let Some(response) = self.db.match_entry(partition, request).await? {
            tracing::debug!(url = %request.url, partition, "cache hit");
            return Ok(Served { response, source: ServedFrom::Cache, stored: false });
        }

        tracing::debug!(url = %request.url, partition, "cache miss");
        let response = self.network.fetch(request).await?;

        if !response.is_storable() {
            tracing::debug!(
                url = %request.url,
                status = response.status,
                response_type = %response.response_type,
                "response not eligible for storage"
            );
            return Ok(Served { response, source: ServedFrom::Network, stored: false });
        }

        let (response, copy) = response.duplicate();
        let stored = match self.db.put_entry(partition, request, &copy).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(url = %request.url, partition, error = %e, "failed to store response");
                false
            }
        };

        Ok(Served { response, source: ServedFrom::Network, stored })
    }

    /// Fetch from the network with no storage side effect.
    pub async fn passthrough(&self, request: &Request) -> Result<Served, Error> {
        let response = self.network.fetch(request).await?;
        Ok(Served { response, source: ServedFrom::Network, stored: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::scripted::ScriptedNetwork;
    use tilecache_core::ResponseType;

    /// Tile proxied through the application origin, so its responses are basic.
    const TILE: &str = "https://maps.example.com/tiles/5/10/12.png";
    const FOREIGN_TILE: &str = "https://tile.example.org/5/10/12.png";

    async fn strategy(network: ScriptedNetwork) -> (CacheStrategy, CacheDb, Arc<ScriptedNetwork>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(network);
        (CacheStrategy::new(db.clone(), network.clone()), db, network)
    }

    #[tokio::test]
    async fn test_miss_populates_partition() {
        let (strategy, db, network) = strategy(ScriptedNetwork::new().ok(TILE, b"tile")).await;
        let request = Request::parse(TILE).unwrap();

        let served = strategy.serve(&request, "tiles-v1").await.unwrap();
        assert_eq!(served.source, ServedFrom::Network);
        assert!(served.stored);
        assert_eq!(network.call_count(), 1);

        let stored = db.match_entry("tiles-v1", &request).await.unwrap().unwrap();
        assert_eq!(stored, served.response);
    }

    #[tokio::test]
    async fn test_hit_makes_no_network_call() {
        let (strategy, db, network) = strategy(ScriptedNetwork::new()).await;
        let request = Request::parse(TILE).unwrap();
        let cached = Response::new(request.url.clone(), 200, ResponseType::Basic, &b"cached"[..]);
        db.open_partition("tiles-v1").await.unwrap();
        db.put_entry("tiles-v1", &request, &cached).await.unwrap();

        let served = strategy.serve(&request, "tiles-v1").await.unwrap();
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.response, cached);
        assert_eq!(network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_second_request_served_from_cache() {
        let (strategy, _db, network) = strategy(ScriptedNetwork::new().ok(TILE, b"tile")).await;
        let request = Request::parse(TILE).unwrap();

        strategy.serve(&request, "tiles-v1").await.unwrap();
        let second = strategy.serve(&request, "tiles-v1").await.unwrap();

        assert_eq!(second.source, ServedFrom::Cache);
        assert_eq!(network.call_count(), 1);
    }

    #[tokio::test]
    async fn test_non_200_not_stored() {
        let (strategy, db, _network) =
            strategy(ScriptedNetwork::new().respond(TILE, 404, ResponseType::Basic, b"missing")).await;
        let request = Request::parse(TILE).unwrap();

        let served = strategy.serve(&request, "tiles-v1").await.unwrap();
        assert_eq!(served.response.status, 404);
        assert!(!served.stored);
        assert!(db.match_entry("tiles-v1", &request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_opaque_and_cors_not_stored() {
        for response_type in [ResponseType::Opaque, ResponseType::Cors] {
            let (strategy, db, _network) =
                strategy(ScriptedNetwork::new().respond(TILE, 200, response_type, b"tile")).await;
            let request = Request::parse(TILE).unwrap();

            let served = strategy.serve(&request, "tiles-v1").await.unwrap();
            assert_eq!(served.response.response_type, response_type);
            assert!(db.match_entry("tiles-v1", &request).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_cross_origin_tile_served_but_not_kept() {
        let (strategy, db, network) = strategy(ScriptedNetwork::new().ok(FOREIGN_TILE, b"tile")).await;
        let request = Request::parse(FOREIGN_TILE).unwrap();

        let served = strategy.serve(&request, "tiles-v1").await.unwrap();
        assert_eq!(served.response.response_type, ResponseType::Opaque);
        assert_eq!(served.response.body.as_ref(), b"tile");
        assert!(!served.stored);
        assert_eq!(db.entry_count("tiles-v1").await.unwrap(), 0);

        let again = strategy.serve(&request, "tiles-v1").await.unwrap();
        assert_eq!(again.source, ServedFrom::Network);
        assert_eq!(network.call_count(), 2);
    }

    #[tokio::test]
    async fn test_network_failure_propagates() {
        let (strategy, db, _network) = strategy(ScriptedNetwork::new().fail(TILE, "offline")).await;
        let request = Request::parse(TILE).unwrap();

        let result = strategy.serve(&request, "tiles-v1").await;
        assert!(matches!(result, Err(Error::Network(msg)) if msg == "offline"));
        assert_eq!(db.entry_count("tiles-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_serve_opens_partition_lazily() {
        let (strategy, db, _network) = strategy(ScriptedNetwork::new().fail(TILE, "offline")).await;
        let request = Request::parse(TILE).unwrap();

        let _ = strategy.serve(&request, "tiles-v7").await;
        assert!(db.has_partition("tiles-v7").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_get_bypasses_partition() {
        let (strategy, db, network) = strategy(ScriptedNetwork::new().ok(TILE, b"tile")).await;
        let request = Request::parse(TILE).unwrap().with_method("POST");

        let served = strategy.serve(&request, "tiles-v1").await.unwrap();
        assert!(!served.stored);
        assert_eq!(network.call_count(), 1);
        assert!(!db.has_partition("tiles-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_passthrough_never_stores() {
        let (strategy, db, _network) = strategy(ScriptedNetwork::new().ok(TILE, b"tile")).await;
        let request = Request::parse(TILE).unwrap();

        let served = strategy.passthrough(&request).await.unwrap();
        assert_eq!(served.source, ServedFrom::Network);
        assert!(db.partition_names().await.unwrap().is_empty());
    }
}
