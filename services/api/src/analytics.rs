//! The aggregation engine: coalescer -> two-tier cache -> source resolver
//! -> chunked reducer, in that order, for one (dataset, year) key at a time.

use std::sync::Arc;

use tokio_util::io::SyncIoBridge;

use crate::aggregate::{reduce_csv, AggregateResult};
use crate::cache::TieredCache;
use crate::coalesce::FlightGroup;
use crate::dataset::DatasetKind;
use crate::error::AnalyticsError;
use crate::geo::GeoTables;
use crate::source::{DataSource, SourceResolver};

/// Bumped whenever the aggregation logic or the result shape changes, so
/// stale cache entries invalidate themselves without a manual flush.
pub const CACHE_SCHEMA_VERSION: u32 = 10;

/// Rendered cache key; also the coalescing token.
pub fn cache_key(kind: DatasetKind, year: &str) -> String {
    format!("agg_v{CACHE_SCHEMA_VERSION}:{kind}:{year}")
}

pub struct AnalyticsEngine {
    cache: Arc<TieredCache>,
    resolver: Arc<SourceResolver>,
    tables: Arc<GeoTables>,
    flights: FlightGroup<Arc<AggregateResult>>,
    chunk_rows: usize,
}

impl AnalyticsEngine {
    pub fn new(
        cache: TieredCache,
        resolver: Arc<SourceResolver>,
        tables: Arc<GeoTables>,
        chunk_rows: usize,
    ) -> Self {
        Self {
            cache: Arc::new(cache),
            resolver,
            tables,
            flights: FlightGroup::new(),
            chunk_rows,
        }
    }

    /// Aggregate `(kind, year)`, serving from cache when possible. A burst
    /// of concurrent callers for the same key results in one computation;
    /// everyone gets the same value (or the same error).
    pub async fn get_aggregate(
        &self,
        kind: DatasetKind,
        year: &str,
    ) -> Result<Arc<AggregateResult>, AnalyticsError> {
        let key = cache_key(kind, year);
        let cache = self.cache.clone();
        let resolver = self.resolver.clone();
        let tables = self.tables.clone();
        let chunk_rows = self.chunk_rows;
        let year = year.to_string();
        let compute_key = key.clone();

        self.flights
            .run(&key, move || async move {
                if let Some(hit) = cache.get(&compute_key).await {
                    return Ok(hit);
                }
                let source = resolver.resolve(kind, &year).await?;
                println!("Aggregating {compute_key} from {}", source.origin);
                let result = Arc::new(reduce_source(source, kind, tables, chunk_rows).await?);
                cache.put(&compute_key, result.clone()).await;
                Ok(result)
            })
            .await
    }
}

/// The parse-and-fold loop is CPU-bound; run it on a blocking worker so the
/// request loop keeps serving, bridging the async byte stream into the
/// synchronous reducer.
async fn reduce_source(
    source: DataSource,
    kind: DatasetKind,
    tables: Arc<GeoTables>,
    chunk_rows: usize,
) -> Result<AggregateResult, AnalyticsError> {
    tokio::task::spawn_blocking(move || {
        let reader = SyncIoBridge::new(source.reader);
        reduce_csv(reader, kind, &tables, chunk_rows)
    })
    .await
    .map_err(|e| AnalyticsError::Internal(format!("aggregation worker: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const SAMPLE: &str = "\
date,state,district,pincode,bio_age_5_17,bio_age_17_
01-03-2024,Karnataka,Bangalore,560001,100,50
02-03-2024,bangalore,Bangalore,560002,0,20
03-03-2024,Gondwanaland,X,000000,5,5
";

    fn engine_over(dir: &std::path::Path) -> AnalyticsEngine {
        let http = reqwest::Client::new();
        AnalyticsEngine::new(
            TieredCache::new(None, Duration::from_secs(86_400)),
            Arc::new(SourceResolver::new(dir.to_path_buf(), "example/none", "dataset-latest", http)),
            Arc::new(GeoTables::load()),
            1_000,
        )
    }

    #[test]
    fn keys_embed_the_schema_version() {
        assert_eq!(cache_key(DatasetKind::Biometric, "all"), "agg_v10:biometric:all");
        assert_eq!(cache_key(DatasetKind::Enrolment, "2024"), "agg_v10:enrolment:2024");
    }

    #[tokio::test]
    async fn computes_then_serves_the_cached_value() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("biometric_full.csv"), SAMPLE).unwrap();
        let engine = engine_over(dir.path());

        let first = engine.get_aggregate(DatasetKind::Biometric, "all").await.unwrap();
        assert_eq!(first.total_updates, 170);

        // Second call is an L1 hit: the very same allocation comes back.
        let second = engine.get_aggregate(DatasetKind::Biometric, "all").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_one_reduction() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("biometric_full.csv"), SAMPLE).unwrap();
        let engine = Arc::new(engine_over(dir.path()));
        let done = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let engine = engine.clone();
            let done = done.clone();
            handles.push(tokio::spawn(async move {
                let result = engine.get_aggregate(DatasetKind::Biometric, "all").await.unwrap();
                done.fetch_add(1, Ordering::SeqCst);
                result.total_updates
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 170);
        }
        assert_eq!(done.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    async fn year_specific_key_reads_the_split_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("split_data")).unwrap();
        std::fs::write(dir.path().join("split_data").join("biometric_2024.csv"), SAMPLE).unwrap();
        let engine = engine_over(dir.path());

        let result = engine.get_aggregate(DatasetKind::Biometric, "2024").await.unwrap();
        assert_eq!(result.by_state["Karnataka"], 170);
    }

    #[tokio::test]
    async fn malformed_source_surfaces_and_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        // Header lacks the biometric columns entirely.
        std::fs::write(dir.path().join("biometric_full.csv"), "a,b,c\n1,2,3\n").unwrap();
        let engine = engine_over(dir.path());

        let err = engine.get_aggregate(DatasetKind::Biometric, "all").await.unwrap_err();
        assert!(matches!(err, AnalyticsError::MalformedSource { .. }));

        // Fix the file: the next request recomputes instead of serving a
        // poisoned cache entry.
        std::fs::write(dir.path().join("biometric_full.csv"), SAMPLE).unwrap();
        let ok = engine.get_aggregate(DatasetKind::Biometric, "all").await.unwrap();
        assert_eq!(ok.total_updates, 170);
    }
}
