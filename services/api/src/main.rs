//! API Service - Pre-aggregated census analytics
//!
//! Endpoints:
//! - GET  /health - Health check
//! - GET  /api/analytics/:dataset?year=&format=&view= - Aggregated statistics
//! - GET  /api/datasets/:name - Redirect to the released raw CSV (API key)
//! - POST /api/insights/query - Raw-record page from the upstream API (API key)
//!
//! The aggregation engine streams the raw CSV extracts in bounded chunks,
//! normalizes geography, and serves repeated requests through an in-process
//! cache backed by a shared TTL store, with one computation per key.

mod aggregate;
mod analytics;
mod cache;
mod coalesce;
mod dataset;
mod error;
mod geo;
mod insights;
mod source;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderName, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::aggregate::{AggregateResult, DEFAULT_CHUNK_ROWS};
use crate::analytics::AnalyticsEngine;
use crate::cache::{RestKvStore, TieredCache};
use crate::dataset::DatasetKind;
use crate::error::AnalyticsError;
use crate::geo::GeoTables;
use crate::insights::{InsightsProxy, InsightsQuery};
use crate::source::{source_file_name, SourceResolver};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
struct Config {
    bind: String,
    datasets_dir: PathBuf,
    dataset_repo: String,
    release_tag: String,
    upstash_url: Option<String>,
    upstash_token: Option<String>,
    client_api_key: Option<String>,
    data_gov_api_key: Option<String>,
    cache_ttl_secs: u64,
    chunk_rows: usize,
    prewarm: bool,
    prewarm_year: String,
}

impl Config {
    fn from_env() -> Self {
        Self {
            bind: std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            datasets_dir: PathBuf::from(
                std::env::var("DATASETS_DIR").unwrap_or_else(|_| "./public/datasets".to_string()),
            ),
            dataset_repo: std::env::var("DATASET_REPO")
                .unwrap_or_else(|_| "sreecharan-desu/uidai-data-sync".to_string()),
            release_tag: std::env::var("DATASET_RELEASE_TAG")
                .unwrap_or_else(|_| "dataset-latest".to_string()),
            upstash_url: std::env::var("UPSTASH_REDIS_REST_URL").ok(),
            upstash_token: std::env::var("UPSTASH_REDIS_REST_TOKEN").ok(),
            client_api_key: std::env::var("CLIENT_API_KEY").ok(),
            data_gov_api_key: std::env::var("DATA_GOV_API_KEY").ok(),
            cache_ttl_secs: std::env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86_400),
            chunk_rows: std::env::var("CHUNK_ROWS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CHUNK_ROWS),
            prewarm: std::env::var("PREWARM_CACHE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            prewarm_year: std::env::var("PREWARM_YEAR").unwrap_or_else(|_| "2025".to_string()),
        }
    }
}

struct AppState {
    config: Config,
    engine: AnalyticsEngine,
    insights: InsightsProxy,
    resolver: Arc<SourceResolver>,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct AnalyticsQuery {
    year: Option<String>,
    format: Option<String>,
    view: Option<String>,
}

/// Stable error codes only; detail stays in the process log so internal
/// paths and URLs never reach a client.
fn error_response(err: &AnalyticsError) -> Response {
    let status = match err {
        AnalyticsError::InvalidDataset(_) => StatusCode::BAD_REQUEST,
        AnalyticsError::SourceUnavailable { .. } => StatusCode::BAD_GATEWAY,
        AnalyticsError::MalformedSource { .. }
        | AnalyticsError::Cache(_)
        | AnalyticsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    eprintln!("Request failed: {err}");
    (
        status,
        Json(ErrorResponse {
            error: err.code().to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn is_valid_year(year: &str) -> bool {
    year == "all" || (year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()))
}

async fn analytics_handler(
    State(state): State<Arc<AppState>>,
    Path(dataset): Path<String>,
    Query(params): Query<AnalyticsQuery>,
) -> Response {
    let kind: DatasetKind = match dataset.parse() {
        Ok(kind) => kind,
        Err(e) => return error_response(&e),
    };
    let year = params.year.unwrap_or_else(|| "all".to_string());
    if !is_valid_year(&year) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "invalid_year".to_string(),
            }),
        )
            .into_response();
    }

    let data = match state.engine.get_aggregate(kind, &year).await {
        Ok(data) => data,
        Err(e) => return error_response(&e),
    };

    if params.format.as_deref() == Some("csv") {
        let view = params.view.as_deref().unwrap_or("state");
        return match csv_export(kind, &year, view, &data) {
            Ok(response) => response,
            Err(e) => error_response(&e),
        };
    }

    let generated_at = Utc::now().to_rfc3339();
    (
        [
            (
                header::CACHE_CONTROL,
                "public, s-maxage=3600, stale-while-revalidate=600".to_string(),
            ),
            (HeaderName::from_static("x-generated-at"), generated_at.clone()),
        ],
        Json(serde_json::json!({
            "dataset": kind,
            "year": year,
            "generated_at": generated_at,
            "data": &*data,
        })),
    )
        .into_response()
}

/// Flatten one view of the aggregate into a downloadable CSV.
fn csv_export(
    kind: DatasetKind,
    year: &str,
    view: &str,
    data: &AggregateResult,
) -> Result<Response, AnalyticsError> {
    fn internal<E: std::fmt::Display>(e: E) -> AnalyticsError {
        AnalyticsError::Internal(format!("csv export: {e}"))
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    if view == "age" {
        writer.write_record(["AgeGroup", "Updates"]).map_err(|e| internal(e))?;
        for (age, count) in &data.by_age_group {
            let count = count.to_string();
            writer
                .write_record([age.as_str(), count.as_str()])
                .map_err(|e| internal(e))?;
        }
    } else {
        writer.write_record(["State", "Updates"]).map_err(|e| internal(e))?;
        for (state, count) in &data.by_state {
            let count = count.to_string();
            writer
                .write_record([state.as_str(), count.as_str()])
                .map_err(|e| internal(e))?;
        }
    }
    let bytes = writer.into_inner().map_err(|e| internal(e))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{kind}_{view}_{year}.csv\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Release asset behind a dataset name. The download surface also accepts
/// the double-l spelling and the combined master extract.
fn release_asset_for(name: &str) -> Option<String> {
    let clean = name.to_lowercase();
    let clean = clean.strip_suffix(".csv").unwrap_or(&clean);
    match clean {
        "master" => Some("master_dataset_final.csv".to_string()),
        "enrolment" | "enrollment" => Some(source_file_name(DatasetKind::Enrolment, "all")),
        "biometric" => Some(source_file_name(DatasetKind::Biometric, "all")),
        "demographic" => Some(source_file_name(DatasetKind::Demographic, "all")),
        _ => None,
    }
}

async fn datasets_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    match release_asset_for(&name) {
        Some(file_name) => {
            Redirect::temporary(&state.resolver.remote_url(&file_name)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "unknown_dataset".to_string(),
            }),
        )
            .into_response(),
    }
}

async fn insights_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InsightsQuery>,
) -> Response {
    match state.insights.fetch(&body).await {
        Ok(payload) => Json(payload).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Shared-key check for the protected routes.
async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());
    match (&state.config.client_api_key, provided) {
        (Some(expected), Some(got)) if got == expected => next.run(request).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "unauthorized".to_string(),
            }),
        )
            .into_response(),
    }
}

/// Compute the aggregates the dashboard asks for first, so early requests
/// land on a warm cache.
async fn prewarm(state: Arc<AppState>) {
    let year = state.config.prewarm_year.clone();
    println!("Pre-warming analytics cache for year {year}...");
    let jobs = DatasetKind::ALL.map(|kind| {
        let state = state.clone();
        let year = year.clone();
        async move { (kind, state.engine.get_aggregate(kind, &year).await) }
    });
    for (kind, outcome) in futures::future::join_all(jobs).await {
        match outcome {
            Ok(data) => println!("  ✓ {kind}: {} updates cached", data.total_updates),
            Err(e) => eprintln!("  ✗ {kind}: pre-warm failed: {e}"),
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    println!("=== UIDAI Insights API ===");
    println!("Datasets dir: {}", config.datasets_dir.display());
    println!("Release: {}@{}", config.dataset_repo, config.release_tag);
    if config.client_api_key.is_none() {
        println!("Warning: CLIENT_API_KEY not set; protected routes reject all requests");
    }

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .user_agent(format!("uidai-insights-api/{}", env!("CARGO_PKG_VERSION")))
        .build()?;

    let store = match (&config.upstash_url, &config.upstash_token) {
        (Some(url), Some(token)) => Some(Arc::new(RestKvStore::new(
            http.clone(),
            url.clone(),
            token.clone(),
        ))),
        _ => {
            println!("Warning: shared cache not configured; using in-process cache only");
            None
        }
    };

    let ttl = Duration::from_secs(config.cache_ttl_secs);
    let resolver = Arc::new(SourceResolver::new(
        config.datasets_dir.clone(),
        &config.dataset_repo,
        &config.release_tag,
        http.clone(),
    ));
    let engine = AnalyticsEngine::new(
        TieredCache::new(store.clone(), ttl),
        resolver.clone(),
        Arc::new(GeoTables::load()),
        config.chunk_rows,
    );
    let insights = InsightsProxy::new(
        http,
        config.data_gov_api_key.clone(),
        store,
        config.cache_ttl_secs,
    );

    let bind = config.bind.clone();
    let should_prewarm = config.prewarm;
    let state = Arc::new(AppState {
        config,
        engine,
        insights,
        resolver,
    });

    if should_prewarm {
        tokio::spawn(prewarm(state.clone()));
    }

    // CORS for the dashboard frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/datasets/:name", get(datasets_handler))
        .route("/api/insights/query", post(insights_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/analytics/:dataset", get(analytics_handler))
        .merge(protected)
        .layer(cors)
        .with_state(state);

    println!("API listening on http://{}", bind);
    println!("\nEndpoints:");
    println!("  GET  /health");
    println!("  GET  /api/analytics/:dataset?year=&format=&view=");
    println!("  GET  /api/datasets/:name");
    println!("  POST /api/insights/query");

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_validation_accepts_all_and_four_digits() {
        assert!(is_valid_year("all"));
        assert!(is_valid_year("2024"));
        assert!(!is_valid_year("24"));
        assert!(!is_valid_year("20244"));
        assert!(!is_valid_year("20a4"));
        assert!(!is_valid_year("../../etc"));
        assert!(!is_valid_year(""));
    }

    #[test]
    fn release_assets_accept_both_spellings_and_master() {
        assert_eq!(release_asset_for("enrolment").as_deref(), Some("enrolment_full.csv"));
        assert_eq!(release_asset_for("enrollment").as_deref(), Some("enrolment_full.csv"));
        assert_eq!(release_asset_for("Biometric.csv").as_deref(), Some("biometric_full.csv"));
        assert_eq!(release_asset_for("demographic").as_deref(), Some("demographic_full.csv"));
        assert_eq!(release_asset_for("master").as_deref(), Some("master_dataset_final.csv"));
        assert!(release_asset_for("payroll").is_none());
    }

    #[test]
    fn csv_export_flattens_the_state_view() {
        let mut data = AggregateResult::default();
        data.by_state.insert("Karnataka".to_string(), 170);
        data.by_state.insert("Kerala".to_string(), 30);
        data.by_age_group.insert("18+".to_string(), 70);

        let response = csv_export(DatasetKind::Biometric, "all", "state", &data).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.contains("biometric_state_all.csv"));
    }
}
