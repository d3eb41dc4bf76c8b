//! Raw-record proxy over the upstream open-data API.
//!
//! Serves one page of unaggregated records with the fixed per-dataset
//! column selection, caching whole response payloads in the shared L2 store
//! under a stable key built from the sorted filter set.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::cache::RestKvStore;
use crate::dataset::DatasetKind;
use crate::error::AnalyticsError;
use crate::geo::title_case;

const UPSTREAM_BASE: &str = "https://api.data.gov.in/resource";

/// Query body accepted by the insights endpoint.
#[derive(Debug, Deserialize)]
pub struct InsightsQuery {
    pub dataset: String,
    #[serde(default)]
    pub filters: BTreeMap<String, Value>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

/// Upstream resource ids, one per dataset kind.
fn resource_id(kind: DatasetKind) -> &'static str {
    match kind {
        DatasetKind::Enrolment => "ecd49b12-3084-4521-8f7e-ca8bf72069ba",
        DatasetKind::Demographic => "19eac040-0b94-49fa-b239-4f2fd8677d53",
        DatasetKind::Biometric => "65454dab-1517-40a3-ac1d-47d4dfe6891c",
    }
}

/// Stable cache key: sorted column selection plus the filter map rendered
/// with sorted keys, so equivalent queries always collide.
fn insight_cache_key(
    kind: DatasetKind,
    page: i64,
    limit: i64,
    filters: &BTreeMap<String, Value>,
) -> String {
    let mut columns = kind.select_columns();
    columns.sort_unstable();
    let filter_json = serde_json::to_string(filters).unwrap_or_else(|_| "{}".to_string());
    format!(
        "insight:{}:{}:{}:{}:{}",
        kind,
        page,
        limit,
        columns.join(","),
        filter_json
    )
}

/// Geographic filter values are title-cased before hitting the upstream,
/// which indexes canonical spellings.
fn render_filter_value(key: &str, value: &Value) -> String {
    match value {
        Value::String(s) if key.eq_ignore_ascii_case("state") || key.eq_ignore_ascii_case("district") => {
            title_case(s)
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct InsightsProxy {
    http: reqwest::Client,
    api_key: Option<String>,
    store: Option<Arc<RestKvStore>>,
    ttl_secs: u64,
}

impl InsightsProxy {
    pub fn new(http: reqwest::Client, api_key: Option<String>, store: Option<Arc<RestKvStore>>, ttl_secs: u64) -> Self {
        Self {
            http,
            api_key,
            store,
            ttl_secs,
        }
    }

    pub async fn fetch(&self, query: &InsightsQuery) -> Result<Value, AnalyticsError> {
        let kind: DatasetKind = query.dataset.parse()?;
        let limit = query.limit.unwrap_or(100).clamp(1, 1000);
        let page = query.page.unwrap_or(1).max(1);
        let cache_key = insight_cache_key(kind, page, limit, &query.filters);

        if let Some(store) = &self.store {
            match store.get(&cache_key).await {
                Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                    Ok(mut payload) => {
                        payload["meta"]["source"] = json!("cache");
                        payload["meta"]["from_cache"] = json!(true);
                        return Ok(payload);
                    }
                    Err(e) => eprintln!("Warning: undecodable insight cache entry {cache_key}: {e}"),
                },
                Ok(None) => {}
                Err(e) => eprintln!("Warning: insight cache read failed: {e}"),
            }
        }

        let payload = self.fetch_upstream(kind, &query.filters, limit, page).await?;

        if let Some(store) = &self.store {
            match serde_json::to_string(&payload) {
                Ok(raw) => {
                    if let Err(e) = store.set(&cache_key, &raw, self.ttl_secs).await {
                        eprintln!("Warning: insight cache write failed: {e}");
                    }
                }
                Err(e) => eprintln!("Warning: could not encode insight payload: {e}"),
            }
        }
        Ok(payload)
    }

    async fn fetch_upstream(
        &self,
        kind: DatasetKind,
        filters: &BTreeMap<String, Value>,
        limit: i64,
        page: i64,
    ) -> Result<Value, AnalyticsError> {
        let upstream_name = format!("data.gov.in/{kind}");
        let offset = (page - 1) * limit;
        let mut params: Vec<(String, String)> = vec![
            ("api-key".to_string(), self.api_key.clone().unwrap_or_default()),
            ("format".to_string(), "json".to_string()),
            ("limit".to_string(), limit.to_string()),
            ("offset".to_string(), offset.to_string()),
        ];
        for (key, value) in filters {
            params.push((format!("filters[{key}]"), render_filter_value(key, value)));
        }

        let url = format!("{UPSTREAM_BASE}/{}", resource_id(kind));
        println!("Fetching insights from upstream: {kind} page={page} limit={limit}");
        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| AnalyticsError::SourceUnavailable {
                file: upstream_name.clone(),
                detail: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| AnalyticsError::SourceUnavailable {
                file: upstream_name.clone(),
                detail: e.to_string(),
            })?;

        let body: Value = response.json().await.map_err(|e| AnalyticsError::SourceUnavailable {
            file: upstream_name.clone(),
            detail: e.to_string(),
        })?;

        if body.get("status").and_then(Value::as_str) != Some("ok") {
            return Err(AnalyticsError::SourceUnavailable {
                file: upstream_name,
                detail: "upstream reported a non-ok status".to_string(),
            });
        }

        let fields: Vec<Value> = body
            .get("field")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(|f| f.get("id").cloned()).collect())
            .unwrap_or_default();

        let selection = kind.select_columns();
        let records: Vec<Value> = body
            .get("records")
            .and_then(Value::as_array)
            .map(|records| {
                records
                    .iter()
                    .map(|record| {
                        let mut filtered = serde_json::Map::new();
                        for column in &selection {
                            if let Some(value) = record.get(*column) {
                                filtered.insert((*column).to_string(), value.clone());
                            }
                        }
                        Value::Object(filtered)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({
            "meta": {
                "dataset": kind,
                "total": body.get("total").cloned().unwrap_or(Value::Null),
                "page": page,
                "limit": limit,
                "from_cache": false,
                "fields": fields,
                "source": "api",
            },
            "data": records,
        }))
    }
}
