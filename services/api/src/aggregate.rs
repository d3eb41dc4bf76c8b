//! Chunked CSV reduction into the pre-aggregated analytics shape.
//!
//! The reducer never loads a whole extract into memory: rows are folded in
//! bounded chunks and every fold is a commutative merge-add, so the chunking
//! (and therefore the chunk size) cannot change the result.

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::dataset::{coerce_count, DatasetKind};
use crate::error::AnalyticsError;
use crate::geo::GeoTables;

/// Default number of raw rows folded per chunk.
pub const DEFAULT_CHUNK_ROWS: usize = 50_000;

/// Per-state slice of the breakdown maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBreakdown {
    pub by_age_group: BTreeMap<String, i64>,
    pub by_month: BTreeMap<String, i64>,
}

/// The accumulator and the final output of a reduction.
///
/// Invariants: `total_updates` equals the sum of `by_state` values and the
/// sum of `by_age_group` values; rows with an unparsable month are excluded
/// from `by_month` only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub total_updates: i64,
    pub by_state: BTreeMap<String, i64>,
    pub by_age_group: BTreeMap<String, i64>,
    pub by_month: BTreeMap<String, i64>,
    pub by_district: BTreeMap<String, BTreeMap<String, i64>>,
    pub state_breakdown: BTreeMap<String, StateBreakdown>,
}

impl AggregateResult {
    /// Fold one row in. A zero total still creates the state and district
    /// entries; the age-band labels of the dataset always appear once any
    /// row lands.
    fn add_row<'a>(
        &mut self,
        state: &str,
        district: &str,
        month: Option<&str>,
        total: i64,
        bands: impl Iterator<Item = (&'a str, i64)>,
    ) {
        self.total_updates += total;
        *self.by_state.entry(state.to_string()).or_default() += total;

        *self
            .by_district
            .entry(state.to_string())
            .or_default()
            .entry(district.to_string())
            .or_default() += total;

        let breakdown = self.state_breakdown.entry(state.to_string()).or_default();
        for (label, count) in bands {
            *self.by_age_group.entry(label.to_string()).or_default() += count;
            *breakdown.by_age_group.entry(label.to_string()).or_default() += count;
        }
        if let Some(month) = month {
            *self.by_month.entry(month.to_string()).or_default() += total;
            *breakdown.by_month.entry(month.to_string()).or_default() += total;
        }
    }

    /// Merge-add another accumulator. Never overwrites, always accumulates.
    fn merge(&mut self, other: AggregateResult) {
        self.total_updates += other.total_updates;
        for (k, v) in other.by_state {
            *self.by_state.entry(k).or_default() += v;
        }
        for (k, v) in other.by_age_group {
            *self.by_age_group.entry(k).or_default() += v;
        }
        for (k, v) in other.by_month {
            *self.by_month.entry(k).or_default() += v;
        }
        for (state, districts) in other.by_district {
            let target = self.by_district.entry(state).or_default();
            for (district, v) in districts {
                *target.entry(district).or_default() += v;
            }
        }
        for (state, breakdown) in other.state_breakdown {
            let target = self.state_breakdown.entry(state).or_default();
            for (k, v) in breakdown.by_age_group {
                *target.by_age_group.entry(k).or_default() += v;
            }
            for (k, v) in breakdown.by_month {
                *target.by_month.entry(k).or_default() += v;
            }
        }
    }
}

/// Positions of the columns the reduction reads, resolved from the header
/// row once per source.
struct ColumnLayout {
    date: usize,
    state: usize,
    district: usize,
    pincode: usize,
    /// (column index, age-band label) in dataset order.
    bands: Vec<(usize, &'static str)>,
}

impl ColumnLayout {
    fn locate(headers: &csv::StringRecord, kind: DatasetKind) -> Result<Self, AnalyticsError> {
        let find = |name: &str| -> Result<usize, AnalyticsError> {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| AnalyticsError::MalformedSource {
                    detail: format!("missing required column '{name}'"),
                })
        };
        let mut bands = Vec::with_capacity(kind.age_bands().len());
        for band in kind.age_bands() {
            bands.push((find(band.column)?, band.label));
        }
        Ok(Self {
            date: find("date")?,
            state: find("state")?,
            district: find("district")?,
            pincode: find("pincode")?,
            bands,
        })
    }
}

/// Month is the middle token of a three-part date split on `-` or `/`.
/// Anything else is unparsable and excluded from the month maps only.
fn extract_month(date: &str) -> Option<&str> {
    let parts: Vec<&str> = if date.contains('-') {
        date.split('-').collect()
    } else if date.contains('/') {
        date.split('/').collect()
    } else {
        return None;
    };
    if parts.len() == 3 {
        Some(parts[1])
    } else {
        None
    }
}

/// Stream `input` as CSV and fold it into an [`AggregateResult`] in chunks
/// of `chunk_rows` raw rows.
///
/// Structural problems (unreadable header, missing schema columns, ragged
/// records) abort the whole reduction; value-level problems never do.
pub fn reduce_csv<R: Read>(
    input: R,
    kind: DatasetKind,
    tables: &GeoTables,
    chunk_rows: usize,
) -> Result<AggregateResult, AnalyticsError> {
    let chunk_rows = chunk_rows.max(1);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AnalyticsError::MalformedSource { detail: e.to_string() })?
        .clone();
    let layout = ColumnLayout::locate(&headers, kind)?;

    let mut result = AggregateResult::default();
    let mut chunk = AggregateResult::default();
    let mut rows_in_chunk = 0usize;
    let mut band_counts = [0i64; 3];

    for record in reader.records() {
        let record = record.map_err(|e| AnalyticsError::MalformedSource { detail: e.to_string() })?;

        rows_in_chunk += 1;
        if rows_in_chunk > chunk_rows {
            result.merge(std::mem::take(&mut chunk));
            rows_in_chunk = 1;
        }

        let raw_state = record.get(layout.state).unwrap_or("");
        let pincode = record.get(layout.pincode);
        let Some(state) = tables.normalize_state(raw_state, pincode) else {
            // Unresolvable geography: the row is dropped entirely, not
            // counted as zero.
            continue;
        };

        let district = tables.normalize_district(record.get(layout.district).unwrap_or(""));
        let month = extract_month(record.get(layout.date).unwrap_or(""));

        let mut total = 0i64;
        for (i, (idx, _)) in layout.bands.iter().enumerate() {
            let count = coerce_count(record.get(*idx).unwrap_or(""));
            band_counts[i] = count;
            total += count;
        }

        chunk.add_row(
            state,
            &district,
            month,
            total,
            layout
                .bands
                .iter()
                .enumerate()
                .map(|(i, (_, label))| (*label, band_counts[i])),
        );
    }

    result.merge(chunk);
    Ok(result)
}
