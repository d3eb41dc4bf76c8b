//! Dataset kinds and their fixed CSV schemas.
//!
//! Every extract shares `date`, `state`, `district`, `pincode`; the numeric
//! columns and the age-band labels differ per kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Enrolment,
    Biometric,
    Demographic,
}

/// One age band: the label used in the output maps and the CSV column the
/// count comes from.
pub struct AgeBand {
    pub label: &'static str,
    pub column: &'static str,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::Enrolment,
        DatasetKind::Biometric,
        DatasetKind::Demographic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Enrolment => "enrolment",
            DatasetKind::Biometric => "biometric",
            DatasetKind::Demographic => "demographic",
        }
    }

    pub fn age_bands(&self) -> &'static [AgeBand] {
        match self {
            DatasetKind::Enrolment => &[
                AgeBand { label: "0-5", column: "age_0_5" },
                AgeBand { label: "5-17", column: "age_5_17" },
                AgeBand { label: "18+", column: "age_18_greater" },
            ],
            DatasetKind::Biometric => &[
                AgeBand { label: "5-17", column: "bio_age_5_17" },
                AgeBand { label: "18+", column: "bio_age_17_" },
            ],
            DatasetKind::Demographic => &[
                AgeBand { label: "5-17", column: "demo_age_5_17" },
                AgeBand { label: "18+", column: "demo_age_17_" },
            ],
        }
    }

    /// Column set exposed to the raw-record insights proxy.
    pub fn select_columns(&self) -> Vec<&'static str> {
        let mut cols = vec!["date", "state", "district", "pincode"];
        cols.extend(self.age_bands().iter().map(|band| band.column));
        cols
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enrolment" => Ok(DatasetKind::Enrolment),
            "biometric" => Ok(DatasetKind::Biometric),
            "demographic" => Ok(DatasetKind::Demographic),
            other => Err(AnalyticsError::InvalidDataset(other.to_string())),
        }
    }
}

/// Coerce a raw count cell to an integer. Malformed, missing and non-finite
/// values become 0 rather than failing the row; fractional values truncate
/// toward zero. Under-counting silently is the compatibility contract here.
pub fn coerce_count(raw: &str) -> i64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v as i64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_only_served_labels() {
        assert_eq!("enrolment".parse::<DatasetKind>().unwrap(), DatasetKind::Enrolment);
        assert_eq!("biometric".parse::<DatasetKind>().unwrap(), DatasetKind::Biometric);
        assert_eq!("demographic".parse::<DatasetKind>().unwrap(), DatasetKind::Demographic);
        // The analytics surface never accepted the double-l spelling.
        assert!("enrollment".parse::<DatasetKind>().is_err());
        assert!("master".parse::<DatasetKind>().is_err());
    }

    #[test]
    fn age_band_labels_per_kind() {
        let labels: Vec<_> = DatasetKind::Enrolment.age_bands().iter().map(|b| b.label).collect();
        assert_eq!(labels, ["0-5", "5-17", "18+"]);
        let labels: Vec<_> = DatasetKind::Biometric.age_bands().iter().map(|b| b.label).collect();
        assert_eq!(labels, ["5-17", "18+"]);
        let labels: Vec<_> = DatasetKind::Demographic.age_bands().iter().map(|b| b.label).collect();
        assert_eq!(labels, ["5-17", "18+"]);
    }

    #[test]
    fn malformed_counts_become_zero() {
        assert_eq!(coerce_count("100"), 100);
        assert_eq!(coerce_count(" 42 "), 42);
        assert_eq!(coerce_count("12.0"), 12);
        assert_eq!(coerce_count("12.9"), 12);
        assert_eq!(coerce_count("-3"), -3);
        assert_eq!(coerce_count(""), 0);
        assert_eq!(coerce_count("n/a"), 0);
        assert_eq!(coerce_count("nan"), 0);
        assert_eq!(coerce_count("inf"), 0);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&DatasetKind::Enrolment).unwrap(), "\"enrolment\"");
    }
}
