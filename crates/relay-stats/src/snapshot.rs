//! Status snapshot model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Date window applied to the status scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    Today,
    Week,
    Month,
}

impl DateFilter {
    /// Label stored on the snapshot.
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFilter::Today => "today",
            DateFilter::Week => "week",
            DateFilter::Month => "month",
        }
    }

    /// Lower bound on `created_at` for the scan.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DateFilter::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc())
                .unwrap_or(now),
            DateFilter::Week => now - Duration::days(7),
            DateFilter::Month => now - Duration::days(30),
        }
    }
}

impl std::str::FromStr for DateFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "today" => Ok(DateFilter::Today),
            "week" => Ok(DateFilter::Week),
            "month" => Ok(DateFilter::Month),
            other => Err(format!("unknown date filter: {}", other)),
        }
    }
}

/// Aggregate counts per status value.
///
/// A full recomputation, not an incremental counter; it overwrites the
/// single current snapshot on each refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub total: u64,
    pub pending: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub done: u64,

    /// When the snapshot was recomputed.
    pub refreshed_at: Option<DateTime<Utc>>,

    /// Date window used for the scan, or "all".
    #[serde(default = "default_filter_label")]
    pub date_filter: String,
}

fn default_filter_label() -> String {
    "all".to_string()
}

impl StatusSnapshot {
    /// Count statuses into buckets. Unrecognized values fold into
    /// `pending`.
    pub fn tally<I, S>(statuses: I, filter: Option<DateFilter>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut snapshot = StatusSnapshot {
            date_filter: filter.map(|f| f.as_str().to_string()).unwrap_or_else(default_filter_label),
            ..Default::default()
        };

        for status in statuses {
            snapshot.total += 1;
            match status.as_ref().to_lowercase().as_str() {
                "accepted" => snapshot.accepted += 1,
                "rejected" => snapshot.rejected += 1,
                "done" => snapshot.done += 1,
                _ => snapshot.pending += 1,
            }
        }

        snapshot.refreshed_at = Some(Utc::now());
        snapshot
    }
}
