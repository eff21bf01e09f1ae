use crate::parse::{canonical, canonical_string};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Distinct instants in ascending order.
///
/// Every constructor sorts and deduplicates, so a value of this type always
/// satisfies what the aggregator expects of its input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstantSet(Vec<DateTime<Utc>>);

impl InstantSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<DateTime<Utc>> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.0.last().copied()
    }

    pub fn as_slice(&self) -> &[DateTime<Utc>] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DateTime<Utc>> {
        self.0.iter()
    }
}

impl From<BTreeSet<DateTime<Utc>>> for InstantSet {
    fn from(set: BTreeSet<DateTime<Utc>>) -> Self {
        set.into_iter().collect()
    }
}

impl FromIterator<DateTime<Utc>> for InstantSet {
    fn from_iter<I: IntoIterator<Item = DateTime<Utc>>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(canonical)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a InstantSet {
    type Item = &'a DateTime<Utc>;
    type IntoIter = std::slice::Iter<'a, DateTime<Utc>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One run of instants with no idle gap at or above the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub event_count: usize,
    /// Span length with the one-minute floor already applied.
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub total_duration_ms: i64,
    pub session_count: usize,
    pub event_count: usize,
    pub first_event: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
}

impl SessionSummary {
    pub fn total_duration(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.total_duration_ms)
    }

    pub fn total_hours(&self) -> f64 {
        self.total_duration_ms as f64 / MILLIS_PER_HOUR
    }

    pub fn to_report(&self) -> HoursReport {
        HoursReport {
            total_hours: self.total_hours(),
            session_count: self.session_count,
            event_count: self.event_count,
            first_timestamp: self.first_event.as_ref().map(canonical_string),
            last_timestamp: self.last_event.as_ref().map(canonical_string),
        }
    }
}

/// Wire shape of a summary. The delegated estimate is asked to answer in
/// this shape too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoursReport {
    pub total_hours: f64,
    pub session_count: usize,
    pub event_count: usize,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
}
