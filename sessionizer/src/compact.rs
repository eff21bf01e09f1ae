use crate::aggregate::GapThreshold;
use crate::error::ConfigError;
use crate::parse::canonical_string;
use crate::types::InstantSet;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLE_CAP: usize = 1000;

/// Capped, serializable view of an [`InstantSet`] for delegated estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactTimeline {
    pub timestamps: Vec<String>,
    pub gap_minutes: f64,
    pub total_events: usize,
    pub truncated: bool,
}

/// Keeps the earliest `cap` instants.
pub fn compact(
    instants: &InstantSet,
    gap: GapThreshold,
    cap: usize,
) -> Result<CompactTimeline, ConfigError> {
    if cap == 0 {
        return Err(ConfigError::ZeroSampleCap);
    }
    Ok(CompactTimeline {
        timestamps: instants.iter().take(cap).map(canonical_string).collect(),
        gap_minutes: gap.as_minutes_f64(),
        total_events: instants.len(),
        truncated: instants.len() > cap,
    })
}
