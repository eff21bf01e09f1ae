use crate::aggregate::{GapThreshold, DEFAULT_GAP_MINUTES};
use crate::compact::DEFAULT_SAMPLE_CAP;
use crate::error::ConfigError;
use crate::extract::{Extractor, TimestampKeys, DEFAULT_MAX_DEPTH};
use std::env;

// ── Environment keys ────────────────────────────────────────────────────

const GAP_MINUTES_VAR: &str = "HOURGLASS_GAP_MINUTES";
const TIMESTAMP_KEYS_VAR: &str = "HOURGLASS_TIMESTAMP_KEYS";
const SAMPLE_CAP_VAR: &str = "HOURGLASS_SAMPLE_CAP";
const MAX_DEPTH_VAR: &str = "HOURGLASS_MAX_DEPTH";

// ── Config struct ───────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct HourglassConfig {
    pub gap: GapThreshold,
    pub timestamp_keys: TimestampKeys,
    pub sample_cap: usize,
    pub max_depth: usize,
}

impl Default for HourglassConfig {
    fn default() -> Self {
        Self {
            gap: GapThreshold::default(),
            timestamp_keys: TimestampKeys::default(),
            sample_cap: DEFAULT_SAMPLE_CAP,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl HourglassConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unparseable numbers fall back to defaults; a non-positive gap or a
    /// zero sample cap is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gap_minutes = lookup_i64(&lookup, GAP_MINUTES_VAR, DEFAULT_GAP_MINUTES);
        let sample_cap = lookup_usize(&lookup, SAMPLE_CAP_VAR, DEFAULT_SAMPLE_CAP);
        if sample_cap == 0 {
            return Err(ConfigError::ZeroSampleCap);
        }
        let timestamp_keys = match lookup(TIMESTAMP_KEYS_VAR) {
            Some(raw) if !raw.trim().is_empty() => TimestampKeys::parse_list(&raw),
            _ => TimestampKeys::default(),
        };

        Ok(Self {
            gap: GapThreshold::from_minutes(gap_minutes)?,
            timestamp_keys,
            sample_cap,
            max_depth: lookup_usize(&lookup, MAX_DEPTH_VAR, DEFAULT_MAX_DEPTH),
        })
    }

    pub fn extractor(&self) -> Extractor {
        Extractor::new(self.timestamp_keys.clone()).with_max_depth(self.max_depth)
    }
}

fn lookup_i64<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: i64) -> i64 {
    match lookup(key) {
        Some(val) => val.trim().parse::<i64>().unwrap_or(default),
        None => default,
    }
}

fn lookup_usize<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: usize) -> usize {
    match lookup(key) {
        Some(val) => val.trim().parse::<usize>().unwrap_or(default),
        None => default,
    }
}
