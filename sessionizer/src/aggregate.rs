use crate::error::ConfigError;
use crate::types::{InstantSet, SessionSpan, SessionSummary};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

pub const DEFAULT_GAP_MINUTES: i64 = 30;

/// Every session counts for at least this long.
pub const MIN_SESSION_MS: i64 = 60_000;

/// Idle time between consecutive events that ends a session. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapThreshold(TimeDelta);

impl GapThreshold {
    pub fn new(gap: TimeDelta) -> Result<Self, ConfigError> {
        // Sessions are split on whole milliseconds, so sub-ms gaps count as zero.
        let millis = gap.num_milliseconds();
        if millis <= 0 {
            return Err(ConfigError::NonPositiveGap { millis });
        }
        Ok(Self(gap))
    }

    pub fn from_minutes(minutes: i64) -> Result<Self, ConfigError> {
        let gap = TimeDelta::try_minutes(minutes).ok_or(ConfigError::GapOutOfRange { minutes })?;
        Self::new(gap)
    }

    pub fn duration(&self) -> TimeDelta {
        self.0
    }

    pub fn as_millis(&self) -> i64 {
        self.0.num_milliseconds()
    }

    pub fn as_minutes_f64(&self) -> f64 {
        self.as_millis() as f64 / 60_000.0
    }
}

impl Default for GapThreshold {
    fn default() -> Self {
        Self(TimeDelta::minutes(DEFAULT_GAP_MINUTES))
    }
}

/// Lazily splits an [`InstantSet`] into sessions, in order.
pub struct Sessions<'a> {
    instants: std::slice::Iter<'a, DateTime<Utc>>,
    gap_ms: i64,
    pending: Option<DateTime<Utc>>,
}

impl Iterator for Sessions<'_> {
    type Item = SessionSpan;

    fn next(&mut self) -> Option<SessionSpan> {
        let start = self.pending.take().or_else(|| self.instants.next().copied())?;
        let mut previous = start;
        let mut event_count = 1;

        for &t in self.instants.by_ref() {
            // A gap exactly at the threshold closes the session.
            if (t - previous).num_milliseconds() >= self.gap_ms {
                self.pending = Some(t);
                break;
            }
            previous = t;
            event_count += 1;
        }

        Some(SessionSpan {
            start,
            end: previous,
            event_count,
            duration_ms: (previous - start).num_milliseconds().max(MIN_SESSION_MS),
        })
    }
}

pub fn sessions(instants: &InstantSet, gap: GapThreshold) -> Sessions<'_> {
    Sessions {
        instants: instants.iter(),
        gap_ms: gap.as_millis(),
        pending: None,
    }
}

pub fn aggregate(instants: &InstantSet, gap: GapThreshold) -> SessionSummary {
    let (session_count, total_duration_ms) = sessions(instants, gap)
        .fold((0usize, 0i64), |(count, total), span| {
            (count + 1, total + span.duration_ms)
        });

    debug!(
        events = instants.len(),
        sessions = session_count,
        total_ms = total_duration_ms,
        "aggregated sessions"
    );

    SessionSummary {
        total_duration_ms,
        session_count,
        event_count: instants.len(),
        first_event: instants.first(),
        last_event: instants.last(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn set(times: &[(u32, u32)]) -> InstantSet {
        times.iter().map(|&(h, m)| at(h, m)).collect()
    }

    #[test]
    fn isolated_event_gets_the_floor() {
        let instants = set(&[(10, 0), (10, 5), (11, 0)]);
        let summary = aggregate(&instants, GapThreshold::default());
        assert_eq!(summary.session_count, 2);
        assert_eq!(summary.total_duration(), TimeDelta::minutes(6));
        assert_eq!(summary.event_count, 3);
        assert_eq!(summary.first_event, Some(at(10, 0)));
        assert_eq!(summary.last_event, Some(at(11, 0)));

        let spans: Vec<_> = sessions(&instants, GapThreshold::default()).collect();
        assert_eq!(spans[0].end, at(10, 5));
        assert_eq!(spans[0].event_count, 2);
        assert_eq!(spans[1].start, at(11, 0));
        assert_eq!(spans[1].duration_ms, MIN_SESSION_MS);
    }

    #[test]
    fn steady_activity_is_one_session() {
        let instants = set(&[(10, 0), (10, 10), (10, 20), (10, 30)]);
        let summary = aggregate(&instants, GapThreshold::default());
        assert_eq!(summary.session_count, 1);
        assert_eq!(summary.total_duration(), TimeDelta::minutes(30));
    }

    #[test]
    fn gap_equal_to_threshold_splits() {
        let instants = set(&[(10, 0), (10, 30)]);
        let summary = aggregate(&instants, GapThreshold::default());
        assert_eq!(summary.session_count, 2);
        assert_eq!(summary.total_duration(), TimeDelta::minutes(2));

        let just_under = set(&[(10, 0)])
            .iter()
            .copied()
            .chain([at(10, 30) - TimeDelta::milliseconds(1)])
            .collect::<InstantSet>();
        assert_eq!(aggregate(&just_under, GapThreshold::default()).session_count, 1);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let summary = aggregate(&InstantSet::default(), GapThreshold::default());
        assert_eq!(summary, SessionSummary::default());
        assert_eq!(summary.first_event, None);
        assert_eq!(sessions(&InstantSet::default(), GapThreshold::default()).count(), 0);
    }

    #[test]
    fn boundaries_follow_the_threshold() {
        let instants = set(&[(9, 0), (9, 10), (9, 55), (10, 0), (10, 14), (11, 0)]);
        let gap = GapThreshold::from_minutes(15).unwrap();
        let spans: Vec<_> = sessions(&instants, gap).collect();

        for pair in instants.as_slice().windows(2) {
            let splits = pair[1] - pair[0] >= gap.duration();
            let starts_span = spans.iter().any(|s| s.start == pair[1]);
            assert_eq!(splits, starts_span, "pair {:?}", pair);
        }
        assert_eq!(spans.len(), 3);
        assert!(spans.iter().all(|s| s.duration_ms >= MIN_SESSION_MS));
        assert_eq!(
            spans.iter().map(|s| s.event_count).sum::<usize>(),
            instants.len()
        );

        let summary = aggregate(&instants, gap);
        assert_eq!(summary.session_count, spans.len());
        assert_eq!(
            summary.total_duration_ms,
            spans.iter().map(|s| s.duration_ms).sum::<i64>()
        );
    }

    #[test]
    fn non_positive_gaps_are_rejected() {
        assert_eq!(
            GapThreshold::from_minutes(0),
            Err(ConfigError::NonPositiveGap { millis: 0 })
        );
        assert_eq!(
            GapThreshold::new(TimeDelta::seconds(-5)),
            Err(ConfigError::NonPositiveGap { millis: -5000 })
        );
        assert_eq!(
            GapThreshold::new(TimeDelta::microseconds(500)),
            Err(ConfigError::NonPositiveGap { millis: 0 })
        );
        assert!(GapThreshold::new(TimeDelta::milliseconds(1)).is_ok());
        assert_eq!(
            GapThreshold::from_minutes(i64::MAX),
            Err(ConfigError::GapOutOfRange { minutes: i64::MAX })
        );
        assert!(GapThreshold::new(TimeDelta::seconds(90)).is_ok());
    }
}
