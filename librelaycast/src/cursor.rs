//! Time cursor for one run
//!
//! The cursor is handed in by whoever starts the run (usually a scheduler that
//! stored the previous run's output) and printed again when a one-shot run
//! finishes. It is never written to the ledger.
//!
//! Two values are tracked: the `baseline` the run was started with, which
//! filters posts for every tick, and the `latest` watermark, which only moves
//! forward as posts are delivered.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{RelaycastError, Result};

/// Format used on the command line and in the one-shot output line
pub const CURSOR_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Emitted when no cursor was ever known
pub const DEFAULT_CURSOR: &str = "2000-01-01 12:00:00";

/// Key of the machine-readable line printed at the end of a one-shot run
pub const OUTPUT_KEY: &str = "LAST_SYNCED_POST_TIME";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeCursor {
    baseline: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
}

impl TimeCursor {
    pub fn new(baseline: Option<DateTime<Utc>>) -> Self {
        Self {
            baseline,
            latest: baseline,
        }
    }

    /// Parse a `YYYY-MM-DD HH:MM:SS` timestamp, interpreted as UTC
    pub fn parse(input: &str) -> Result<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(input.trim(), CURSOR_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| {
                RelaycastError::InvalidInput(format!(
                    "Invalid datetime '{}': {}. Please use YYYY-MM-DD HH:MM:SS",
                    input, e
                ))
            })
    }

    pub fn format(timestamp: &DateTime<Utc>) -> String {
        timestamp.format(CURSOR_FORMAT).to_string()
    }

    /// True when a post with this timestamp was already handled by a prior run
    pub fn covers(&self, timestamp: &DateTime<Utc>) -> bool {
        self.baseline.is_some_and(|baseline| *timestamp <= baseline)
    }

    /// Move the watermark forward; older or equal timestamps are ignored
    pub fn advance(&mut self, timestamp: DateTime<Utc>) -> bool {
        if self.latest.is_none_or(|latest| timestamp > latest) {
            self.latest = Some(timestamp);
            true
        } else {
            false
        }
    }

    pub fn baseline(&self) -> Option<DateTime<Utc>> {
        self.baseline
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.latest
    }

    /// Value to hand to the next run
    pub fn emit(&self) -> String {
        self.latest
            .as_ref()
            .map(Self::format)
            .unwrap_or_else(|| DEFAULT_CURSOR.to_string())
    }

    /// The full `LAST_SYNCED_POST_TIME=...` output line
    pub fn output_line(&self) -> String {
        format!("{}={}", OUTPUT_KEY, self.emit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_parse_valid() {
        let parsed = TimeCursor::parse("2025-03-01 08:30:15").unwrap();
        assert_eq!(parsed, at(8, 30, 15));
    }

    #[test]
    fn test_parse_invalid() {
        for input in ["2025-03-01", "2025-03-01T08:30:15", "yesterday", "2025-13-01 00:00:00"] {
            let result = TimeCursor::parse(input);
            assert!(
                matches!(result, Err(RelaycastError::InvalidInput(_))),
                "expected InvalidInput for {input}"
            );
        }
    }

    #[test]
    fn test_unset_cursor_covers_nothing() {
        let cursor = TimeCursor::new(None);
        assert!(!cursor.covers(&at(0, 0, 0)));
        assert_eq!(cursor.emit(), DEFAULT_CURSOR);
    }

    #[test]
    fn test_covers_is_inclusive() {
        let t = at(12, 0, 0);
        let cursor = TimeCursor::new(Some(t));
        assert!(cursor.covers(&(t - Duration::seconds(1))));
        assert!(cursor.covers(&t));
        assert!(!cursor.covers(&(t + Duration::seconds(1))));
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut cursor = TimeCursor::new(Some(at(12, 0, 0)));

        assert!(cursor.advance(at(12, 0, 2)));
        assert!(!cursor.advance(at(12, 0, 1)));
        assert!(!cursor.advance(at(12, 0, 2)));
        assert_eq!(cursor.latest(), Some(at(12, 0, 2)));

        // Baseline stays put for filtering
        assert_eq!(cursor.baseline(), Some(at(12, 0, 0)));
        assert!(!cursor.covers(&at(12, 0, 1)));
    }

    #[test]
    fn test_emit_falls_back_to_baseline() {
        let cursor = TimeCursor::new(Some(at(9, 5, 0)));
        assert_eq!(cursor.emit(), "2025-03-01 09:05:00");
    }

    #[test]
    fn test_output_line() {
        let mut cursor = TimeCursor::new(None);
        cursor.advance(at(23, 59, 59));
        assert_eq!(cursor.output_line(), "LAST_SYNCED_POST_TIME=2025-03-01 23:59:59");
    }

    #[test]
    fn test_format_drops_subseconds() {
        let t = at(1, 2, 3) + Duration::milliseconds(750);
        assert_eq!(TimeCursor::format(&t), "2025-03-01 01:02:03");
    }
}
