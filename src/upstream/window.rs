use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};

/// One upstream request's time range: `duration_hours` ending at `end`.
///
/// Windows are half-open `(end - duration, end]`, so a plan never covers
/// the same instant twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub end: DateTime<Utc>,
    pub duration_hours: i64,
}

/// Partition a lookback span into fetch windows stepping back from `now`.
///
/// Produces `ceil(span_days / chunk_days)` windows, newest first, each
/// ending `chunk_days` earlier than the previous. Deterministic for a
/// fixed `now`.
pub fn plan(span_days: i64, chunk_days: i64, now: DateTime<Utc>) -> Result<Vec<FetchWindow>> {
    if span_days <= 0 {
        bail!("span_days must be positive, got {span_days}");
    }
    if chunk_days <= 0 {
        bail!("chunk_days must be positive, got {chunk_days}");
    }

    let count = (span_days + chunk_days - 1) / chunk_days;
    let windows = (0..count)
        .map(|i| FetchWindow {
            end: now - Duration::days(i * chunk_days),
            duration_hours: chunk_days * 24,
        })
        .collect();
    Ok(windows)
}
