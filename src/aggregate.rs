use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::upstream::client::WindowData;

/// One period of an aggregated series. `value` is `None` when no sample
/// was observed for the period, which is a valid outcome distinct from a
/// true zero reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

#[derive(Default)]
struct Bucket {
    sum: f64,
    count: u64,
}

impl Bucket {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Reduce raw window results into a dense daily series.
///
/// Samples fold into hour buckets first; hourly *averages* then fold into
/// calendar-day buckets, so a day with sparse hourly coverage is not
/// biased toward hours that happened to carry more raw samples. The
/// output always holds exactly `span_days` points, oldest first, one per
/// calendar day ending at `now`'s date, with `None` marking days that saw
/// no data.
pub fn reduce_daily(
    chunks: &[WindowData],
    span_days: i64,
    now: DateTime<Utc>,
) -> Vec<SeriesPoint> {
    let hours = hour_buckets(chunks);

    let mut days: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
    for (hour_start, bucket) in &hours {
        if let Some(mean) = bucket.mean() {
            days.entry(hour_start.date_naive()).or_default().push(mean);
        }
    }

    let today = now.date_naive();
    (0..span_days.max(0))
        .filter_map(|offset| {
            let date = today - Duration::days(span_days - 1 - offset);
            let start = date.and_hms_opt(0, 0, 0)?;
            Some(SeriesPoint {
                timestamp: Utc.from_utc_datetime(&start),
                value: days.get(&date).and_then(|b| b.mean()).map(round4),
            })
        })
        .collect()
}

/// Reduce raw window results into a sparse hourly series.
///
/// Unlike the daily series this emits only hours that saw data, oldest
/// first; consumers treat it as a sparse series, not a fixed-length one.
pub fn reduce_hourly(chunks: &[WindowData]) -> Vec<SeriesPoint> {
    hour_buckets(chunks)
        .into_iter()
        .filter_map(|(hour_start, bucket)| {
            bucket.mean().map(|mean| SeriesPoint {
                timestamp: hour_start,
                value: Some(round4(mean)),
            })
        })
        .collect()
}

/// Stage one: parse and fold samples into hour buckets.
///
/// Malformed pairs (unparsable timestamp, non-numeric or non-finite
/// value) are dropped without aborting the reduction, and duplicate
/// timestamps across chunks contribute once.
fn hour_buckets(chunks: &[WindowData]) -> BTreeMap<DateTime<Utc>, Bucket> {
    let mut seen: HashSet<DateTime<Utc>> = HashSet::new();
    let mut buckets: BTreeMap<DateTime<Utc>, Bucket> = BTreeMap::new();

    for chunk in chunks {
        for (raw_ts, raw_value) in chunk.time.iter().zip(chunk.value.iter()) {
            let Ok(ts) = DateTime::parse_from_rfc3339(raw_ts) else {
                continue;
            };
            let Ok(value) = raw_value.parse::<f64>() else {
                continue;
            };
            if !value.is_finite() {
                continue;
            }

            let ts = ts.with_timezone(&Utc);
            if !seen.insert(ts) {
                continue;
            }

            buckets.entry(truncate_to_hour(ts)).or_default().push(value);
        }
    }

    buckets
}

fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(3600), 0).unwrap_or(ts)
}

pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(pairs: &[(&str, &str)]) -> WindowData {
        WindowData {
            time: pairs.iter().map(|(t, _)| t.to_string()).collect(),
            value: pairs.iter().map(|(_, v)| v.to_string()).collect(),
        }
    }

    #[test]
    fn hour_buckets_average_within_the_hour() {
        let data = chunk(&[
            ("2025-03-10T08:05:00.000Z", "10.0"),
            ("2025-03-10T08:35:00.000Z", "20.0"),
            ("2025-03-10T09:10:00.000Z", "30.0"),
        ]);

        let points = reduce_hourly(&[data]);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, Some(15.0));
        assert_eq!(points[1].value, Some(30.0));
        assert!(points[0].timestamp < points[1].timestamp);
    }

    #[test]
    fn malformed_pairs_are_dropped_silently() {
        let data = chunk(&[
            ("not-a-timestamp", "10.0"),
            ("2025-03-10T08:05:00.000Z", "not-a-number"),
            ("2025-03-10T08:05:00.000Z", "NaN"),
            ("2025-03-10T08:10:00.000Z", "12.0"),
        ]);

        let points = reduce_hourly(&[data]);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, Some(12.0));
    }

    #[test]
    fn duplicate_timestamps_across_chunks_count_once() {
        let a = chunk(&[("2025-03-10T08:05:00.000Z", "10.0")]);
        let b = chunk(&[
            ("2025-03-10T08:05:00.000Z", "10.0"),
            ("2025-03-10T08:35:00.000Z", "30.0"),
        ]);

        let points = reduce_hourly(&[a, b]);
        assert_eq!(points.len(), 1);
        // (10 + 30) / 2, not (10 + 10 + 30) / 3.
        assert_eq!(points[0].value, Some(20.0));
    }

    #[test]
    fn daily_series_is_dense_and_oldest_first() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let data = chunk(&[("2025-03-09T08:00:00.000Z", "18.0")]);

        let points = reduce_daily(&[data], 3, now);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].value, None);
        assert_eq!(points[1].value, Some(18.0));
        assert_eq!(points[2].value, None);
        assert!(points.windows(2).all(|p| p[0].timestamp < p[1].timestamp));
        assert_eq!(points[2].timestamp.date_naive(), now.date_naive());
    }

    #[test]
    fn daily_averages_hourly_means_not_raw_samples() {
        // Hour one carries three samples of 10, hour two a single 40.
        // Averaging raw samples would give 17.5; averaging hourly means
        // must give 25.
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let data = chunk(&[
            ("2025-03-10T08:00:00.000Z", "10.0"),
            ("2025-03-10T08:20:00.000Z", "10.0"),
            ("2025-03-10T08:40:00.000Z", "10.0"),
            ("2025-03-10T09:00:00.000Z", "40.0"),
        ]);

        let points = reduce_daily(&[data], 1, now);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, Some(25.0));
    }

    #[test]
    fn values_round_to_four_decimals() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let data = chunk(&[
            ("2025-03-10T08:00:00.000Z", "10.0"),
            ("2025-03-10T08:30:00.000Z", "10.00005"),
        ]);

        let points = reduce_daily(&[data], 1, now);
        assert_eq!(points[0].value, Some(10.0));
    }
}
