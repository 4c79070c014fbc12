use chrono::{DateTime, Datelike, Months, NaiveTime, Utc};
use serde::Serialize;

/// Half-open calendar month `[start, end)` in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub oldest: DateTime<Utc>,
    pub newest: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPlan {
    /// Range after clamping `oldest` to the lookback window.
    pub range: DateRange,
    pub buckets: Vec<TimeBucket>,
}

fn month_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    let date = ts.date_naive();
    date.with_day(1)
        .unwrap_or(date)
        .and_time(NaiveTime::MIN)
        .and_utc()
}

fn next_month(start: DateTime<Utc>) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn bucket_label(start: DateTime<Utc>) -> String {
    start.format("%Y-%b").to_string().to_ascii_lowercase()
}

/// Monthly buckets from the month of the clamped oldest date through the
/// month of `newest`. Pure: identical inputs give identical plans.
pub fn plan_buckets(
    oldest: DateTime<Utc>,
    newest: DateTime<Utc>,
    lookback_months: u32,
) -> BucketPlan {
    let cutoff = newest
        .checked_sub_months(Months::new(lookback_months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut effective_oldest = oldest.min(newest);
    if effective_oldest < cutoff {
        effective_oldest = cutoff;
    }

    let limit = next_month(month_start(newest));
    let mut buckets = Vec::new();
    let mut start = month_start(effective_oldest);
    while start < limit {
        let end = next_month(start);
        if end > limit {
            break;
        }
        buckets.push(TimeBucket {
            start,
            end,
            label: bucket_label(start),
        });
        start = end;
    }

    BucketPlan {
        range: DateRange {
            oldest: effective_oldest,
            newest,
        },
        buckets,
    }
}
