//! Time-series rebucketing — regroups a day-granularity series into
//! week- or month-granularity buckets for charting. Independent of the
//! funnel logic; presentation layers call it directly.

use chrono::{Datelike, Days, NaiveDate};
use funnel_core::error::{FunnelError, FunnelResult};
use funnel_core::types::{Event, EventType, Granularity, TimeSeriesPoint};
use std::collections::BTreeMap;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Regroup `points` into `granularity`-sized buckets, summing values,
/// sorted ascending by bucket start. Pure: same input, same output.
/// Re-applying to coarser granularities (day→week→month) preserves the
/// total sum.
pub fn rebucket(
    points: &[TimeSeriesPoint],
    granularity: Granularity,
) -> FunnelResult<Vec<TimeSeriesPoint>> {
    let mut buckets: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for point in points {
        let date = NaiveDate::parse_from_str(&point.date_key, DATE_FORMAT).map_err(|e| {
            FunnelError::InvalidInput(format!("bad date key '{}': {e}", point.date_key))
        })?;
        *buckets.entry(bucket_start(date, granularity)).or_default() += point.value;
    }

    Ok(buckets
        .into_iter()
        .map(|(date, value)| TimeSeriesPoint {
            date_key: date.format(DATE_FORMAT).to_string(),
            value,
        })
        .collect())
}

/// Bucket key: the date itself, the Monday on/before it (weeks start
/// Monday, not Sunday), or the first day of its month.
fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => date,
        Granularity::Week => {
            let back = u64::from(date.weekday().num_days_from_monday());
            date.checked_sub_days(Days::new(back)).unwrap_or(date)
        }
        Granularity::Month => date.with_day(1).unwrap_or(date),
    }
}

/// Build a day-granularity series from raw events, counting events of one
/// type per calendar day. Feeds `rebucket` for the report's chart.
pub fn daily_event_series(events: &[Event], event_type: EventType) -> Vec<TimeSeriesPoint> {
    let mut days: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for event in events {
        if event.event_type == event_type {
            *days.entry(event.occurred_at.date_naive()).or_default() += 1;
        }
    }
    days.into_iter()
        .map(|(date, value)| TimeSeriesPoint {
            date_key: date.format(DATE_FORMAT).to_string(),
            value,
        })
        .collect()
}
