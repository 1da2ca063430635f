//! Timeframe Views
//!
//! Hour: raw samples from the last hour. Day / week: samples from the last
//! 1 / 7 days averaged per hour / day bucket (integer mean, truncated),
//! ascending. Anything else: the most recent samples.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, DurationRound, Utc};

use super::types::TrafficSample;
use crate::constants::RECENT_SAMPLES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Hour,
    Day,
    Week,
    Recent,
}

impl Timeframe {
    /// Unknown names select `Recent`
    pub fn parse(s: &str) -> Self {
        match s {
            "hour" => Timeframe::Hour,
            "day" => Timeframe::Day,
            "week" => Timeframe::Week,
            _ => Timeframe::Recent,
        }
    }
}

pub fn select<'a, I>(samples: I, timeframe: Timeframe, now: DateTime<Utc>) -> Vec<TrafficSample>
where
    I: ExactSizeIterator<Item = &'a TrafficSample>,
{
    match timeframe {
        Timeframe::Hour => {
            let since = now - Duration::hours(1);
            samples.filter(|s| s.timestamp >= since).copied().collect()
        }
        Timeframe::Day => {
            let since = now - Duration::days(1);
            aggregate(samples.filter(|s| s.timestamp >= since), Duration::hours(1))
        }
        Timeframe::Week => {
            let since = now - Duration::days(7);
            aggregate(samples.filter(|s| s.timestamp >= since), Duration::days(1))
        }
        Timeframe::Recent => {
            let skip = samples.len().saturating_sub(RECENT_SAMPLES);
            samples.skip(skip).copied().collect()
        }
    }
}

/// Mean per truncated bucket; the bucket start becomes the timestamp
pub fn aggregate<'a, I>(samples: I, bucket: Duration) -> Vec<TrafficSample>
where
    I: Iterator<Item = &'a TrafficSample>,
{
    let mut buckets: BTreeMap<DateTime<Utc>, (u64, u64, u64)> = BTreeMap::new();

    for sample in samples {
        let key = sample.timestamp.duration_trunc(bucket).unwrap_or(sample.timestamp);
        let entry = buckets.entry(key).or_insert((0, 0, 0));
        entry.0 = entry.0.saturating_add(sample.incoming);
        entry.1 = entry.1.saturating_add(sample.outgoing);
        entry.2 += 1;
    }

    buckets
        .into_iter()
        .map(|(timestamp, (sum_in, sum_out, count))| {
            TrafficSample::new(timestamp, sum_in / count, sum_out / count)
        })
        .collect()
}
