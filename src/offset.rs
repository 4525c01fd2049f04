//! Normalizes source timestamps into an [`Offset`] from a captured "now".
//!
//! MTA Bus Time reports a wall-clock time of day; the subway feed reports
//! epoch seconds. Both end up as minutes and seconds until arrival, split by
//! one of the two [`Rounding`] strategies.

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};

/// Time remaining until an arrival.
///
/// Ordering is lexicographic on `(minutes, seconds)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset {
    pub minutes: i64,
    pub seconds: i64,
}

impl Offset {
    pub fn new(minutes: i64, seconds: i64) -> Self {
        Self { minutes, seconds }
    }

    /// True when either component is negative. Such offsets are never shown.
    pub fn is_past(&self) -> bool {
        self.minutes < 0 || self.seconds < 0
    }
}

/// How a time delta is split into minutes and seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Rounding {
    /// `minutes = round(total / 60)` and `seconds = round(total mod 60)`,
    /// rounded independently with ties to even. The two roundings can
    /// disagree near a boundary: 119.6 s splits into 2m 60s.
    Nearest,
    /// Whole seconds (truncated toward zero), floor-divided by 60.
    Floor,
}

impl Rounding {
    pub fn split(self, delta: TimeDelta) -> Offset {
        match self {
            Rounding::Nearest => {
                let total = delta.num_milliseconds() as f64 / 1000.0;
                Offset {
                    minutes: (total / 60.0).round_ties_even() as i64,
                    seconds: total.rem_euclid(60.0).round_ties_even() as i64,
                }
            }
            Rounding::Floor => {
                let whole = delta.num_seconds();
                Offset {
                    minutes: whole.div_euclid(60),
                    seconds: whole.rem_euclid(60),
                }
            }
        }
    }
}

/// Extracts the `HH:MM:SS` time of day from an ISO-8601 timestamp such as
/// `2015-06-04T10:46:08.361-04:00`. The date and zone are ignored.
pub fn parse_time_of_day(iso: &str) -> Option<NaiveTime> {
    let clock = iso.get(11..19)?;
    NaiveTime::parse_from_str(clock, "%H:%M:%S").ok()
}

/// Offset until the next occurrence of `time_of_day` on `now`'s local clock.
///
/// A time already behind `now` is taken to be tomorrow, so the result is
/// always non-negative and under 24 hours.
pub fn until_time_of_day<Tz: TimeZone>(
    time_of_day: NaiveTime,
    now: &DateTime<Tz>,
    rounding: Rounding,
) -> Offset {
    let now = now.naive_local();
    let mut arrival = NaiveDateTime::new(now.date(), time_of_day);
    if arrival < now {
        arrival += TimeDelta::days(1);
    }
    rounding.split(arrival - now)
}

/// Offset until the epoch timestamp `epoch_secs`, or `None` once it has passed.
pub fn until_epoch<Tz: TimeZone>(
    epoch_secs: i64,
    now: &DateTime<Tz>,
    rounding: Rounding,
) -> Option<Offset> {
    let arrival = DateTime::<Utc>::from_timestamp(epoch_secs, 0)?;
    let delta = arrival.signed_duration_since(now.with_timezone(&Utc));
    if delta < TimeDelta::zero() {
        return None;
    }
    Some(rounding.split(delta))
}
