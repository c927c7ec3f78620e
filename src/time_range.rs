use crate::error::{IotStreamsError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};
use chrono_tz::Tz;

/// Zone for timestamps recorded without an offset.
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::Europe::London;

/// Last representable instant of a day, used for upper bounds given as a date.
pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

/// Places a local date-time in `tz`.
///
/// An ambiguous local time (autumn fold) resolves to the earlier offset. A
/// local time inside a spring gap is pushed forward by the length of the gap.
pub fn localize(local: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    if let Some(t) = tz.from_local_datetime(&local).earliest() {
        return t;
    }
    // Inside a gap: keep the offset that was in force before the transition.
    let before_gap = tz
        .from_local_datetime(&(local - Duration::hours(3)))
        .earliest()
        .map(|t| t.offset().fix().local_minus_utc())
        .unwrap_or(0);
    tz.from_utc_datetime(&(local - Duration::seconds(i64::from(before_gap))))
}

/// Parses a run boundary given either as an ISO date-time without offset or as
/// an ISO date, in which case `default_time` fills in the time of day.
pub fn parse_boundary(input: &str, default_time: NaiveTime, tz: Tz) -> Result<DateTime<Tz>> {
    let trimmed = input.trim();
    if let Some(local) = parse_local_date_time(trimmed) {
        return Ok(localize(local, tz));
    }
    match trimmed.parse::<NaiveDate>() {
        Ok(date) => Ok(localize(date.and_time(default_time), tz)),
        Err(e) => Err(IotStreamsError::user_input(input, e)),
    }
}

fn parse_local_date_time(input: &str) -> Option<NaiveDateTime> {
    input
        .parse::<NaiveDateTime>()
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M").ok())
}

/// The span of reading times a run replays.
///
/// Both bounds are exclusive: a reading taken exactly at `from` or exactly at
/// `to` is not part of the range. An inverted range is accepted and contains
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Tz>,
    pub to: DateTime<Tz>,
}

impl TimeRange {
    pub fn new(from: DateTime<Tz>, to: DateTime<Tz>) -> Self {
        Self { from, to }
    }

    /// Parses both boundaries. A date-only `from` starts at midnight, a
    /// date-only `to` ends at the last instant of that day.
    pub fn parse(from: &str, to: &str, tz: Tz) -> Result<Self> {
        Ok(Self {
            from: parse_boundary(from, NaiveTime::MIN, tz)?,
            to: parse_boundary(to, end_of_day(), tz)?,
        })
    }

    pub fn contains(&self, timestamp: &DateTime<Tz>) -> bool {
        self.from < *timestamp && *timestamp < self.to
    }

    /// Calendar days covering the range, for sources that cannot filter by time of day.
    pub fn date_span(&self) -> (NaiveDate, NaiveDate) {
        (self.from.date_naive(), self.to.date_naive())
    }

    pub fn time_zone(&self) -> Tz {
        self.from.timezone()
    }
}
