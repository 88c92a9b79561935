use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use super::local_time::LocalTime;

/// The venue's civil timezone. Every schedule lookup happens in this zone.
pub const VENUE_TIMEZONE: Tz = chrono_tz::Europe::London;

pub fn uk_datetime_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&VENUE_TIMEZONE)
}

pub fn to_uk<T: TimeZone>(at: &DateTime<T>) -> DateTime<Tz> {
    at.with_timezone(&VENUE_TIMEZONE)
}

/// The instant a venue wall-clock time occurs on `date`.
///
/// Times inside the spring-forward gap are pushed an hour later; times in
/// the autumn overlap resolve to the first occurrence.
pub fn uk_instant(date: NaiveDate, time: LocalTime) -> Option<DateTime<Tz>> {
    let naive = date.and_time(time.to_naive_time());
    match VENUE_TIMEZONE.from_local_datetime(&naive) {
        LocalResult::Single(instant) => Some(instant),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => VENUE_TIMEZONE
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest(),
    }
}
