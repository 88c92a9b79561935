use chrono::{DateTime, Duration};
use chrono_tz::Tz;

use super::local_time::LocalTime;

/// Shown in place of a time that could not be formatted.
pub const TIME_PLACEHOLDER: &str = "--:--";

/// Formats an hour and minute as a 12-hour clock string: "4pm", "1:30pm".
///
/// Out-of-range values trip a debug assertion and degrade to
/// [`TIME_PLACEHOLDER`] in release builds.
pub fn format_hm_12h(hour: u32, minute: u32) -> String {
    debug_assert!(hour < 24 && minute < 60, "time out of range: {hour}:{minute}");
    if hour > 23 || minute > 59 {
        return TIME_PLACEHOLDER.to_string();
    }
    let period = if hour >= 12 { "pm" } else { "am" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    if minute == 0 {
        format!("{}{}", display_hour, period)
    } else {
        format!("{}:{:02}{}", display_hour, minute, period)
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// "45 minutes", "1 hour", "2 hours 30 minutes". Partial minutes round up.
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.num_seconds();
    if seconds <= 0 {
        return "less than a minute".to_string();
    }
    let total_minutes = (seconds + 59) / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    match (hours, minutes) {
        (0, m) => plural(m, "minute"),
        (h, 0) => plural(h, "hour"),
        (h, m) => format!("{} {}", plural(h, "hour"), plural(m, "minute")),
    }
}

pub fn closes_phrase(remaining: Duration) -> String {
    format!("closes in {}", format_duration(remaining))
}

/// Phrase for the next opening, relative to the venue calendar day of `now`.
pub fn opens_phrase(now: &DateTime<Tz>, opens_at: &DateTime<Tz>) -> String {
    let days = (opens_at.date_naive() - now.date_naive()).num_days();
    match days {
        i64::MIN..=0 => format!("opens in {}", format_duration(*opens_at - *now)),
        1 => format!(
            "opens tomorrow at {}",
            LocalTime::from_naive_time(opens_at.time()).to_12_hour()
        ),
        n => format!("opens in {} days", n),
    }
}
