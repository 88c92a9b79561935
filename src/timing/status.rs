use chrono::{DateTime, Duration, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use super::format::{closes_phrase, opens_phrase};
use super::local_time::LocalTime;
use super::schedule::{OpeningHours, Window};
use super::uk_datetime_now::to_uk;

/// How many days past today the evaluator looks for the next opening.
pub const FORWARD_SCAN_DAYS: u32 = 14;

/// Shown when the hours for today are missing or unreadable.
pub const UNAVAILABLE_MESSAGE: &str = "Opening hours unavailable";

/// Refresh interval to suggest when no boundary is coming up.
const DEFAULT_REFRESH_MINUTES: i64 = 60;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusVariant {
    Open,
    KitchenClosed,
    ClosedVenue,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    Opens,
    Closes,
    KitchenOpens,
    KitchenCloses,
    Refresh,
}

/// The next moment the displayed status could change.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NextChange {
    pub at: DateTime<Tz>,
    pub reason: ChangeReason,
}

/// Live open/closed view of the venue at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct CurrentStatus {
    pub evaluated_at: DateTime<Tz>,
    pub is_open: bool,
    pub kitchen_open: bool,
    pub closes_in: Option<Duration>,
    pub opens_in: Option<Duration>,
    pub closes_at: Option<DateTime<Tz>>,
    pub opens_at: Option<DateTime<Tz>>,
    pub kitchen_closes_at: Option<DateTime<Tz>>,
    pub kitchen_opens_at: Option<DateTime<Tz>>,
    pub message: String,
    /// Set when part of the schedule had to be guessed as closed.
    pub degraded: bool,
}

impl CurrentStatus {
    pub fn variant(&self) -> StatusVariant {
        if !self.is_open {
            StatusVariant::ClosedVenue
        } else if !self.kitchen_open {
            StatusVariant::KitchenClosed
        } else {
            StatusVariant::Open
        }
    }

    pub fn next_change(&self) -> NextChange {
        [
            (self.closes_at, ChangeReason::Closes),
            (self.opens_at, ChangeReason::Opens),
            (self.kitchen_closes_at, ChangeReason::KitchenCloses),
            (self.kitchen_opens_at, ChangeReason::KitchenOpens),
        ]
        .into_iter()
        .filter_map(|(at, reason)| at.map(|at| NextChange { at, reason }))
        .filter(|change| change.at > self.evaluated_at)
        .min_by_key(|change| change.at)
        .unwrap_or(NextChange {
            at: self.evaluated_at + Duration::minutes(DEFAULT_REFRESH_MINUTES),
            reason: ChangeReason::Refresh,
        })
    }
}

fn find_window(windows: &[Window], now: &DateTime<Tz>) -> Option<Window> {
    windows.iter().copied().find(|window| window.contains(now))
}

/// Scans forward from the venue date of `now` for the next bar opening.
fn next_opening(hours: &OpeningHours, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    now.date_naive()
        .iter_days()
        .take(FORWARD_SCAN_DAYS as usize + 1)
        .find_map(|date| {
            hours
                .effective_hours(date)
                .hours
                .and_then(|day| day.opening_after(date, now))
        })
}

/// Derives the venue status at `at` from the schedule.
///
/// Yesterday's hours are consulted as well as today's so that hours running
/// past midnight keep the venue open. Missing or malformed days count as
/// closed and mark the result degraded; this never fails.
pub fn evaluate<T: TimeZone>(hours: &OpeningHours, at: &DateTime<T>) -> CurrentStatus {
    let now = to_uk(at);
    let today = hours.effective_hours(now.date_naive());
    let yesterday = now
        .date_naive()
        .pred_opt()
        .map(|date| hours.effective_hours(date));

    let mut degraded = today.is_degraded();
    if degraded {
        warn!(date = %today.date, "no usable hours for today, treating as closed");
    }

    let days: Vec<_> = yesterday.iter().chain(std::iter::once(&today)).collect();
    let venue_windows: Vec<Window> = days.iter().filter_map(|day| day.venue_window()).collect();
    let kitchen_windows: Vec<Window> = days.iter().filter_map(|day| day.kitchen_window()).collect();

    let bar = find_window(&venue_windows, &now);
    let is_open = bar.is_some();
    // The kitchen only counts while the bar itself is open
    let kitchen = bar.and_then(|_| find_window(&kitchen_windows, &now));
    let kitchen_open = kitchen.is_some();

    let closes_at = bar.map(|window| window.end);
    // Kitchen openings after the bar closes are not announced
    let kitchen_opens_at = match closes_at {
        Some(bar_closes) if !kitchen_open => kitchen_windows
            .iter()
            .map(|window| window.start)
            .filter(|start| *start > now && *start < bar_closes)
            .min(),
        _ => None,
    };

    let opens_at = if is_open { None } else { next_opening(hours, &now) };
    let closes_in = closes_at.map(|end| end - now);
    let opens_in = opens_at.map(|start| start - now);

    let message = match (closes_in, opens_at) {
        (Some(remaining), _) => {
            let mut message = format!("Open · {}", closes_phrase(remaining));
            if !kitchen_open {
                match kitchen_opens_at {
                    Some(start) => message.push_str(&format!(
                        " · Kitchen opens at {}",
                        LocalTime::from_naive_time(start.time()).to_12_hour()
                    )),
                    None => message.push_str(" · Kitchen closed"),
                }
            }
            message
        }
        (None, _) if degraded => UNAVAILABLE_MESSAGE.to_string(),
        (None, Some(start)) => format!("Closed · {}", opens_phrase(&now, &start)),
        (None, None) => {
            warn!(days = FORWARD_SCAN_DAYS, "no opening found in forward scan");
            degraded = true;
            UNAVAILABLE_MESSAGE.to_string()
        }
    };

    debug!(%now, is_open, kitchen_open, degraded, "evaluated venue status");

    CurrentStatus {
        evaluated_at: now,
        is_open,
        kitchen_open,
        closes_in,
        opens_in,
        closes_at,
        opens_at,
        kitchen_closes_at: kitchen.map(|window| window.end),
        kitchen_opens_at,
        message,
        degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::daily::{DayHours, KitchenHours};
    use crate::timing::schedule::{SpecialHoursOverride, WeeklySchedule};
    use chrono::{NaiveDate, Utc, Weekday};
    use chrono_tz::Europe::London;

    fn t(hour: u16, minute: u16) -> LocalTime {
        LocalTime::from_hm(hour, minute)
    }

    fn london(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        London.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn every_day(hours: DayHours) -> WeeklySchedule {
        let mut schedule = WeeklySchedule::new();
        for day in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            schedule.set(day, hours.clone());
        }
        schedule
    }

    fn pub_week() -> OpeningHours {
        let schedule = every_day(
            DayHours::new_open(t(12, 0), t(22, 0)).with_kitchen(KitchenHours::OpenRange {
                opens: t(12, 0),
                closes: t(21, 0),
            }),
        )
        .with(
            Weekday::Mon,
            DayHours::new_open(t(16, 0), t(22, 0)).with_kitchen(KitchenHours::Closed),
        )
        .with(
            Weekday::Sat,
            DayHours::new_open(t(16, 0), t(1, 0)).with_kitchen(KitchenHours::OpenRange {
                opens: t(17, 0),
                closes: t(21, 0),
            }),
        );
        OpeningHours::new(schedule, Vec::new())
    }

    // 2024-06-03 is a Monday
    #[test]
    fn monday_before_opening() {
        let status = evaluate(&pub_week(), &london(2024, 6, 3, 15, 0));
        assert!(!status.is_open);
        assert!(!status.kitchen_open);
        assert_eq!(status.opens_in, Some(Duration::hours(1)));
        assert_eq!(status.closes_in, None);
        assert_eq!(status.message, "Closed · opens in 1 hour");
        assert_eq!(status.variant(), StatusVariant::ClosedVenue);
    }

    #[test]
    fn monday_evening_open_without_kitchen() {
        let status = evaluate(&pub_week(), &london(2024, 6, 3, 21, 0));
        assert!(status.is_open);
        assert!(!status.kitchen_open);
        assert_eq!(status.closes_in, Some(Duration::hours(1)));
        assert_eq!(status.opens_in, None);
        assert_eq!(status.message, "Open · closes in 1 hour · Kitchen closed");
        assert_eq!(status.variant(), StatusVariant::KitchenClosed);
    }

    #[test]
    fn boundaries_are_half_open() {
        let hours = pub_week();
        assert!(evaluate(&hours, &london(2024, 6, 3, 16, 0)).is_open);
        assert!(!evaluate(&hours, &london(2024, 6, 3, 22, 0)).is_open);
        assert!(!evaluate(&hours, &london(2024, 6, 3, 15, 59)).is_open);
        assert!(evaluate(&hours, &london(2024, 6, 3, 21, 59)).is_open);
    }

    #[test]
    fn spanning_hours_stay_open_after_midnight() {
        // Saturday 2024-06-08 opens 16:00 until 01:00 Sunday
        let status = evaluate(&pub_week(), &london(2024, 6, 9, 0, 30));
        assert!(status.is_open);
        assert_eq!(status.closes_in, Some(Duration::minutes(30)));
        assert!(!evaluate(&pub_week(), &london(2024, 6, 9, 1, 0)).is_open);
    }

    #[test]
    fn after_midnight_kitchen_hint_stays_inside_bar_hours() {
        // Sunday's kitchen starts at 12:00, long after Saturday's bar closes at 01:00
        let status = evaluate(&pub_week(), &london(2024, 6, 9, 0, 30));
        assert!(status.is_open);
        assert!(!status.kitchen_open);
        assert_eq!(status.closes_at, Some(london(2024, 6, 9, 1, 0)));
        assert_eq!(status.kitchen_opens_at, None);
        assert_eq!(status.message, "Open · closes in 30 minutes · Kitchen closed");
        assert_eq!(status.next_change().reason, ChangeReason::Closes);
    }

    #[test]
    fn kitchen_follows_its_own_hours_inside_bar_hours() {
        let hours = pub_week();
        let lunch = evaluate(&hours, &london(2024, 6, 4, 13, 0));
        assert!(lunch.is_open && lunch.kitchen_open);
        assert_eq!(lunch.variant(), StatusVariant::Open);

        let late = evaluate(&hours, &london(2024, 6, 4, 21, 30));
        assert!(late.is_open);
        assert!(!late.kitchen_open);

        let saturday_early = evaluate(&hours, &london(2024, 6, 8, 16, 30));
        assert!(!saturday_early.kitchen_open);
        assert_eq!(saturday_early.kitchen_opens_at, Some(london(2024, 6, 8, 17, 0)));
        assert_eq!(
            saturday_early.message,
            "Open · closes in 8 hours 30 minutes · Kitchen opens at 5pm"
        );
    }

    #[test]
    fn kitchen_is_never_open_while_bar_is_closed() {
        // Kitchen hours reach past bar hours on purpose
        let hours = OpeningHours::new(
            every_day(DayHours::new_open(t(12, 0), t(20, 0)).with_kitchen(
                KitchenHours::OpenRange {
                    opens: t(10, 0),
                    closes: t(23, 0),
                },
            )),
            Vec::new(),
        );
        for hour in [10, 11, 20, 22] {
            let status = evaluate(&hours, &london(2024, 6, 4, hour, 30));
            assert!(!status.is_open);
            assert!(!status.kitchen_open, "kitchen reported open at {hour}:30");
        }
    }

    #[test]
    fn closed_days_are_never_open() {
        let hours = OpeningHours::new(
            every_day(DayHours::new_closed().with_kitchen(KitchenHours::OpenRange {
                opens: t(0, 0),
                closes: t(23, 59),
            }))
            .with(Weekday::Thu, DayHours::new_open(t(16, 0), t(22, 0))),
            Vec::new(),
        );
        for hour in 0..24 {
            let status = evaluate(&hours, &london(2024, 6, 3, hour, 15));
            assert!(!status.is_open);
            assert!(!status.kitchen_open);
        }
    }

    #[test]
    fn forward_scan_crosses_closed_days() {
        let hours = OpeningHours::new(
            every_day(DayHours::new_closed())
                .with(Weekday::Thu, DayHours::new_open(t(16, 0), t(22, 0))),
            Vec::new(),
        );
        let status = evaluate(&hours, &london(2024, 6, 3, 12, 0));
        assert!(!status.is_open);
        assert_eq!(status.opens_at, Some(london(2024, 6, 6, 16, 0)));
        assert_eq!(status.message, "Closed · opens in 3 days");
        assert!(!status.degraded);
    }

    #[test]
    fn forward_scan_honours_overrides() {
        let tuesday = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        let hours = OpeningHours::new(
            pub_week().regular_hours,
            vec![SpecialHoursOverride::closed(tuesday)],
        );
        let status = evaluate(&hours, &london(2024, 6, 3, 23, 0));
        assert_eq!(status.opens_at, Some(london(2024, 6, 5, 12, 0)));
    }

    #[test]
    fn override_closes_a_normal_day() {
        let monday = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let hours = OpeningHours::new(
            pub_week().regular_hours,
            vec![SpecialHoursOverride::closed(monday)],
        );
        let status = evaluate(&hours, &london(2024, 6, 3, 18, 0));
        assert!(!status.is_open);
        assert_eq!(status.message, "Closed · opens tomorrow at 12pm");
    }

    #[test]
    fn nothing_open_within_the_cap_degrades() {
        let hours = OpeningHours::new(every_day(DayHours::new_closed()), Vec::new());
        let status = evaluate(&hours, &london(2024, 6, 3, 12, 0));
        assert!(!status.is_open);
        assert_eq!(status.opens_in, None);
        assert!(status.degraded);
        assert_eq!(status.message, UNAVAILABLE_MESSAGE);
    }

    #[test]
    fn missing_day_is_closed_and_degraded() {
        let tuesday = pub_week().regular_hours.get(Weekday::Tue).unwrap().clone();
        let hours = OpeningHours::new(WeeklySchedule::new().with(Weekday::Tue, tuesday), Vec::new());
        let status = evaluate(&hours, &london(2024, 6, 3, 18, 0));
        assert!(!status.is_open);
        assert!(status.degraded);
        assert_eq!(status.message, UNAVAILABLE_MESSAGE);
        assert_eq!(status.opens_at, Some(london(2024, 6, 4, 12, 0)));
    }

    #[test]
    fn accepts_instants_in_any_zone() {
        // 20:00 UTC is 21:00 in London during summer time
        let at = Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap();
        let status = evaluate(&pub_week(), &at);
        assert!(status.is_open);
        assert_eq!(status.closes_in, Some(Duration::hours(1)));
    }

    #[test]
    fn next_change_picks_the_earliest_boundary() {
        let hours = pub_week();
        let lunch = evaluate(&hours, &london(2024, 6, 4, 13, 0));
        assert_eq!(
            lunch.next_change(),
            NextChange {
                at: london(2024, 6, 4, 21, 0),
                reason: ChangeReason::KitchenCloses
            }
        );

        let closed = OpeningHours::new(every_day(DayHours::new_closed()), Vec::new());
        let status = evaluate(&closed, &london(2024, 6, 3, 12, 0));
        assert_eq!(status.next_change().reason, ChangeReason::Refresh);
        assert_eq!(status.next_change().at, london(2024, 6, 3, 13, 0));
    }
}
