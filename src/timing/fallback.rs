use chrono::Weekday;

use super::daily::{DayHours, KitchenHours};
use super::local_time::LocalTime;
use super::schedule::{OpeningHours, WeeklySchedule};

pub const FALLBACK_MESSAGE: &str =
    "We couldn't load our latest opening hours. These are our usual hours, please call us to check today's times.";

const LUNCH: LocalTime = LocalTime::from_hm(12, 0);
const KITCHEN_CLOSE: LocalTime = LocalTime::from_hm(21, 0);

fn open_with_kitchen(opens: LocalTime, closes: LocalTime, kitchen_closes: LocalTime) -> DayHours {
    DayHours::new_open(opens, closes).with_kitchen(KitchenHours::OpenRange {
        opens: LUNCH,
        closes: kitchen_closes,
    })
}

/// Usual weekly hours, used only when the hours feed has never answered.
pub fn fallback_hours() -> OpeningHours {
    let schedule = WeeklySchedule::new()
        .with(
            Weekday::Mon,
            DayHours::new_open(LocalTime::from_hm(16, 0), LocalTime::from_hm(22, 0))
                .with_kitchen(KitchenHours::Closed),
        )
        .with(Weekday::Tue, open_with_kitchen(LUNCH, LocalTime::from_hm(22, 0), KITCHEN_CLOSE))
        .with(Weekday::Wed, open_with_kitchen(LUNCH, LocalTime::from_hm(22, 0), KITCHEN_CLOSE))
        .with(Weekday::Thu, open_with_kitchen(LUNCH, LocalTime::from_hm(22, 0), KITCHEN_CLOSE))
        .with(Weekday::Fri, open_with_kitchen(LUNCH, LocalTime::from_hm(23, 0), KITCHEN_CLOSE))
        .with(Weekday::Sat, open_with_kitchen(LUNCH, LocalTime::from_hm(23, 0), KITCHEN_CLOSE))
        .with(
            Weekday::Sun,
            open_with_kitchen(LUNCH, LocalTime::from_hm(21, 0), LocalTime::from_hm(17, 0)),
        );
    OpeningHours::new(schedule, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::status::evaluate;
    use chrono::TimeZone;
    use chrono_tz::Europe::London;

    #[test]
    fn covers_every_day() {
        assert!(fallback_hours().regular_hours.is_complete());
    }

    #[test]
    fn monday_has_no_kitchen() {
        let at = London.with_ymd_and_hms(2024, 6, 3, 18, 0, 0).unwrap();
        let status = evaluate(&fallback_hours(), &at);
        assert!(status.is_open);
        assert!(!status.kitchen_open);
        assert!(!status.degraded);
    }
}
