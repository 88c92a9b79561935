use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use super::daily::{DayHours, DayHoursWire};
use super::local_time::LocalTime;
use super::uk_datetime_now::{to_uk, uk_instant};
use crate::error::HoursResult;
use crate::ISO_FORMAT_DATE;

/// A concrete half-open interval `[start, end)` in venue time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl Window {
    /// Builds the interval for hours that begin on `date`. A closing time at
    /// or before the opening time falls on the following day.
    pub fn on(date: NaiveDate, opens: LocalTime, closes: LocalTime) -> Option<Self> {
        let end_date = if closes <= opens { date.succ_opt()? } else { date };
        Some(Self {
            start: uk_instant(date, opens)?,
            end: uk_instant(end_date, closes)?,
        })
    }

    pub fn contains(&self, at: &DateTime<Tz>) -> bool {
        self.start <= *at && *at < self.end
    }
}

/// Regular hours for each day of the week, Monday first.
///
/// A slot is empty when the feed left the day out or sent something that
/// could not be read at all.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "HashMap<String, Value>")]
pub struct WeeklySchedule {
    timings: [Option<DayHours>; 7],
}

impl WeeklySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, weekday: Weekday, hours: DayHours) -> &mut Self {
        self.timings[weekday.num_days_from_monday() as usize] = Some(hours);
        self
    }

    pub fn with(mut self, weekday: Weekday, hours: DayHours) -> Self {
        self.set(weekday, hours);
        self
    }

    pub fn get(&self, weekday: Weekday) -> Option<&DayHours> {
        self.timings[weekday.num_days_from_monday() as usize].as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.timings.iter().all(Option::is_some)
    }
}

impl From<HashMap<String, Value>> for WeeklySchedule {
    fn from(entries: HashMap<String, Value>) -> Self {
        let mut schedule = WeeklySchedule::new();
        let mut entries: Vec<(String, Value)> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in entries {
            let Ok(weekday) = name.parse::<Weekday>() else {
                warn!(day = %name, "ignoring unknown day in regular hours");
                continue;
            };
            if schedule.get(weekday).is_some() {
                warn!(day = %name, "duplicate day in regular hours, keeping the first by key order");
                continue;
            }
            match serde_json::from_value::<DayHours>(value) {
                Ok(hours) => {
                    schedule.set(weekday, hours);
                }
                Err(err) => warn!(day = %name, %err, "unreadable regular hours"),
            }
        }
        schedule
    }
}

/// Hours for one calendar date that replace the weekly entry.
/// `hours` of `None` means closed all day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecialHoursOverride {
    pub date: NaiveDate,
    pub hours: Option<DayHours>,
    pub note: Option<String>,
}

impl SpecialHoursOverride {
    pub fn closed(date: NaiveDate) -> Self {
        Self {
            date,
            hours: None,
            note: None,
        }
    }

    pub fn open(date: NaiveDate, hours: DayHours) -> Self {
        Self {
            date,
            note: hours.note().map(str::to_string),
            hours: Some(hours),
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

#[derive(Deserialize)]
struct SpecialWire {
    date: String,
    #[serde(flatten)]
    hours: DayHoursWire,
}

fn lenient_overrides<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<SpecialHoursOverride>, D::Error> {
    let entries = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let mut overrides = Vec::with_capacity(entries.len());
    for entry in entries {
        let wire = match serde_json::from_value::<SpecialWire>(entry) {
            Ok(wire) => wire,
            Err(err) => {
                warn!(%err, "skipping unreadable special hours entry");
                continue;
            }
        };
        let Ok(date) = NaiveDate::parse_from_str(&wire.date, ISO_FORMAT_DATE) else {
            warn!(date = %wire.date, "skipping special hours entry with bad date");
            continue;
        };
        let hours = DayHours::from(wire.hours);
        overrides.push(if hours.is_closed() {
            SpecialHoursOverride {
                date,
                hours: None,
                note: hours.note().map(str::to_string),
            }
        } else {
            SpecialHoursOverride::open(date, hours)
        });
    }
    Ok(overrides)
}

fn nullable_schedule<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<WeeklySchedule, D::Error> {
    let schedule = Option::<WeeklySchedule>::deserialize(deserializer)?;
    if schedule.is_none() {
        warn!("hours document has no regular hours");
    }
    Ok(schedule.unwrap_or_default())
}

/// The hours document served by the management API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningHours {
    #[serde(default, deserialize_with = "nullable_schedule")]
    pub regular_hours: WeeklySchedule,
    #[serde(default, deserialize_with = "lenient_overrides")]
    pub special_hours: Vec<SpecialHoursOverride>,
}

/// The hours that apply to one date after overrides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectiveHours {
    pub date: NaiveDate,
    /// `None` only when the weekly slot is empty and nothing overrides it.
    pub hours: Option<DayHours>,
    pub is_special: bool,
}

impl EffectiveHours {
    pub fn is_degraded(&self) -> bool {
        self.hours.as_ref().map_or(true, DayHours::is_malformed)
    }

    pub fn is_closed(&self) -> bool {
        self.hours.as_ref().map_or(true, |hours| hours.times().is_none())
    }

    pub fn venue_window(&self) -> Option<Window> {
        self.hours.as_ref()?.venue_window(self.date)
    }

    pub fn kitchen_window(&self) -> Option<Window> {
        self.hours.as_ref()?.kitchen_window(self.date)
    }
}

impl OpeningHours {
    pub fn new(regular_hours: WeeklySchedule, special_hours: Vec<SpecialHoursOverride>) -> Self {
        Self {
            regular_hours,
            special_hours,
        }
    }

    /// Decodes a feed body, unwrapping a `{"success": true, "data": ...}`
    /// envelope when present.
    pub fn from_json(body: &str) -> HoursResult<Self> {
        let mut value: Value = serde_json::from_str(body)?;
        if let Some(data) = value.get_mut("data").filter(|data| data.is_object()) {
            let data = data.take();
            return Ok(serde_json::from_value(data)?);
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn effective_hours(&self, date: NaiveDate) -> EffectiveHours {
        let base = self.regular_hours.get(date.weekday());
        match self.special_hours.iter().find(|special| special.date == date) {
            Some(special) => EffectiveHours {
                date,
                hours: Some(match (&special.hours, &special.note) {
                    (None, Some(note)) => DayHours::new_closed().with_note(note),
                    (None, None) => DayHours::new_closed(),
                    (Some(hours), _) => hours.inherit_times(base),
                }),
                is_special: true,
            },
            None => EffectiveHours {
                date,
                hours: base.cloned(),
                is_special: false,
            },
        }
    }

    /// Effective hours for the venue calendar date of `at`.
    pub fn resolve<T: TimeZone>(&self, at: &DateTime<T>) -> EffectiveHours {
        self.effective_hours(to_uk(at).date_naive())
    }

    /// Effective hours for `days` consecutive dates starting at `from`.
    pub fn upcoming(&self, from: NaiveDate, days: u32) -> Vec<EffectiveHours> {
        from.iter_days()
            .take(days as usize)
            .map(|date| self.effective_hours(date))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::daily::KitchenHours;
    use chrono_tz::Europe::London;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const DOCUMENT: &str = r#"{
        "regularHours": {
            "monday": {"opens": "16:00:00", "closes": "22:00:00", "kitchen": null, "is_closed": false},
            "tuesday": {"opens": "12:00:00", "closes": "22:00:00", "kitchen": {"opens": "12:00", "closes": "21:00"}, "is_closed": false},
            "wednesday": {"opens": "12:00:00", "closes": "22:00:00", "kitchen": {"opens": "12:00", "closes": "21:00"}},
            "thursday": {"opens": "12:00:00", "closes": "22:00:00"},
            "friday": {"opens": "12:00:00", "closes": "00:00:00"},
            "Saturday": {"opens": "12:00:00", "closes": "01:00:00"},
            "sunday": {"is_closed": true}
        },
        "specialHours": [
            {"date": "2024-12-25", "is_closed": true, "note": "Christmas"},
            {"date": "2024-12-24", "opens": "12:00", "closes": "18:00", "kitchen": null, "status": "modified"},
            {"date": "2024-12-31", "kitchen": {"opens": "12:00", "closes": "16:00"}, "note": "NYE"},
            {"date": "not a date", "is_closed": true}
        ]
    }"#;

    #[test]
    fn decodes_the_feed_document() {
        let hours = OpeningHours::from_json(DOCUMENT).unwrap();
        assert!(hours.regular_hours.is_complete());
        assert!(hours.regular_hours.get(Weekday::Sun).unwrap().is_closed());
        assert_eq!(hours.special_hours.len(), 3);
        assert_eq!(
            hours.special_hours[0],
            SpecialHoursOverride::closed(date(2024, 12, 25)).with_note("Christmas")
        );
    }

    #[test]
    fn unwraps_the_success_envelope() {
        let wrapped = format!(r#"{{"success": true, "data": {}}}"#, DOCUMENT);
        let hours = OpeningHours::from_json(&wrapped).unwrap();
        assert!(hours.regular_hours.is_complete());
    }

    #[test]
    fn missing_and_unreadable_days_leave_empty_slots() {
        let hours = OpeningHours::from_json(
            r#"{"regularHours": {"monday": {"opens": "16:00", "closes": "22:00"}, "tuesday": "open late", "funday": {}}}"#,
        )
        .unwrap();
        assert!(hours.regular_hours.get(Weekday::Mon).is_some());
        assert!(hours.regular_hours.get(Weekday::Tue).is_none());
        assert!(!hours.regular_hours.is_complete());
        let tuesday = hours.effective_hours(date(2024, 6, 4));
        assert!(tuesday.is_degraded());
        assert!(tuesday.is_closed());
    }

    #[test]
    fn null_sections_leave_an_empty_schedule() {
        let hours = OpeningHours::from_json(
            r#"{"regularHours": null, "specialHours": [{"date": "2024-06-04", "is_closed": true}]}"#,
        )
        .unwrap();
        assert_eq!(hours.regular_hours, WeeklySchedule::new());
        assert_eq!(hours.special_hours.len(), 1);
        assert!(hours.effective_hours(date(2024, 6, 3)).is_degraded());
        assert!(!hours.effective_hours(date(2024, 6, 4)).is_degraded());
    }

    #[test]
    fn override_takes_precedence_over_weekday() {
        let hours = OpeningHours::from_json(DOCUMENT).unwrap();
        // 2024-12-25 is a Wednesday
        let christmas = hours.effective_hours(date(2024, 12, 25));
        assert!(christmas.is_special);
        assert!(christmas.is_closed());
        assert_eq!(christmas.venue_window(), None);
        assert_eq!(christmas.hours.as_ref().and_then(|h| h.note()), Some("Christmas"));

        let eve = hours.effective_hours(date(2024, 12, 24));
        assert_eq!(
            eve.hours.unwrap().times(),
            Some((LocalTime::from_hm(12, 0), LocalTime::from_hm(18, 0)))
        );

        let ordinary = hours.effective_hours(date(2024, 12, 18));
        assert!(!ordinary.is_special);
        assert_eq!(ordinary.hours, hours.regular_hours.get(Weekday::Wed).cloned());
    }

    #[test]
    fn override_without_times_inherits_weekday_times_but_not_kitchen() {
        let hours = OpeningHours::from_json(DOCUMENT).unwrap();
        // 2024-12-31 is a Tuesday
        let nye = hours.effective_hours(date(2024, 12, 31)).hours.unwrap();
        assert_eq!(
            nye.times(),
            Some((LocalTime::from_hm(12, 0), LocalTime::from_hm(22, 0)))
        );
        assert_eq!(
            nye.kitchen(),
            Some(KitchenHours::OpenRange {
                opens: LocalTime::from_hm(12, 0),
                closes: LocalTime::from_hm(16, 0)
            })
        );
        assert_eq!(nye.note(), Some("NYE"));
    }

    #[test]
    fn resolve_uses_the_venue_calendar_date() {
        let hours = OpeningHours::from_json(DOCUMENT).unwrap();
        // 23:30 UTC on Sunday 2024-06-02 is already Monday in London
        let at = chrono::Utc.with_ymd_and_hms(2024, 6, 2, 23, 30, 0).unwrap();
        assert_eq!(hours.resolve(&at).date, date(2024, 6, 3));
    }

    #[test]
    fn spanning_window_ends_next_day() {
        let window = Window::on(date(2024, 6, 8), LocalTime::from_hm(16, 0), LocalTime::from_hm(1, 0)).unwrap();
        let after_midnight = London.with_ymd_and_hms(2024, 6, 9, 0, 30, 0).unwrap();
        let at_close = London.with_ymd_and_hms(2024, 6, 9, 1, 0, 0).unwrap();
        assert!(window.contains(&after_midnight));
        assert!(!window.contains(&at_close));
    }

    #[test]
    fn upcoming_lists_consecutive_days() {
        let hours = OpeningHours::from_json(DOCUMENT).unwrap();
        let week = hours.upcoming(date(2024, 12, 23), 7);
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].date, date(2024, 12, 23));
        assert!(week[2].is_special);
        assert_eq!(week[6].date, date(2024, 12, 29));
    }
}
