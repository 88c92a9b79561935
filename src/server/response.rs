use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

use crate::feed::feed::{FeedState, HoursSource};
use crate::timing::daily::DayHours;
use crate::timing::format::format_duration;
use crate::timing::local_time::LocalTime;
use crate::timing::schedule::EffectiveHours;
use crate::timing::status::{ChangeReason, CurrentStatus, StatusVariant, UNAVAILABLE_MESSAGE};
use crate::ISO_FORMAT_DATE;

/// Body of `/api/status`.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    status: StatusView,
    today: TodayView,
    #[serde(flatten)]
    freshness: FreshnessView,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<String>,
    next_change: NextChangeView,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    is_open: bool,
    kitchen_open: bool,
    closes_in: Option<String>,
    opens_in: Option<String>,
    closes_at: Option<String>,
    opens_at: Option<String>,
    kitchen_closes_at: Option<String>,
    kitchen_opens_at: Option<String>,
    variant: StatusVariant,
    message: String,
    degraded: bool,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TodayView {
    date: String,
    day_name: String,
    is_special: bool,
    venue: String,
    kitchen: String,
    note: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NextChangeView {
    at: String,
    reason: ChangeReason,
}

/// Body of `/api/hours`.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WeekResponse {
    days: Vec<DayView>,
    #[serde(flatten)]
    freshness: FreshnessView,
}

/// Where the served hours came from and when they were last refreshed.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessView {
    source: HoursSource,
    last_updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    date: String,
    day_name: String,
    day_abbr: String,
    is_today: bool,
    is_special: bool,
    is_closed: bool,
    hours: String,
    kitchen_hours: String,
    note: Option<String>,
}

fn clock(at: &DateTime<Tz>) -> String {
    LocalTime::from_naive_time(at.time()).to_12_hour()
}

fn summaries(effective: &EffectiveHours) -> (String, String) {
    match &effective.hours {
        Some(hours) => (hours.venue_summary(), hours.kitchen_summary()),
        None => (UNAVAILABLE_MESSAGE.to_string(), "-".to_string()),
    }
}

impl StatusView {
    pub fn new(status: &CurrentStatus) -> Self {
        Self {
            is_open: status.is_open,
            kitchen_open: status.kitchen_open,
            closes_in: status.closes_in.map(format_duration),
            opens_in: status.opens_in.map(format_duration),
            closes_at: status.closes_at.as_ref().map(clock),
            opens_at: status.opens_at.as_ref().map(clock),
            kitchen_closes_at: status.kitchen_closes_at.as_ref().map(clock),
            kitchen_opens_at: status.kitchen_opens_at.as_ref().map(clock),
            variant: status.variant(),
            message: status.message.clone(),
            degraded: status.degraded,
        }
    }
}

impl FreshnessView {
    pub fn new(state: &FeedState) -> Self {
        Self {
            source: state.source(),
            last_updated: state.last_success().map(|at| at.to_rfc3339()),
            last_error: state.last_error().map(str::to_string),
        }
    }

    pub fn source(&self) -> HoursSource {
        self.source
    }
}

impl TodayView {
    pub fn new(today: &EffectiveHours) -> Self {
        let (venue, kitchen) = summaries(today);
        Self {
            date: today.date.format(ISO_FORMAT_DATE).to_string(),
            day_name: today.date.format("%A").to_string(),
            is_special: today.is_special,
            venue,
            kitchen,
            note: today.hours.as_ref().and_then(DayHours::note).map(str::to_string),
        }
    }
}

impl StatusResponse {
    pub fn new(
        status: &CurrentStatus,
        today: &EffectiveHours,
        freshness: FreshnessView,
        notice: Option<&str>,
    ) -> Self {
        let next_change = status.next_change();
        Self {
            status: StatusView::new(status),
            today: TodayView::new(today),
            freshness,
            notice: notice.map(str::to_string),
            next_change: NextChangeView {
                at: next_change.at.to_rfc3339(),
                reason: next_change.reason,
            },
        }
    }
}

impl DayView {
    pub fn new(effective: &EffectiveHours, today: NaiveDate) -> Self {
        let (hours, kitchen_hours) = summaries(effective);
        Self {
            date: effective.date.format(ISO_FORMAT_DATE).to_string(),
            day_name: effective.date.format("%A").to_string(),
            day_abbr: effective.date.format("%a").to_string(),
            is_today: effective.date == today,
            is_special: effective.is_special,
            is_closed: effective.is_closed(),
            hours,
            kitchen_hours,
            note: effective
                .hours
                .as_ref()
                .and_then(DayHours::note)
                .map(str::to_string),
        }
    }
}

impl WeekResponse {
    pub fn new(days: &[EffectiveHours], today: NaiveDate, freshness: FreshnessView) -> Self {
        Self {
            days: days.iter().map(|day| DayView::new(day, today)).collect(),
            freshness,
        }
    }
}
