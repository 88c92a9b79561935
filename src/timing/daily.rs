use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::warn;

use super::local_time::LocalTime;
use super::schedule::Window;

/// Kitchen service for a day. Independent of the bar hours.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KitchenHours {
    Closed,
    OpenRange { opens: LocalTime, closes: LocalTime },
}

/// The hours for a single day, either a weekly entry or a date override.
///
/// A day that is not closed but is missing either time is malformed; the
/// evaluator treats it as closed and reports a degraded status.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "DayHoursWire")]
pub struct DayHours {
    is_closed: bool,
    opens: Option<LocalTime>,
    closes: Option<LocalTime>,
    kitchen: Option<KitchenHours>,
    note: Option<String>,
}

impl DayHours {
    pub fn new_open(opens: LocalTime, closes: LocalTime) -> Self {
        Self {
            is_closed: false,
            opens: Some(opens),
            closes: Some(closes),
            kitchen: None,
            note: None,
        }
    }

    pub fn new_closed() -> Self {
        Self {
            is_closed: true,
            opens: None,
            closes: None,
            kitchen: None,
            note: None,
        }
    }

    pub fn with_kitchen(mut self, kitchen: KitchenHours) -> Self {
        self.kitchen = Some(kitchen);
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    pub fn opens(&self) -> Option<LocalTime> {
        self.opens
    }

    pub fn closes(&self) -> Option<LocalTime> {
        self.closes
    }

    pub fn kitchen(&self) -> Option<KitchenHours> {
        self.kitchen
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn is_malformed(&self) -> bool {
        !self.is_closed && (self.opens.is_none() || self.closes.is_none())
    }

    /// Opening and closing time, or `None` when closed or malformed.
    pub fn times(&self) -> Option<(LocalTime, LocalTime)> {
        if self.is_closed {
            return None;
        }
        Some((self.opens?, self.closes?))
    }

    pub fn spans_midnight(&self) -> bool {
        matches!(self.times(), Some((opens, closes)) if closes <= opens)
    }

    /// The bar's opening interval when these hours apply to `date`.
    pub fn venue_window(&self, date: NaiveDate) -> Option<Window> {
        let (opens, closes) = self.times()?;
        Window::on(date, opens, closes)
    }

    /// Start of the bar window on `date` if it is still ahead of `now`.
    pub(crate) fn opening_after(&self, date: NaiveDate, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.venue_window(date)
            .map(|window| window.start)
            .filter(|start| start > now)
    }

    /// The kitchen's serving interval on `date`. Never present on a closed day.
    pub fn kitchen_window(&self, date: NaiveDate) -> Option<Window> {
        if self.is_closed {
            return None;
        }
        match self.kitchen? {
            KitchenHours::Closed => None,
            KitchenHours::OpenRange { opens, closes } => Window::on(date, opens, closes),
        }
    }

    /// Fills in missing times from `base`, used when an override only
    /// changes the kitchen or adds a note.
    pub(crate) fn inherit_times(&self, base: Option<&DayHours>) -> DayHours {
        let mut hours = self.clone();
        if let Some(base) = base {
            hours.opens = hours.opens.or(base.opens);
            hours.closes = hours.closes.or(base.closes);
        }
        hours
    }

    pub fn venue_summary(&self) -> String {
        if self.is_closed {
            return "CLOSED".to_string();
        }
        match self.times() {
            Some((opens, closes)) => format!("{} - {}", opens, closes),
            None => "Hours vary".to_string(),
        }
    }

    pub fn kitchen_summary(&self) -> String {
        if self.is_closed {
            return "CLOSED".to_string();
        }
        match self.kitchen {
            None => "No food service".to_string(),
            Some(KitchenHours::Closed) => "Kitchen closed".to_string(),
            Some(KitchenHours::OpenRange { opens, closes }) => format!("{} - {}", opens, closes),
        }
    }
}

/// Shape of a day as the management API sends it. Every field is optional
/// so a single bad value degrades that field instead of the whole document.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DayHoursWire {
    is_closed: Option<bool>,
    opens: Option<String>,
    closes: Option<String>,
    kitchen: Option<KitchenWire>,
    is_kitchen_closed: Option<bool>,
    status: Option<String>,
    note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KitchenWire {
    is_closed: Option<bool>,
    opens: Option<String>,
    closes: Option<String>,
}

fn lenient_time(field: &str, raw: Option<&str>) -> Option<LocalTime> {
    let raw = raw?;
    match raw.parse() {
        Ok(time) => Some(time),
        Err(err) => {
            warn!(field, %err, "ignoring malformed time in hours feed");
            None
        }
    }
}

impl From<KitchenWire> for KitchenHours {
    fn from(wire: KitchenWire) -> Self {
        if wire.is_closed == Some(true) {
            return KitchenHours::Closed;
        }
        let opens = lenient_time("kitchen.opens", wire.opens.as_deref());
        let closes = lenient_time("kitchen.closes", wire.closes.as_deref());
        match (opens, closes) {
            (Some(opens), Some(closes)) => KitchenHours::OpenRange { opens, closes },
            _ => KitchenHours::Closed,
        }
    }
}

impl From<DayHoursWire> for DayHours {
    fn from(wire: DayHoursWire) -> Self {
        let is_closed =
            wire.is_closed.unwrap_or(false) || wire.status.as_deref() == Some("closed");
        let kitchen = if wire.is_kitchen_closed == Some(true) {
            Some(KitchenHours::Closed)
        } else {
            wire.kitchen.map(KitchenHours::from)
        };
        Self {
            is_closed,
            opens: lenient_time("opens", wire.opens.as_deref()),
            closes: lenient_time("closes", wire.closes.as_deref()),
            kitchen,
            note: wire.note,
        }
    }
}
