use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use reqwest::header::{CACHE_CONTROL, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use tokio::time::{sleep_until, Instant};
use tracing::{error, info, warn};

use super::config::Config;
use crate::error::{Error, HoursResult};
use crate::timing::fallback::fallback_hours;
use crate::timing::schedule::OpeningHours;
use crate::timing::uk_datetime_now::uk_datetime_now;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Where the hours behind a status came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HoursSource {
    /// The last fetch succeeded
    Live,
    /// A document is held but the last fetch failed
    Stale,
    /// No document was ever fetched
    Fallback,
}

/// The most recent hours document and how fresh it is.
#[derive(Debug, Default)]
pub struct FeedState {
    hours: Option<OpeningHours>,
    last_success: Option<DateTime<Tz>>,
    last_error: Option<String>,
}

pub type SharedFeed = Arc<RwLock<FeedState>>;

impl FeedState {
    pub fn shared() -> SharedFeed {
        Arc::new(RwLock::new(FeedState::default()))
    }

    pub fn record_success(&mut self, hours: OpeningHours, at: DateTime<Tz>) {
        self.hours = Some(hours);
        self.last_success = Some(at);
        self.last_error = None;
    }

    /// Keeps the previous document so it can still be served as stale.
    pub fn record_failure(&mut self, err: &Error) {
        self.last_error = Some(err.to_string());
    }

    pub fn last_success(&self) -> Option<DateTime<Tz>> {
        self.last_success
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn source(&self) -> HoursSource {
        match (&self.hours, &self.last_error) {
            (None, _) => HoursSource::Fallback,
            (Some(_), None) => HoursSource::Live,
            (Some(_), Some(_)) => HoursSource::Stale,
        }
    }

    /// The held document, or the static approximation if there is none.
    pub fn hours_or_fallback(&self) -> (OpeningHours, HoursSource) {
        match &self.hours {
            Some(hours) => (hours.clone(), self.source()),
            None => (fallback_hours(), HoursSource::Fallback),
        }
    }
}

/// Polls the management API for the hours document.
pub struct Feed {
    url: String,
    api_key: Option<String>,
    refresh_interval: Duration,
    client: Client,
    state: SharedFeed,
}

impl Feed {
    pub fn setup(config: &Config, state: SharedFeed) -> HoursResult<Self> {
        config.validate()?;
        Ok(Self {
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            refresh_interval: config.refresh_interval(),
            client: Client::new(),
            state,
        })
    }

    pub async fn run(self) {
        info!(url = %self.url, interval = ?self.refresh_interval, "Polling hours feed");
        loop {
            match self.fetch().await {
                Ok(hours) => {
                    self.write_state(|state| state.record_success(hours, uk_datetime_now()));
                }
                Err(Error::RateLimited(delay)) => {
                    warn!(?delay, "hours feed rate limited, backing off");
                    self.write_state(|state| state.record_failure(&Error::RateLimited(delay)));
                    sleep_until(Instant::now() + delay).await;
                    continue;
                }
                Err(err) => {
                    error!(%err, "could not refresh hours feed");
                    self.write_state(|state| state.record_failure(&err));
                }
            }
            self.standard_sleep().await;
        }
    }

    async fn standard_sleep(&self) {
        sleep_until(Instant::now() + self.refresh_interval).await;
    }

    fn write_state(&self, update: impl FnOnce(&mut FeedState)) {
        match self.state.write() {
            Ok(mut state) => update(&mut state),
            Err(_) => error!("hours feed state lock poisoned"),
        }
    }

    fn get_request(&self) -> RequestBuilder {
        let request = self
            .client
            .get(&self.url)
            .header(CACHE_CONTROL, "no-cache");
        match &self.api_key {
            Some(key) => request.header("X-API-Key", key),
            None => request,
        }
    }

    pub async fn fetch(&self) -> HoursResult<OpeningHours> {
        let response = self.get_request().send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited(retry_after(
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|value| value.to_str().ok()),
            )));
        }
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }
        let body = response.text().await?;
        OpeningHours::from_json(&body)
    }
}

/// Seconds from a `Retry-After` header, or the default back-off.
fn retry_after(header: Option<&str>) -> Duration {
    header
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}
