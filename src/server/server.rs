use bytes::Bytes;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use http_body_util::Full;
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use hyper::{body::Incoming, service::Service, Method, Request, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error};
use url_escape::decode;

use std::{collections::HashMap, future::Future, pin::Pin};

use crate::feed::feed::{HoursSource, SharedFeed};
use crate::timing::fallback::FALLBACK_MESSAGE;
use crate::timing::schedule::OpeningHours;
use crate::timing::status::evaluate;
use crate::timing::uk_datetime_now::{to_uk, uk_datetime_now};
use crate::ISO_FORMAT_DATE;

use super::response::{FreshnessView, StatusResponse, WeekResponse};

const WEEK_DAYS: u32 = 7;
const MAX_CACHE_SECONDS: i64 = 60;

/// The Server
///
/// Serves the derived venue status from the latest hours document. Every
/// request clones the document out of the shared feed state and evaluates
/// it without holding the lock.
///
/// Implements hyper's `Service` so each connection task gets its own clone.
#[derive(Clone)]
pub struct Server {
    feed: SharedFeed,
}

impl Server {
    pub fn setup(feed: SharedFeed) -> Self {
        Self { feed }
    }

    /// Parses the query parameters and returns a `hashmap` of key pair values
    /// Returns `None` if the parameters are malformed
    fn parse_params(text: &str) -> Option<HashMap<String, String>> {
        let mut map: HashMap<String, String> = HashMap::new();
        for pairs in text.split('&').filter(|pair| !pair.is_empty()) {
            let mut iterator = pairs.split('=');
            map.insert(
                iterator.next()?.to_string(),
                decode(iterator.next()?).to_string(),
            );
        }
        Some(map)
    }

    fn current_hours(&self) -> Option<(OpeningHours, FreshnessView)> {
        match self.feed.read() {
            Ok(state) => {
                let (hours, _) = state.hours_or_fallback();
                Some((hours, FreshnessView::new(&state)))
            }
            Err(_) => {
                error!("hours feed state lock poisoned");
                None
            }
        }
    }

    /// The /api/status endpoint.
    ///
    /// Evaluates the status now, or at the RFC 3339 instant given as `at`.
    fn status(&self, query: Option<&str>) -> Response<Full<Bytes>> {
        let params = match query.map(Self::parse_params) {
            None => HashMap::new(),
            Some(Some(params)) => params,
            Some(None) => return Self::bad_request("Malformed Parameters."),
        };
        let at: DateTime<Tz> = match params.get("at") {
            None => uk_datetime_now(),
            Some(at) => match DateTime::parse_from_rfc3339(at) {
                Ok(at) => to_uk(&at),
                Err(_) => return Self::bad_request("Malformed at. Expected RFC 3339."),
            },
        };
        let Some((hours, freshness)) = self.current_hours() else {
            return Self::server_error("Hours unavailable");
        };

        let source = freshness.source();
        let status = evaluate(&hours, &at);
        let today = hours.resolve(&at);
        let notice = (source == HoursSource::Fallback).then_some(FALLBACK_MESSAGE);
        let max_age = (status.next_change().at - at)
            .num_seconds()
            .clamp(1, MAX_CACHE_SECONDS);
        debug!(%at, ?source, is_open = status.is_open, "served status");
        Self::ok_data(&StatusResponse::new(&status, &today, freshness, notice), max_age)
    }

    /// The /api/hours endpoint.
    ///
    /// Lists a week of effective hours starting today, or at `from`.
    fn week(&self, query: Option<&str>) -> Response<Full<Bytes>> {
        let params = match query.map(Self::parse_params) {
            None => HashMap::new(),
            Some(Some(params)) => params,
            Some(None) => return Self::bad_request("Malformed Parameters."),
        };
        let today = uk_datetime_now().date_naive();
        let from = match params.get("from") {
            None => today,
            Some(from) => match NaiveDate::parse_from_str(from, ISO_FORMAT_DATE) {
                Ok(date) => date,
                Err(_) => return Self::bad_request("Malformed Date"),
            },
        };
        let Some((hours, freshness)) = self.current_hours() else {
            return Self::server_error("Hours unavailable");
        };
        let days = hours.upcoming(from, WEEK_DAYS);
        Self::ok_data(&WeekResponse::new(&days, today, freshness), MAX_CACHE_SECONDS)
    }

    /// Routes a request by method, path and raw query string.
    pub fn handle(&self, method: &Method, path: &str, query: Option<&str>) -> Response<Full<Bytes>> {
        match (method, path) {
            (&Method::GET, "/api/status") => self.status(query),
            (&Method::GET, "/api/hours") => self.week(query),
            _ => Self::not_found(""),
        }
    }

    fn json_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
        let mut res = Response::new(Full::new(body));
        *res.status_mut() = status;
        res.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        res
    }

    /// Return a 200 OK response with the data provided.
    fn ok_data<T: Serialize>(body: &T, max_age: i64) -> Response<Full<Bytes>> {
        let data = match serde_json::to_string(body) {
            Ok(data) => data,
            Err(err) => return Self::server_error(&err.to_string()),
        };
        let mut res = Self::json_response(StatusCode::OK, Bytes::from(data));
        if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", max_age)) {
            res.headers_mut().insert(CACHE_CONTROL, value);
        }
        res
    }

    fn error_body(message: &str) -> Bytes {
        Bytes::from(serde_json::json!({ "error": message }).to_string())
    }

    /// Return a 500 Internal Server Error response with the message provided.
    fn server_error(message: &str) -> Response<Full<Bytes>> {
        Self::json_response(StatusCode::INTERNAL_SERVER_ERROR, Self::error_body(message))
    }

    /// Return a 404 Not Found response with the message provided. The message here is optional.
    /// Leave it empty for no message.
    fn not_found(message: &str) -> Response<Full<Bytes>> {
        let body = if message.is_empty() {
            Bytes::new()
        } else {
            Self::error_body(message)
        };
        Self::json_response(StatusCode::NOT_FOUND, body)
    }

    /// Return a 400 Bad Request response with the message provided.
    fn bad_request(message: &str) -> Response<Full<Bytes>> {
        Self::json_response(StatusCode::BAD_REQUEST, Self::error_body(message))
    }
}

impl Service<Request<Incoming>> for Server {
    type Response = Response<Full<Bytes>>;
    type Error = hyper::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let res: Result<Self::Response, Self::Error> =
            Ok(self.handle(req.method(), req.uri().path(), req.uri().query()));
        Box::pin(async move { res })
    }
}
