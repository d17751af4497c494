//! HTTP access to the Kahunas platform.
//!
//! Hands raw payloads to the formatter; no retry or refresh logic.

use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE};
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::{AuthSession, Config};
use crate::error::ApiError;

const CALENDAR_EVENTS_PATH: &str = "/api/v2/calendar/events";
const PROGRAM_PATH: &str = "/api/v2/program";
const PROGRAM_PREVIEW_PATH: &str = "/coach/program/preview";
const CHECKINS_PATH: &str = "/api/v2/checkin/list";

/// Authenticated client for the platform's private endpoints
pub struct KahunasClient {
    http: Client,
    base_url: String,
}

fn auth_headers(session: &AuthSession) -> Result<HeaderMap, ApiError> {
    let invalid = |what: &str| ApiError::Decode {
        url: "session".to_string(),
        message: format!("{what} contains invalid header characters"),
    };

    let mut headers = HeaderMap::new();
    if let Some(token) = session.token.as_deref().filter(|t| !t.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| invalid("token"))?;
        headers.insert(AUTHORIZATION, value);
    }
    if !session.cookie.is_empty() {
        let value = HeaderValue::from_str(&session.cookie).map_err(|_| invalid("cookie"))?;
        headers.insert(COOKIE, value);
    }
    Ok(headers)
}

/// Unwrap `{data: [...]}` / `{events: [...]}` envelopes around an event list
pub fn unwrap_event_list(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut record) => ["data", "events", "items"]
            .iter()
            .find_map(|k| match record.remove(*k) {
                Some(Value::Array(items)) => Some(items),
                Some(nested @ Value::Object(_)) => Some(unwrap_event_list(nested)),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Distinct program uuids referenced by the events, in first-seen order
pub fn program_uuids(events: &[Value]) -> Vec<String> {
    let mut uuids: Vec<String> = Vec::new();
    for uuid in events.iter().filter_map(|e| e.get("program").and_then(Value::as_str)) {
        if !uuids.iter().any(|u| u == uuid) {
            uuids.push(uuid.to_string());
        }
    }
    uuids
}

impl KahunasClient {
    pub fn new(config: &Config, session: &AuthSession) -> Result<Self, ApiError> {
        let http = Client::builder()
            .default_headers(auth_headers(session)?)
            .user_agent(concat!("kahunas-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response, ApiError> {
        debug!(url, "GET");
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status, url));
        }
        Ok(response)
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let response = self.get(url, query).await?;
        response.json::<Value>().await.map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Calendar events between `from` and `to` (inclusive)
    pub async fn calendar_events(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        timezone: &str,
    ) -> Result<Vec<Value>, ApiError> {
        let url = self.url(CALENDAR_EVENTS_PATH);
        let query = [
            ("start", from.format("%Y-%m-%d").to_string()),
            ("end", to.format("%Y-%m-%d").to_string()),
            ("timezone", timezone.to_string()),
        ];
        let events = unwrap_event_list(self.get_json(&url, &query).await?);
        info!(count = events.len(), %from, %to, "Fetched calendar events");
        Ok(events)
    }

    /// Program payload: the JSON API object, or the preview page HTML when the
    /// API has nothing usable
    pub async fn program_details(&self, uuid: &str) -> Result<Value, ApiError> {
        let api_url = format!("{}/{}", self.url(PROGRAM_PATH), uuid);
        match self.get_json(&api_url, &[]).await {
            Ok(Value::Object(mut record)) => {
                // Some responses wrap the program under `data`
                if let Some(inner @ Value::Object(_)) = record.remove("data") {
                    return Ok(inner);
                }
                return Ok(Value::Object(record));
            }
            Ok(_) => debug!(uuid, "Program API returned no object"),
            Err(err) if err.is_unauthorized() => return Err(err),
            Err(err) => debug!(uuid, error = %err, "Program API failed"),
        }

        let preview_url = format!("{}/{}", self.url(PROGRAM_PREVIEW_PATH), uuid);
        let html = self.get(&preview_url, &[]).await?.text().await?;
        Ok(Value::String(html))
    }

    /// Payloads for every program the events reference; failures are skipped
    pub async fn program_details_for(&self, events: &[Value]) -> Result<BTreeMap<String, Value>, ApiError> {
        let mut programs = BTreeMap::new();
        for uuid in program_uuids(events) {
            match self.program_details(&uuid).await {
                Ok(payload) => {
                    programs.insert(uuid, payload);
                }
                Err(err) if err.is_unauthorized() => return Err(err),
                Err(err) => warn!(uuid = %uuid, error = %err, "Skipping program"),
            }
        }
        info!(count = programs.len(), "Fetched program details");
        Ok(programs)
    }

    /// Raw checkins list
    pub async fn checkins(&self) -> Result<Value, ApiError> {
        self.get_json(&self.url(CHECKINS_PATH), &[]).await
    }
}
