//! Telegram notifications, direct or through the relay script.

use crate::clock::LocalClock;
use crate::errors::StoreError;
use crate::query::Adapter;
use crate::settings::{Settings, DEFAULT_RELAY_URL, RELAY_URL};
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub const RELAY_TIMEOUT: Duration = Duration::from_secs(10);
pub const TEST_RELAY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("messaging API returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid relay URL {0}")]
    RelayUrl(String),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    ClockIn,
    ClockOut,
}

impl ClockEvent {
    pub fn setting_name(self) -> &'static str {
        match self {
            Self::ClockIn => "notify_clock_in",
            Self::ClockOut => "notify_clock_out",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::ClockIn => "Clock-in",
            Self::ClockOut => "Clock-out",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClockNotice {
    pub event: ClockEvent,
    pub employee: String,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub line_name: Option<String>,
    pub by_admin: bool,
}

impl ClockNotice {
    pub fn new(event: ClockEvent, employee: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            event,
            employee: employee.into(),
            at,
            note: None,
            lat: None,
            lon: None,
            line_name: None,
            by_admin: false,
        }
    }

    fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }
}

/// Body the relay script expects in its `data` parameter.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RelayPayload {
    pub message: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

impl RelayPayload {
    pub fn new(message: &str, chat_id: &str, token: &str, lat: Option<f64>, lon: Option<f64>) -> Self {
        // coordinates travel only as a pair
        let (lat, lon) = match lat.zip(lon) {
            Some((lat, lon)) => (Some(lat), Some(lon)),
            None => (None, None),
        };
        Self {
            message: message.to_string(),
            chat_id: chat_id.to_string(),
            token: token.to_string(),
            lat,
            lon,
        }
    }
}

pub fn compose_message(clock: &LocalClock, notice: &ClockNotice) -> String {
    let mut message = format!("⏱ {}", notice.event.title());
    if notice.by_admin {
        message.push_str(" (recorded by admin)");
    }
    message.push('\n');
    message.push_str(&format!("👤 Name: *{}*\n", notice.employee));
    message.push_str(&format!("📅 Date: *{}*\n", clock.long_date(notice.at)));
    message.push_str(&format!("🕒 Time: *{}*\n", clock.time_of_day(notice.at)));

    if let Some(line_name) = notice.line_name.as_deref().filter(|name| !name.is_empty()) {
        message.push_str(&format!("💬 LINE name: *{line_name}*\n"));
    }
    if notice.event == ClockEvent::ClockIn || notice.by_admin {
        if let Some(note) = notice.note.as_deref().filter(|note| !note.is_empty()) {
            message.push_str(&format!("📝 Note: *{note}*\n"));
        }
    }
    if notice.by_admin {
        return message;
    }

    match notice.coordinates() {
        Some((lat, lon)) => {
            message.push_str(&format!("📍 Location: *{lat}, {lon}*\n"));
            message.push_str(&format!(
                "🗺 Map: [open map](https://www.google.com/maps/place/{lat},{lon})"
            ));
        }
        None => message.push_str("📍 Location: *not available*"),
    }
    message
}

pub fn with_location(message: &str, lat: Option<f64>, lon: Option<f64>) -> String {
    match lat.zip(lon) {
        Some((lat, lon)) => format!("{message}\nLocation: https://www.google.com/maps?q={lat},{lon}"),
        None => message.to_string(),
    }
}

pub fn relay_request_url(relay_url: &str, payload: &RelayPayload) -> Result<Url, NotifyError> {
    let data = serde_json::to_string(payload)?;
    Url::parse_with_params(relay_url.trim(), &[("opt", "sendToTelegram"), ("data", data.as_str())])
        .map_err(|_| NotifyError::RelayUrl(relay_url.to_string()))
}

#[derive(Clone)]
pub struct Notifier {
    http: Client,
    api_base: String,
    db: Adapter,
    timeout: Duration,
}

impl Notifier {
    pub fn new(api_base: &str, timeout: Duration, db: Adapter) -> Result<Self, NotifyError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            db,
            timeout,
        })
    }

    /// Delivers in the background; the caller never waits on the outcome.
    pub fn spawn(&self, notice: ClockNotice) {
        let notifier = self.clone();
        tokio::spawn(async move {
            match notifier.deliver(notice).await {
                Ok(0) => {}
                Ok(sent) => info!(sent, "notification delivered"),
                Err(err) => error!("notification failed: {err}"),
            }
        });
    }

    /// Sends the notice to every active group when its setting is on.
    /// Returns the number of groups reached.
    pub async fn deliver(&self, notice: ClockNotice) -> Result<usize, NotifyError> {
        let settings = Settings::load(&self.db).await?;
        if !settings.flag(notice.event.setting_name()) {
            return Ok(0);
        }
        let message = compose_message(&self.db.clock(), &notice);
        let (lat, lon) = if notice.by_admin { (None, None) } else { (notice.lat, notice.lon) };
        self.broadcast(&settings, &message, lat, lon).await
    }

    pub async fn broadcast(
        &self,
        settings: &Settings,
        message: &str,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<usize, NotifyError> {
        let Some(token) = settings.get("telegram_bot_token") else {
            warn!("telegram_bot_token is not set; notification skipped");
            return Ok(0);
        };
        let groups: Vec<_> = settings
            .notify_groups()
            .into_iter()
            .filter(|group| group.active && !group.chat_id.is_empty())
            .collect();
        if groups.is_empty() {
            warn!("no active Telegram groups configured");
            return Ok(0);
        }

        let relay_url = settings
            .uses_relay()
            .then(|| settings.get(RELAY_URL).unwrap_or(DEFAULT_RELAY_URL).to_string());

        let mut sends = JoinSet::new();
        for group in groups {
            let notifier = self.clone();
            let payload = RelayPayload::new(message, &group.chat_id, token, lat, lon);
            let relay_url = relay_url.clone();
            sends.spawn(async move {
                let result = match relay_url {
                    Some(url) => notifier.send_relay(&url, &payload, RELAY_TIMEOUT).await,
                    None => {
                        let text = with_location(&payload.message, payload.lat, payload.lon);
                        notifier.send_direct(&payload.token, &payload.chat_id, &text).await
                    }
                };
                (group.name, result)
            });
        }

        let mut sent = 0;
        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((_, Ok(_))) => sent += 1,
                Ok((group, Err(err))) => error!(%group, "failed to notify group: {err}"),
                Err(err) => error!("notification task panicked: {err}"),
            }
        }
        Ok(sent)
    }

    /// `POST {api}/bot{token}/sendMessage`
    pub async fn send_direct(&self, token: &str, chat_id: &str, text: &str) -> Result<Value, NotifyError> {
        let url = format!("{}/bot{token}/sendMessage", self.api_base);
        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = body
                .get("description")
                .or_else(|| body.get("message"))
                .and_then(Value::as_str)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
                .to_string();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }

    /// `GET {relay}?opt=sendToTelegram&data=<json>`; the relay may answer
    /// with JSON or plain text.
    pub async fn send_relay(
        &self,
        relay_url: &str,
        payload: &RelayPayload,
        timeout: Duration,
    ) -> Result<Value, NotifyError> {
        let url = relay_request_url(relay_url, payload)?;
        let response = self.http.get(url).timeout(timeout).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
