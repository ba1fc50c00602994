//! HTTP side of the event backend.
//!
//! Only what a display needs: the event snapshot used to seed the
//! slideshow, and the WebSocket URL for the live channel.

use serde::Deserialize;
use snapwall_core::EventSnapshot;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "http://localhost:8787";
pub const DEFAULT_WS_BASE: &str = "ws://localhost:8787";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

/// `{ws_base}/events/{activity_id}/ws`
pub fn websocket_url(ws_base: &str, activity_id: &str) -> String {
    format!("{}/events/{activity_id}/ws", ws_base.trim_end_matches('/'))
}

fn status_error(status: u16, body: &str) -> ApiError {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.message.is_empty() => parsed.message,
        Ok(parsed) if !parsed.error.is_empty() => parsed.error,
        _ => body.trim().to_string(),
    };
    ApiError::Status { status, message }
}

#[derive(Debug, Clone)]
pub struct EventApi {
    client: reqwest::Client,
    base_url: String,
}

impl EventApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn event_url(&self, activity_id: &str) -> String {
        format!("{}/events/{activity_id}", self.base_url)
    }

    /// `GET /events/:id`
    pub async fn get_event(&self, activity_id: &str) -> Result<EventSnapshot, ApiError> {
        let resp = self.client.get(self.event_url(activity_id)).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }

        let snapshot: EventSnapshot = resp.json().await?;
        log::debug!(
            "Event {} snapshot: {} photos, {} connections",
            snapshot.event.id,
            snapshot.photos.len(),
            snapshot.active_connections
        );
        Ok(snapshot)
    }
}
