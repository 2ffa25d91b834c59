use serde::Deserialize;
use thiserror::Error;

use crate::storage::config::DEFAULT_CALENDAR_API;

/// A calendar list entry exactly as Google returned it.
pub type CalendarEntry = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Authentication failed")]
    AuthenticationFailed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarEntry>,
    next_page_token: Option<String>,
}

pub struct GoogleCalendarClient {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl GoogleCalendarClient {
    pub fn new(access_token: String) -> Self {
        Self {
            base_url: DEFAULT_CALENDAR_API.to_string(),
            access_token,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub async fn list_calendars(&self) -> Result<Vec<CalendarEntry>, ApiError> {
        let url = format!("{}/users/me/calendarList", self.base_url);
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client
                .get(&url)
                .bearer_auth(&self.access_token);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await?;
            let status = response.status();
            tracing::info!("List calendars response status: {}", status);

            if status == 401 {
                tracing::error!("Authentication failed when listing calendars");
                return Err(ApiError::AuthenticationFailed);
            }

            if status == 429 {
                tracing::warn!("Rate limit exceeded");
                return Err(ApiError::RateLimited);
            }

            if !status.is_success() {
                let body = response.text().await?;
                tracing::error!("Failed to list calendars. Status: {}, Body: {}", status, body);
                return Err(ApiError::RequestError(format!("Status {}: {}", status, body)));
            }

            let page: CalendarListResponse = response.json().await?;
            calendars.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::info!("Fetched {} calendars successfully", calendars.len());
        Ok(calendars)
    }
}
