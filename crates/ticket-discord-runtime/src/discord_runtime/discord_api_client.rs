//! Discord REST API client used for ticket channel provisioning and messages.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use ticket_lifecycle::ProvisioningError;

use super::discord_permissions::PermissionOverwrite;

const DISCORD_TEXT_CHANNEL_TYPE: u8 = 0;
const RETRY_ATTEMPT_HEADER: &str = "x-ticketbot-retry-attempt";
const MAX_RETRY_DELAY_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub(super) enum DiscordApiError {
    #[error("discord api {operation} failed with status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("discord api {operation} request failed")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode discord {operation}: {message}")]
    Decode { operation: String, message: String },
}

impl From<DiscordApiError> for ProvisioningError {
    fn from(error: DiscordApiError) -> Self {
        match error {
            DiscordApiError::Status { status, body, .. } => Self::Http { status, body },
            DiscordApiError::Transport { operation, source } => {
                Self::Transport(format!("{operation}: {source}"))
            }
            DiscordApiError::Decode { operation, message } => {
                Self::InvalidResponse(format!("{operation}: {message}"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct DiscordCurrentUser {
    pub(super) id: String,
    pub(super) username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct DiscordRole {
    pub(super) id: String,
    /// Decimal permission bitset.
    pub(super) permissions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct DiscordGuild {
    pub(super) owner_id: String,
    #[serde(default)]
    pub(super) roles: Vec<DiscordRole>,
}

#[derive(Debug, Clone, Deserialize)]
struct DiscordChannelResponse {
    id: String,
}

#[derive(Debug, Clone, Serialize)]
pub(super) struct CreateGuildChannelPayload {
    pub(super) name: String,
    #[serde(rename = "type")]
    pub(super) channel_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) parent_id: Option<String>,
    pub(super) permission_overwrites: Vec<PermissionOverwrite>,
}

impl CreateGuildChannelPayload {
    pub(super) fn text_channel(
        name: String,
        topic: Option<String>,
        parent_id: Option<u64>,
        permission_overwrites: Vec<PermissionOverwrite>,
    ) -> Self {
        Self {
            name,
            channel_type: DISCORD_TEXT_CHANNEL_TYPE,
            topic,
            parent_id: parent_id.map(|id| id.to_string()),
            permission_overwrites,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which failures a request may be replayed after.
pub(super) enum RetryPolicy {
    /// Replays on rate limits, 5xx and transport failures.
    Idempotent,
    /// Replays only when Discord provably did not act: 429 or a failed connect.
    RejectedOnly,
}

impl RetryPolicy {
    fn allows_status(self, status: u16) -> bool {
        match self {
            Self::Idempotent => is_retryable_discord_status(status),
            Self::RejectedOnly => status == 429,
        }
    }

    fn allows_transport_error(self, error: &reqwest::Error) -> bool {
        match self {
            Self::Idempotent => is_retryable_transport_error(error),
            Self::RejectedOnly => error.is_connect(),
        }
    }
}

#[derive(Clone)]
pub(super) struct DiscordApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl DiscordApiClient {
    pub(super) fn new(
        api_base: String,
        bot_token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("DiscordBot (ticketbot, 0.1)"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create discord api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    pub(super) async fn current_user(&self) -> Result<DiscordCurrentUser, DiscordApiError> {
        let url = format!("{}/users/@me", self.api_base);
        let response = self
            .send_with_retry("get current user", RetryPolicy::Idempotent, || {
                self.http
                    .get(&url)
                    .header(reqwest::header::AUTHORIZATION, self.authorization())
            })
            .await?;
        decode_json(response, "get current user").await
    }

    pub(super) async fn guild(&self, guild_id: u64) -> Result<DiscordGuild, DiscordApiError> {
        let url = format!("{}/guilds/{guild_id}", self.api_base);
        let response = self
            .send_with_retry("get guild", RetryPolicy::Idempotent, || {
                self.http
                    .get(&url)
                    .header(reqwest::header::AUTHORIZATION, self.authorization())
            })
            .await?;
        decode_json(response, "get guild").await
    }

    pub(super) async fn create_guild_channel(
        &self,
        guild_id: u64,
        payload: &CreateGuildChannelPayload,
    ) -> Result<String, DiscordApiError> {
        let url = format!("{}/guilds/{guild_id}/channels", self.api_base);
        let response = self
            .send_with_retry("create channel", RetryPolicy::RejectedOnly, || {
                self.http
                    .post(&url)
                    .header(reqwest::header::AUTHORIZATION, self.authorization())
                    .json(payload)
            })
            .await?;
        let channel: DiscordChannelResponse = decode_json(response, "create channel").await?;
        if channel.id.trim().is_empty() {
            return Err(DiscordApiError::Decode {
                operation: "create channel".to_string(),
                message: "response missing channel id".to_string(),
            });
        }
        Ok(channel.id)
    }

    pub(super) async fn edit_channel_permissions(
        &self,
        channel_id: &str,
        overwrite: &PermissionOverwrite,
    ) -> Result<(), DiscordApiError> {
        let url = format!(
            "{}/channels/{channel_id}/permissions/{}",
            self.api_base, overwrite.id
        );
        let payload = json!({
            "type": overwrite.kind,
            "allow": overwrite.allow,
            "deny": overwrite.deny,
        });
        self.send_with_retry("edit channel permissions", RetryPolicy::Idempotent, || {
            self.http
                .put(&url)
                .header(reqwest::header::AUTHORIZATION, self.authorization())
                .json(&payload)
        })
        .await?;
        Ok(())
    }

    pub(super) async fn delete_channel(&self, channel_id: &str) -> Result<(), DiscordApiError> {
        let url = format!("{}/channels/{channel_id}", self.api_base);
        self.send_with_retry("delete channel", RetryPolicy::Idempotent, || {
            self.http
                .delete(&url)
                .header(reqwest::header::AUTHORIZATION, self.authorization())
        })
        .await?;
        Ok(())
    }

    pub(super) async fn create_message(
        &self,
        channel_id: &str,
        payload: &Value,
    ) -> Result<(), DiscordApiError> {
        let url = format!("{}/channels/{channel_id}/messages", self.api_base);
        self.send_with_retry("create message", RetryPolicy::RejectedOnly, || {
            self.http
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, self.authorization())
                .json(payload)
        })
        .await?;
        Ok(())
    }

    async fn send_with_retry<F>(
        &self,
        operation: &str,
        policy: RetryPolicy,
        mut builder: F,
    ) -> Result<reqwest::Response, DiscordApiError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts && policy.allows_status(status.as_u16())
                    {
                        tracing::debug!(
                            operation,
                            attempt,
                            status = status.as_u16(),
                            "retrying discord api request"
                        );
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    return Err(DiscordApiError::Status {
                        operation: operation.to_string(),
                        status: status.as_u16(),
                        body: truncate_for_error(&body, 800),
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && policy.allows_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(DiscordApiError::Transport {
                        operation: operation.to_string(),
                        source: error,
                    });
                }
            }
        }
    }
}

async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
    operation: &str,
) -> Result<T, DiscordApiError> {
    response
        .json::<T>()
        .await
        .map_err(|error| DiscordApiError::Decode {
            operation: operation.to_string(),
            message: error.to_string(),
        })
}

pub(super) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?;
    let seconds = raw.trim().parse::<f64>().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(seconds))
}

pub(super) fn retry_delay(
    base_delay_ms: u64,
    attempt: usize,
    retry_after: Option<Duration>,
) -> Duration {
    if let Some(delay) = retry_after {
        return delay
            .max(Duration::from_millis(base_delay_ms))
            .min(Duration::from_millis(MAX_RETRY_DELAY_MS));
    }
    let exponent = attempt.saturating_sub(1).min(10) as u32;
    let scaled = base_delay_ms.saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(scaled.min(MAX_RETRY_DELAY_MS))
}

fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

pub(super) fn is_retryable_discord_status(status: u16) -> bool {
    status == 429 || status >= 500
}

fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}
