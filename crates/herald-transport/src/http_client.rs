//! HTTP client for the upstream Bot API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use herald_core::{
    ApiError, ApiResult, Context, Message, Update, UpdateFetcher, User, WebhookRegistrar,
};

/// Default upstream base URL.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Response envelope every Bot API method returns.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesParams {
    offset: i64,
    limit: u32,
    timeout: u32,
}

#[derive(Debug, Serialize)]
struct SendMessageParams<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SetWebhookParams<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_token: Option<&'a str>,
}

/// Bot API client over HTTP.
///
/// All calls are `POST {base}/bot{token}/{method}` with a JSON body and race
/// against the supplied [`Context`].
#[derive(Clone)]
pub struct HttpBotApi {
    client: Client,
    base_url: String,
    token: String,
    limit: u32,
    long_poll: Duration,
}

impl HttpBotApi {
    /// Creates a client for `token` against `base_url`.
    ///
    /// `getUpdates` is issued as a short poll (`timeout = 0`) by default; use
    /// [`with_long_poll`](Self::with_long_poll) to hold requests open upstream.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> ApiResult<Self> {
        Self::build(base_url.into(), token.into(), 100, Duration::ZERO)
    }

    fn build(base_url: String, token: String, limit: u32, long_poll: Duration) -> ApiResult<Self> {
        let client = ClientBuilder::new()
            .timeout(long_poll + Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            limit,
            long_poll,
        })
    }

    /// Sets the maximum batch size requested from `getUpdates` (1..=100).
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, 100);
        self
    }

    /// Sets the upstream long-poll timeout.
    pub fn with_long_poll(self, long_poll: Duration) -> ApiResult<Self> {
        Self::build(self.base_url, self.token, self.limit, long_poll)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Calls `method` and unwraps the response envelope.
    pub async fn call<P, R>(&self, ctx: &Context, method: &str, params: &P) -> ApiResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        trace!(method, "Calling Bot API");
        tokio::select! {
            res = self.send(method, params) => res,
            err = ctx.done() => Err(err.into()),
        }
    }

    async fn send<P, R>(&self, method: &str, params: &P) -> ApiResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.method_url(method))
            .json(params)
            .send()
            .await
            // reqwest errors embed the URL, which carries the token.
            .map_err(|e| ApiError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.without_url().to_string()))?;

        let envelope: Envelope<R> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    description: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !status.is_success() || !envelope.ok {
            debug!(method, status = status.as_u16(), "Bot API call failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                description: envelope.description.unwrap_or_default(),
            });
        }

        envelope
            .result
            .ok_or_else(|| ApiError::Decode(format!("{method}: response has no result")))
    }

    /// Fetches updates with `update_id >= offset`.
    pub async fn get_updates(&self, ctx: &Context, offset: i64) -> ApiResult<Vec<Update>> {
        let params = GetUpdatesParams {
            offset,
            limit: self.limit,
            timeout: self.long_poll.as_secs() as u32,
        };
        self.call(ctx, "getUpdates", &params).await
    }

    /// Points the upstream at `url`.
    pub async fn set_webhook(
        &self,
        ctx: &Context,
        url: &str,
        secret_token: Option<&str>,
    ) -> ApiResult<bool> {
        self.call(ctx, "setWebhook", &SetWebhookParams { url, secret_token })
            .await
    }

    /// Sends a plain text message to `chat_id`.
    pub async fn send_message(&self, ctx: &Context, chat_id: i64, text: &str) -> ApiResult<Message> {
        self.call(ctx, "sendMessage", &SendMessageParams { chat_id, text })
            .await
    }

    /// Returns the bot's own account.
    pub async fn get_me(&self, ctx: &Context) -> ApiResult<User> {
        self.call(ctx, "getMe", &serde_json::json!({})).await
    }
}

impl std::fmt::Debug for HttpBotApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBotApi")
            .field("base_url", &self.base_url)
            .field("token", &"***")
            .field("limit", &self.limit)
            .field("long_poll", &self.long_poll)
            .finish()
    }
}

#[async_trait]
impl UpdateFetcher for HttpBotApi {
    async fn get_updates(&self, ctx: &Context, offset: i64) -> ApiResult<Vec<Update>> {
        HttpBotApi::get_updates(self, ctx, offset).await
    }
}

#[async_trait]
impl WebhookRegistrar for HttpBotApi {
    async fn set_webhook(
        &self,
        ctx: &Context,
        url: &str,
        secret_token: Option<&str>,
    ) -> ApiResult<()> {
        HttpBotApi::set_webhook(self, ctx, url, secret_token)
            .await
            .map(|_| ())
    }
}
