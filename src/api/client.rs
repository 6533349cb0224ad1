use super::events::{SseDecoder, StreamEvent};
use super::notify::{NoticeLevel, Notifier};
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::types::{ChatRequest, Message, SessionSummary};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::UnboundedSender;

const CHAT_STREAM_PATH: &[&str] = &["api", "chat", "stream"];

/// Opens a streamed chat exchange.
///
/// Implementations push decoded events in arrival order and return once the
/// stream is over. Dropping `events` is how the consumer learns the transport
/// is done.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn stream_chat(
        &self,
        request: ChatRequest,
        events: UnboundedSender<StreamEvent>,
    ) -> ApiResult<()>;

    /// Persisted messages of a session, carrying server ids.
    async fn fetch_messages(&self, session_id: &str) -> ApiResult<Vec<Message>>;
}

/// HTTP client for the Jarvis backend.
pub struct JarvisClient {
    http: reqwest::Client,
    base_url: String,
    notifier: RwLock<Arc<dyn Notifier>>,
}

impl JarvisClient {
    pub fn new(base_url: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            notifier: RwLock::new(notifier),
        }
    }

    pub fn from_config(config: &AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(config.api_base_url.clone(), notifier)
    }

    /// Swaps the handler that receives user-facing notices.
    pub fn set_notifier(&self, notifier: Arc<dyn Notifier>) {
        *self.notifier.write().unwrap_or_else(PoisonError::into_inner) = notifier;
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        let notifier = self
            .notifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        notifier.notify(level, message);
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {}", self.base_url, err)))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn list_sessions(&self, user_id: &str) -> ApiResult<Vec<SessionSummary>> {
        self.get_json(
            &["api", "sessions"],
            &[("user_id", user_id)],
            "Couldn't load conversations",
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
        failure_notice: &str,
    ) -> ApiResult<T> {
        let result = async {
            let url = self.endpoint(segments)?;
            let res = self.http.get(url).query(query).send().await?;
            let status = res.status();
            let body = res.text().await?;
            if !status.is_success() {
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(serde_json::from_str(&body)?)
        }
        .await;

        if let Err(err) = &result {
            tracing::error!("{}: {}", failure_notice, err);
            self.notify(NoticeLevel::Error, failure_notice);
        }
        result
    }

    async fn open_stream(
        &self,
        request: &ChatRequest,
        events: &UnboundedSender<StreamEvent>,
    ) -> ApiResult<()> {
        let res = self
            .http
            .post(self.endpoint(CHAT_STREAM_PATH)?)
            .header("accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut decoder = SseDecoder::new();
        let mut stream = res.bytes_stream();
        while let Some(item) = stream.next().await {
            let bytes = item?;
            for event in decoder.push(&bytes) {
                if forward(events, event) {
                    return Ok(());
                }
            }
        }
        for event in decoder.finish() {
            if forward(events, event) {
                break;
            }
        }
        Ok(())
    }
}

/// Sends one event on; `true` means there is nothing left to read.
fn forward(events: &UnboundedSender<StreamEvent>, event: StreamEvent) -> bool {
    let terminal = event.is_terminal();
    if events.send(event).is_err() {
        tracing::debug!("stream consumer went away");
        return true;
    }
    terminal
}

#[async_trait]
impl ChatBackend for JarvisClient {
    async fn stream_chat(
        &self,
        request: ChatRequest,
        events: UnboundedSender<StreamEvent>,
    ) -> ApiResult<()> {
        tracing::debug!(session_id = ?request.session_id, "opening chat stream");
        let result = self.open_stream(&request, &events).await;
        if let Err(err) = &result {
            tracing::error!("chat stream failed: {}", err);
            self.notify(NoticeLevel::Error, "The connection to Jarvis was interrupted.");
        }
        result
    }

    async fn fetch_messages(&self, session_id: &str) -> ApiResult<Vec<Message>> {
        self.get_json(
            &["api", "sessions", session_id, "messages"],
            &[],
            "Couldn't load messages",
        )
        .await
    }
}
