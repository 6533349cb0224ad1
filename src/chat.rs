//! Conversation state and the driver for one streamed exchange.

use crate::api::{ChatBackend, StreamEvent};
use crate::config::AppConfig;
use crate::error::{ChatError, ChatResult};
use crate::render::{RenderScheduler, RenderedView};
use crate::types::{ChatRequest, Message, MessageId, Role};
use futures::future::{AbortHandle, AbortRegistration, Abortable, Aborted};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

pub const INTERRUPTED_PLACEHOLDER: &str =
    "Sorry, I couldn't complete that response. Please try again.";
const INTERRUPTED_NOTE: &str = "_The response was interrupted._";
const STOPPED_PLACEHOLDER: &str = "_Stopped._";

/// Why an exchange ended without a completion record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interruption {
    /// The user pressed stop or the view went away.
    Aborted,
    /// The transport failed or closed early.
    Failed,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conversation {
    session_id: Option<String>,
    messages: Vec<Message>,
    // Reserved id of the assistant reply currently streaming.
    active_reply: Option<MessageId>,
    last_intent: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn last_intent(&self) -> Option<&str> {
        self.last_intent.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.active_reply.is_some()
    }

    /// Records the user's message and reserves the id of the reply.
    pub fn submit(&mut self, text: &str, user_id: &str) -> ChatResult<(ChatRequest, MessageId)> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self.active_reply.is_some() {
            return Err(ChatError::ExchangeInProgress);
        }

        self.messages.push(Message::user(trimmed));
        let reply_id = MessageId::next_local();
        self.active_reply = Some(reply_id.clone());

        let request = ChatRequest {
            message: trimmed.to_string(),
            session_id: self.session_id.clone(),
            user_id: user_id.to_string(),
        };
        Ok((request, reply_id))
    }

    /// Applies one stream event. Returns the reply when its content or
    /// streaming flag changed.
    pub fn apply(&mut self, event: StreamEvent) -> Option<&Message> {
        if self.active_reply.is_none() {
            tracing::debug!("event outside of an exchange ignored");
            return None;
        }

        match event {
            StreamEvent::Session { session_id } => {
                self.session_id = Some(session_id);
                None
            }
            StreamEvent::Content { text } => {
                let reply = self.reply_mut()?;
                reply.append(&text);
                Some(&*reply)
            }
            StreamEvent::Complete { intent, agent_used } => {
                self.last_intent = intent;
                let reply = self.reply_mut()?;
                if agent_used.is_some() {
                    reply.agent_used = agent_used;
                }
                self.finish_reply()
            }
            StreamEvent::Error { message } => {
                let reply = self.reply_mut()?;
                if reply.content.trim().is_empty() {
                    reply.content = message;
                } else {
                    reply.content.push_str("\n\n");
                    reply.content.push_str(&message);
                }
                self.finish_reply()
            }
        }
    }

    /// Finalizes a reply whose stream ended without a completion record.
    /// Partial content is kept.
    pub fn interrupt(&mut self, reason: Interruption) -> Option<&Message> {
        self.active_reply.as_ref()?;
        let reply = self.reply_mut()?;
        let empty = reply.content.trim().is_empty();
        match (reason, empty) {
            (Interruption::Failed, true) => reply.content = INTERRUPTED_PLACEHOLDER.to_string(),
            (Interruption::Failed, false) => {
                reply.content.push_str("\n\n");
                reply.content.push_str(INTERRUPTED_NOTE);
            }
            (Interruption::Aborted, true) => reply.content = STOPPED_PLACEHOLDER.to_string(),
            (Interruption::Aborted, false) => {}
        }
        self.finish_reply()
    }

    /// Swaps the local list for the persisted copy. Refused while a reply is
    /// still streaming.
    pub fn replace_with_server(&mut self, session_id: String, messages: Vec<Message>) -> bool {
        if self.active_reply.is_some() {
            return false;
        }
        self.session_id = Some(session_id);
        self.messages = messages
            .into_iter()
            .map(|mut message| {
                message.is_streaming = false;
                message
            })
            .collect();
        true
    }

    // Creates the reply the first time the response produces anything.
    fn reply_mut(&mut self) -> Option<&mut Message> {
        let id = self.active_reply.clone()?;
        let index = match self.messages.iter().rposition(|m| m.id == id) {
            Some(index) => index,
            None => {
                self.messages.push(Message::assistant_placeholder(id));
                self.messages.len() - 1
            }
        };
        self.messages.get_mut(index)
    }

    fn finish_reply(&mut self) -> Option<&Message> {
        let id = self.active_reply.take()?;
        let reply = self.messages.iter_mut().rfind(|m| m.id == id)?;
        debug_assert_eq!(reply.role, Role::Assistant);
        reply.finalize();
        Some(&*reply)
    }
}

/// How a call to [`ChatSession::send`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Completed,
    Aborted,
    Interrupted,
}

/// Drives streamed exchanges for one conversation.
///
/// Every send gets a fresh [`RenderScheduler`] bound to the reply's id.
/// Renders go to `renders`; structural changes to the message list are
/// published on a watch channel.
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    user_id: String,
    debounce: Duration,
    conversation: Conversation,
    renders: mpsc::UnboundedSender<RenderedView>,
    snapshots: watch::Sender<Vec<Message>>,
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        config: &AppConfig,
        renders: mpsc::UnboundedSender<RenderedView>,
    ) -> Self {
        let (snapshots, _) = watch::channel(Vec::new());
        Self {
            backend,
            user_id: config.user_id.clone(),
            debounce: config.render_debounce,
            conversation: Conversation::new(),
            renders,
            snapshots,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.snapshots.subscribe()
    }

    fn publish_messages(&self) {
        self.snapshots
            .send_replace(self.conversation.messages().to_vec());
    }

    /// Sends `text` and consumes the reply stream until it ends.
    ///
    /// Aborting through `abort` still finalizes the reply and flushes a final
    /// render of whatever had arrived.
    pub async fn send(
        &mut self,
        text: &str,
        abort: Option<AbortRegistration>,
    ) -> ChatResult<ExchangeOutcome> {
        let (request, reply_id) = self.conversation.submit(text, &self.user_id)?;
        self.publish_messages();
        tracing::debug!(reply_id = %reply_id, "exchange started");

        let mut scheduler = RenderScheduler::new(reply_id, self.debounce, self.renders.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let backend = Arc::clone(&self.backend);
        let registration = abort.unwrap_or_else(|| AbortHandle::new_pair().1);
        let transport = Abortable::new(
            async move { backend.stream_chat(request, tx).await },
            registration,
        );

        let conversation = &mut self.conversation;
        let snapshots = &self.snapshots;
        let consume = async {
            while let Some(event) = rx.recv().await {
                let before = conversation.messages().len();
                let Some(reply) = conversation.apply(event) else {
                    continue;
                };
                let finished = !reply.is_streaming;
                scheduler.on_chunk(&reply.content, reply.is_streaming);
                if finished || conversation.messages().len() != before {
                    snapshots.send_replace(conversation.messages().to_vec());
                }
            }
        };
        let (result, ()) = tokio::join!(transport, consume);

        let (interruption, outcome) = match result {
            Ok(Ok(())) if !self.conversation.is_streaming() => {
                tracing::debug!("exchange completed");
                return Ok(ExchangeOutcome::Completed);
            }
            Ok(Ok(())) => {
                tracing::warn!("stream closed before completion");
                (Interruption::Failed, Ok(ExchangeOutcome::Interrupted))
            }
            Ok(Err(err)) => (Interruption::Failed, Err(ChatError::Api(err))),
            Err(Aborted) => {
                tracing::info!("exchange stopped by user");
                (Interruption::Aborted, Ok(ExchangeOutcome::Aborted))
            }
        };

        if let Some(reply) = self.conversation.interrupt(interruption) {
            scheduler.on_chunk(&reply.content, false);
        }
        self.publish_messages();
        outcome
    }

    /// Replaces local messages with the backend's persisted copy.
    pub async fn refresh(&mut self) -> ChatResult<bool> {
        let Some(session_id) = self.conversation.session_id().map(str::to_string) else {
            return Ok(false);
        };
        let messages = self.backend.fetch_messages(&session_id).await?;
        let replaced = self.conversation.replace_with_server(session_id, messages);
        if replaced {
            self.publish_messages();
        }
        Ok(replaced)
    }
}
