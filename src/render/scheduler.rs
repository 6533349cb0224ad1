use super::{StreamView, render_stream};
use crate::types::MessageId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Debouncing,
    Rendered,
    /// Terminal for the message; later chunks are ignored.
    FinalRendered,
}

/// One render pass, published to whoever mounts the message.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedView {
    pub message_id: MessageId,
    pub view: StreamView,
    pub is_final: bool,
}

struct ScheduleState {
    // Bumped by every scheduling decision; a timer only renders if its
    // generation is still current when it wakes up.
    generation: u64,
    phase: RenderPhase,
    last_rendered: Option<String>,
}

/// Decides when a streaming message is re-segmented and re-rendered.
///
/// While the answer streams, updates are debounced so the markdown pipeline
/// runs at most once per window. The moment streaming stops the final content
/// is rendered synchronously. Dropping the scheduler cancels any pending timer.
///
/// Must be driven from within a tokio runtime.
pub struct RenderScheduler {
    message_id: MessageId,
    debounce: Duration,
    sink: UnboundedSender<RenderedView>,
    state: Arc<Mutex<ScheduleState>>,
    timer: Option<JoinHandle<()>>,
}

impl RenderScheduler {
    pub fn new(
        message_id: MessageId,
        debounce: Duration,
        sink: UnboundedSender<RenderedView>,
    ) -> Self {
        Self {
            message_id,
            debounce,
            sink,
            state: Arc::new(Mutex::new(ScheduleState {
                generation: 0,
                phase: RenderPhase::Idle,
                last_rendered: None,
            })),
            timer: None,
        }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn phase(&self) -> RenderPhase {
        lock(&self.state).phase
    }

    /// Feeds the full accumulated content after every change.
    ///
    /// Returns the final view when `is_streaming` is false; debounced renders
    /// are only published to the sink.
    pub fn on_chunk(&mut self, content: &str, is_streaming: bool) -> Option<RenderedView> {
        let mut state = lock(&self.state);
        if state.phase == RenderPhase::FinalRendered {
            tracing::debug!(message_id = %self.message_id, "chunk after final render ignored");
            return None;
        }

        state.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        if !is_streaming {
            let rendered = RenderedView {
                message_id: self.message_id.clone(),
                view: render_stream(content, false),
                is_final: true,
            };
            state.phase = RenderPhase::FinalRendered;
            state.last_rendered = Some(content.to_string());
            drop(state);
            tracing::debug!(message_id = %self.message_id, "final render");
            publish(&self.sink, rendered.clone());
            return Some(rendered);
        }

        state.phase = RenderPhase::Debouncing;
        let generation = state.generation;
        drop(state);

        let deadline = Instant::now() + self.debounce;
        let shared = Arc::clone(&self.state);
        let sink = self.sink.clone();
        let message_id = self.message_id.clone();
        let content = content.to_string();
        self.timer = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            let mut state = lock(&shared);
            if state.generation != generation {
                return;
            }
            state.phase = RenderPhase::Rendered;
            if state.last_rendered.as_deref() == Some(content.as_str()) {
                return;
            }
            let view = render_stream(&content, true);
            state.last_rendered = Some(content);
            publish(
                &sink,
                RenderedView {
                    message_id,
                    view,
                    is_final: false,
                },
            );
        }));
        None
    }

    /// Cancels pending work and starts over for another message.
    pub fn reset(&mut self, message_id: MessageId) {
        self.cancel();
        let mut state = lock(&self.state);
        state.phase = RenderPhase::Idle;
        state.last_rendered = None;
        self.message_id = message_id;
    }

    fn cancel(&mut self) {
        lock(&self.state).generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(state: &Mutex<ScheduleState>) -> MutexGuard<'_, ScheduleState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn publish(sink: &UnboundedSender<RenderedView>, rendered: RenderedView) {
    if sink.send(rendered).is_err() {
        tracing::debug!("render dropped, view is gone");
    }
}
