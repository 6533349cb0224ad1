use serde::Deserialize;

/// One record of the chat stream, in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// The backend assigned (or confirmed) the conversation's session.
    Session { session_id: String },
    Content { text: String },
    Complete {
        intent: Option<String>,
        agent_used: Option<String>,
    },
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireEvent {
    Session {
        session_id: String,
    },
    Content {
        #[serde(alias = "text")]
        content: String,
    },
    #[serde(alias = "done")]
    Complete {
        #[serde(default)]
        intent: Option<String>,
        #[serde(default)]
        agent_used: Option<String>,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
}

impl From<WireEvent> for StreamEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::Session { session_id } => StreamEvent::Session { session_id },
            WireEvent::Content { content } => StreamEvent::Content { text: content },
            WireEvent::Complete { intent, agent_used } => {
                StreamEvent::Complete { intent, agent_used }
            }
            WireEvent::Error { message, error } => StreamEvent::Error {
                message: message
                    .or(error)
                    .unwrap_or_else(|| "The assistant reported an error.".to_string()),
            },
        }
    }
}

/// Parses the payload of one SSE event. Unknown or malformed records yield
/// `None` and are skipped by the caller.
pub fn parse_event_data(data: &str) -> Option<StreamEvent> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed == "[DONE]" {
        return Some(StreamEvent::Complete {
            intent: None,
            agent_used: None,
        });
    }
    match serde_json::from_str::<WireEvent>(trimmed) {
        Ok(event) => Some(event.into()),
        Err(err) => {
            tracing::warn!("skipping stream record: {}", err);
            None
        }
    }
}

/// Incremental SSE decoder.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network chunks survive intact. Consecutive
/// `data:` lines are joined until the blank line that ends the event. Bare
/// JSON lines are accepted as single-line events.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            self.process_line(line, &mut events);
        }
        events
    }

    /// Flushes whatever is buffered once the body has ended.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw);
            self.process_line(line.trim_end_matches('\r'), &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let piece = rest.strip_prefix(' ').unwrap_or(rest);
            match &mut self.data {
                Some(acc) => {
                    acc.push('\n');
                    acc.push_str(piece);
                }
                None => self.data = Some(piece.to_string()),
            }
            return;
        }
        if line.trim_start().starts_with('{') {
            self.dispatch(events);
            events.extend(parse_event_data(line));
        }
        // Comments, `event:`, `id:` and `retry:` fields carry nothing we use.
    }

    fn dispatch(&mut self, events: &mut Vec<StreamEvent>) {
        if let Some(data) = self.data.take() {
            events.extend(parse_event_data(&data));
        }
    }
}
