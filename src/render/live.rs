use super::StreamView;
use super::scheduler::RenderedView;
use crate::types::{Message, MessageId};
use std::collections::HashMap;

/// Latest debounced view of each reply that is still streaming.
///
/// Final renders are not kept: once a reply is finalized the message itself
/// carries the final content.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LiveViews {
    views: HashMap<MessageId, StreamView>,
}

impl LiveViews {
    pub fn apply(&mut self, rendered: RenderedView) {
        if rendered.is_final {
            self.views.remove(&rendered.message_id);
        } else {
            self.views.insert(rendered.message_id, rendered.view);
        }
    }

    /// Drops views whose message finished or left the list (e.g. after a
    /// refetch swapped local ids for server ids).
    pub fn retain_streaming(&mut self, messages: &[Message]) {
        self.views.retain(|id, _| {
            messages
                .iter()
                .any(|message| message.is_streaming && &message.id == id)
        });
    }

    pub fn get(&self, id: &MessageId) -> Option<&StreamView> {
        self.views.get(id)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render_stream;

    fn rendered(id: &MessageId, content: &str, is_final: bool) -> RenderedView {
        RenderedView {
            message_id: id.clone(),
            view: render_stream(content, !is_final),
            is_final,
        }
    }

    #[test]
    fn test_final_render_releases_the_view() {
        let id = MessageId::next_local();
        let mut live = LiveViews::default();
        live.apply(rendered(&id, "Hello\n\nwor", false));
        assert_eq!(live.get(&id).map(|view| view.pending.as_str()), Some("wor"));

        live.apply(rendered(&id, "Hello\n\nworld", true));
        assert!(live.is_empty());
    }

    #[test]
    fn test_finished_and_replaced_messages_are_pruned() {
        let mut streaming = Message::assistant_placeholder(MessageId::next_local());
        let finished = Message::assistant_placeholder(MessageId::next_local());
        let replaced = MessageId::next_local();

        let mut live = LiveViews::default();
        live.apply(rendered(&streaming.id, "a", false));
        live.apply(rendered(&finished.id, "b", false));
        live.apply(rendered(&replaced, "c", false));
        assert_eq!(live.len(), 3);

        let mut done = finished.clone();
        done.finalize();
        live.retain_streaming(&[streaming.clone(), done]);
        assert_eq!(live.len(), 1);
        assert!(live.get(&streaming.id).is_some());

        streaming.finalize();
        live.retain_streaming(&[streaming]);
        assert!(live.is_empty());
    }
}
