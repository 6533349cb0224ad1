//! Incremental markdown rendering for streamed answers.
//!
//! - `segmenter` decides how much of the accumulated text is safe to parse
//! - `markdown` turns that prefix into an element tree
//! - `scheduler` decides when the two re-run while chunks arrive
//! - `copy` tracks per code block copy confirmations
mod copy;
mod live;
mod markdown;
mod scheduler;
mod segmenter;

pub use copy::{COPY_CONFIRMATION_WINDOW, CopyFeedback};
pub use live::LiveViews;
pub use markdown::{Block, BlockId, CodeBlock, Inline, ListItem, render, to_html};
pub use scheduler::{DEFAULT_DEBOUNCE, RenderPhase, RenderScheduler, RenderedView};
pub use segmenter::{Segmentation, segment};

/// What a chat bubble mounts for one message: the rendered, settled part of
/// the answer plus the raw tail that is still arriving.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamView {
    pub blocks: Vec<Block>,
    pub pending: String,
    pub is_streaming: bool,
}

impl StreamView {
    pub fn show_cursor(&self) -> bool {
        self.is_streaming
    }

    pub fn to_html(&self) -> String {
        let mut html = to_html(&self.blocks);
        if !self.pending.is_empty() {
            html.push_str("<p class=\"md-pending\">");
            html.push_str(&markdown::escape(&self.pending));
            html.push_str("</p>");
        }
        if self.show_cursor() {
            html.push_str("<span class=\"md-cursor\"></span>");
        }
        html
    }
}

/// Recomputes the view from scratch. Call it on every content or flag change;
/// nothing is cached between calls.
pub fn render_stream(content: &str, is_streaming: bool) -> StreamView {
    let Segmentation { completed, pending } = segment(content, is_streaming);
    StreamView {
        blocks: render(completed),
        pending: pending.to_string(),
        is_streaming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_view_splits_rendered_and_raw() {
        let view = render_stream("**Bold** start.\n\nstill `typ", true);
        assert_eq!(view.blocks.len(), 1);
        assert_eq!(view.pending, "still `typ");
        assert!(view.show_cursor());

        let html = view.to_html();
        assert!(html.contains("<strong>Bold</strong>"));
        assert!(html.contains("still `typ"));
        assert!(html.ends_with("<span class=\"md-cursor\"></span>"));
    }

    #[test]
    fn test_final_view_renders_everything() {
        let view = render_stream("Answer:\n```py\nprint(1)", false);
        assert!(view.pending.is_empty());
        assert!(!view.show_cursor());
        assert!(view.blocks.iter().any(|block| matches!(block, Block::Code(_))));
    }

    #[test]
    fn test_pending_text_is_escaped() {
        let view = render_stream("<b>raw", true);
        assert_eq!(view.pending, "<b>raw");
        assert!(view.to_html().contains("&lt;b&gt;raw"));
    }
}
