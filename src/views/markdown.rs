use crate::clipboard::copy_text;
use crate::render::{
    Block, BlockId, COPY_CONFIRMATION_WINDOW, CodeBlock, CopyFeedback, StreamView, render_stream,
};
use dioxus::prelude::*;
use std::time::Instant;

/// Assistant message body. Uses the scheduler's latest view while one exists;
/// otherwise renders `content` directly (history, refetched messages).
#[component]
pub fn MarkdownMessage(content: String, is_streaming: bool, live: Option<StreamView>) -> Element {
    // Lives as long as the message row, so confirmations survive re-renders.
    let feedback = use_signal(CopyFeedback::default);

    if live.is_none() && is_streaming && content.trim().is_empty() {
        return rsx! {
            div { class: "md", div { class: "shimmer-text", "Thinking…" } }
        };
    }

    let view = live.unwrap_or_else(|| render_stream(&content, is_streaming));
    rsx! {
        div { class: "md",
            for (index, block) in view.blocks.iter().enumerate() {
                BlockView { key: "{block_key(index, block)}", block: block.clone(), feedback }
            }
            if !view.pending.is_empty() {
                p { class: "md-pending", "{view.pending}" }
            }
            if view.show_cursor() {
                span { class: "md-cursor" }
            }
        }
    }
}

// Code blocks keep their content id across renders so the copy state sticks.
fn block_key(index: usize, block: &Block) -> String {
    match block {
        Block::Code(code) => code.id.to_string(),
        _ => format!("block-{index}"),
    }
}

#[component]
fn BlockView(block: Block, feedback: Signal<CopyFeedback>) -> Element {
    match block {
        Block::Code(code) => rsx! {
            CodeBlockView { code, feedback }
        },
        other => {
            let html = other.to_html();
            rsx! {
                div { class: "md-block", dangerous_inner_html: "{html}" }
            }
        }
    }
}

#[component]
fn CodeBlockView(code: CodeBlock, feedback: Signal<CopyFeedback>) -> Element {
    let mut feedback = feedback;
    let copied = feedback.read().is_confirmed(&code.id, Instant::now());
    let language = code.language.clone().unwrap_or_else(|| "text".to_string());
    let button_class = if copied { "md-copy copied" } else { "md-copy" };
    let button_label = if copied { "Copied" } else { "Copy" };

    let id = code.id.clone();
    let text = code.code.clone();
    let on_copy = move |_| {
        if copy_text(&text).is_ok() {
            confirm_copy(feedback, id.clone());
        }
    };

    rsx! {
        div { class: "md-code", "data-block-id": "{code.id}",
            div { class: "md-code-header",
                span { class: "md-code-lang", "{language}" }
                button {
                    class: button_class,
                    r#type: "button",
                    title: "Copy code",
                    onclick: on_copy,
                    "{button_label}"
                }
            }
            div { dangerous_inner_html: "{code.highlighted}" }
        }
    }
}

fn confirm_copy(mut feedback: Signal<CopyFeedback>, id: BlockId) {
    feedback.with_mut(|state| state.confirm(id, Instant::now()));
    spawn(async move {
        tokio::time::sleep(COPY_CONFIRMATION_WINDOW).await;
        feedback.with_mut(|state| {
            state.prune(Instant::now());
        });
    });
}
