use crate::api::{FnNotifier, JarvisClient, NoticeLevel};
use crate::chat::{ChatSession, ExchangeOutcome};
use crate::config::AppConfig;
use crate::render::{LiveViews, RenderedView, StreamView};
use crate::types::{Message, Role};
use crate::views::markdown::MarkdownMessage;
use dioxus::events::Key;
use dioxus::prelude::*;
use futures::StreamExt;
use futures::future::{AbortHandle, AbortRegistration};
use std::sync::Arc;
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tokio::sync::mpsc;

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]");

enum ChatCommand {
    Send {
        text: String,
        abort: AbortRegistration,
    },
    Refresh,
}

#[derive(Clone, Debug, PartialEq)]
struct Notice {
    level: NoticeLevel,
    text: String,
}

fn notice_class(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "notice info",
        NoticeLevel::Warning => "notice warning",
        NoticeLevel::Error => "notice error",
    }
}

fn role_class(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn format_message_timestamp(timestamp: OffsetDateTime) -> Option<String> {
    let mut datetime = timestamp;
    if let Ok(offset) = UtcOffset::current_local_offset() {
        datetime = datetime.to_offset(offset);
    }
    datetime.format(MESSAGE_TIME_FORMAT).ok()
}

#[component]
pub fn ChatView() -> Element {
    let config = use_context::<AppConfig>();
    let mut messages = use_signal(Vec::<Message>::new);
    let mut live_views = use_signal(LiveViews::default);
    let mut input = use_signal(String::new);
    let mut sending = use_signal(|| false);
    let mut stop_handle = use_signal(|| Option::<AbortHandle>::None);
    let mut notices = use_signal(Vec::<Notice>::new);

    // Owns the session for the lifetime of the view. Dropping the view drops
    // this task, which cancels any in-flight stream and pending render.
    let chat = use_coroutine(move |mut commands: UnboundedReceiver<ChatCommand>| {
        let config = config.clone();
        async move {
            let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<Notice>();
            let notifier = FnNotifier(move |level: NoticeLevel, text: &str| {
                let _ = notice_tx.send(Notice {
                    level,
                    text: text.to_string(),
                });
            });
            let backend = Arc::new(JarvisClient::from_config(&config, Arc::new(notifier)));
            let (render_tx, mut render_rx) = mpsc::unbounded_channel::<RenderedView>();
            let mut session = ChatSession::new(backend, &config, render_tx);
            let mut snapshots = session.subscribe();

            let drive = async move {
                while let Some(command) = commands.next().await {
                    match command {
                        ChatCommand::Send { text, abort } => {
                            match session.send(&text, Some(abort)).await {
                                Ok(ExchangeOutcome::Completed) => {}
                                Ok(outcome) => tracing::debug!(?outcome, "exchange ended early"),
                                Err(err) => tracing::warn!("exchange failed: {}", err),
                            }
                            stop_handle.set(None);
                            sending.set(false);
                        }
                        ChatCommand::Refresh => {
                            if let Err(err) = session.refresh().await {
                                tracing::warn!("refresh failed: {}", err);
                            }
                        }
                    }
                }
            };

            let renders = async move {
                while let Some(rendered) = render_rx.recv().await {
                    live_views.with_mut(|views| views.apply(rendered));
                }
            };

            let message_list = async move {
                while snapshots.changed().await.is_ok() {
                    let latest = snapshots.borrow_and_update().clone();
                    live_views.with_mut(|views| views.retain_streaming(&latest));
                    messages.set(latest);
                }
            };

            let toasts = async move {
                while let Some(notice) = notice_rx.recv().await {
                    notices.with_mut(|list| list.push(notice));
                }
            };

            futures::join!(drive, renders, message_list, toasts);
        }
    });

    let mut send_message = move |text: String| {
        let trimmed = text.trim();
        if trimmed.is_empty() || sending() {
            return;
        }
        let (handle, registration) = AbortHandle::new_pair();
        stop_handle.set(Some(handle));
        sending.set(true);
        input.set(String::new());
        chat.send(ChatCommand::Send {
            text: trimmed.to_string(),
            abort: registration,
        });
    };

    let stop = move |_| {
        if let Some(handle) = stop_handle.peek().as_ref() {
            handle.abort();
        }
    };

    let messages_snapshot = messages();
    let views = live_views.read();
    let notices_snapshot = notices();

    rsx! {
        div { class: "main-container",
            if !notices_snapshot.is_empty() {
                div { class: "notices",
                    for (i, notice) in notices_snapshot.into_iter().enumerate() {
                        div { key: "{i}", class: notice_class(notice.level),
                            span { "{notice.text}" }
                            button {
                                class: "btn-ghost",
                                r#type: "button",
                                onclick: move |_| {
                                    notices.with_mut(|list| {
                                        if i < list.len() {
                                            list.remove(i);
                                        }
                                    });
                                },
                                "Dismiss"
                            }
                        }
                    }
                }
            }
            div { class: "chat-wrap",
                div { id: "chat-list", class: "chat-list",
                    for msg in messages_snapshot.iter() {
                        MessageRow {
                            key: "{msg.id}",
                            message: msg.clone(),
                            live: views.get(&msg.id).cloned(),
                        }
                    }
                }
            }

            form { class: "composer no-divider",
                div { class: "composer-inner",
                    div { class: "hstack", style: "gap: 0.5rem; width: 100%; align-items: flex-end;",
                        textarea {
                            class: "", rows: "1", placeholder: "Ask Jarvis anything",
                            value: "{input}", oninput: move |ev| input.set(ev.value()),
                            onkeydown: move |ev| {
                                if ev.key() == Key::Enter && !ev.modifiers().shift() {
                                    ev.prevent_default();
                                    let text = input();
                                    send_message(text);
                                }
                            },
                            disabled: sending(), autofocus: true,
                        }
                        if sending() {
                            button { class: "btn", r#type: "button", onclick: stop, "Stop" }
                        } else {
                            button {
                                class: "btn btn-primary", r#type: "button",
                                disabled: input().trim().is_empty(),
                                onclick: move |_| {
                                    let text = input();
                                    send_message(text);
                                },
                                "Send"
                            }
                            button {
                                class: "btn btn-ghost", r#type: "button", title: "Reload saved messages",
                                onclick: move |_| chat.send(ChatCommand::Refresh),
                                "Sync"
                            }
                        }
                    }
                }
            }
        }
    }
}

#[component]
fn MessageRow(message: Message, live: Option<StreamView>) -> Element {
    let role = role_class(message.role);
    let timestamp = format_message_timestamp(message.created_at);
    let is_assistant = message.role == Role::Assistant;

    rsx! {
        div { class: "message-row {role}",
            if is_assistant { div { class: "avatar assistant", "J" } }
            div { class: "message-stack",
                div { class: "bubble {role}",
                    if is_assistant {
                        MarkdownMessage {
                            content: message.content.clone(),
                            is_streaming: message.is_streaming,
                            live: live.clone(),
                        }
                    } else {
                        "{message.content}"
                    }
                }
                div { class: format_args!(
                        "message-meta {}",
                        if is_assistant { "align-start" } else { "align-end" }
                    ),
                    if let Some(ts) = timestamp {
                        span { class: "message-timestamp", "{ts}" }
                    }
                    if let Some(agent) = message.agent_used.as_deref() {
                        span { class: "message-agent", "{agent}" }
                    }
                }
            }
        }
    }
}
