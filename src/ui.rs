use crate::views::ChatView;
use dioxus::prelude::*;

const JARVIS_CSS: Asset = asset!("/assets/jarvis.css");

#[component]
pub fn App() -> Element {
    rsx! {
        document::Link { rel: "stylesheet", href: JARVIS_CSS }
        AppHeader {}
        ChatView {}
    }
}

#[component]
fn AppHeader() -> Element {
    rsx! {
        div { class: "header no-divider",
            div { class: "header-content",
                h1 { class: "header-wordmark", "Jarvis" }
            }
        }
    }
}
