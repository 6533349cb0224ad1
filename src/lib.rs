pub mod api;
pub mod chat;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod render;
pub mod types;

#[cfg(feature = "dioxus")]
pub mod ui;
#[cfg(feature = "dioxus")]
pub mod views;
