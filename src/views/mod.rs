pub mod chat;
pub mod markdown;

pub use chat::ChatView;
pub use markdown::MarkdownMessage;
