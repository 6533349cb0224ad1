use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Receives user-facing notices raised by the API layer (toasts on the UI
/// side). Handed to [`JarvisClient`](super::JarvisClient) at construction.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Default handler: notices end up in the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => tracing::info!("{}", message),
            NoticeLevel::Warning => tracing::warn!("{}", message),
            NoticeLevel::Error => tracing::error!("{}", message),
        }
    }
}

/// Adapts a closure, e.g. one that pushes onto a toast list.
pub struct FnNotifier<F>(pub F);

impl<F> Notifier for FnNotifier<F>
where
    F: Fn(NoticeLevel, &str) + Send + Sync,
{
    fn notify(&self, level: NoticeLevel, message: &str) {
        (self.0)(level, message)
    }
}

pub fn default_notifier() -> Arc<dyn Notifier> {
    Arc::new(TracingNotifier)
}
