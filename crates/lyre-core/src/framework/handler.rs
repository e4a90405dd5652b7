//! Event handler trait and closure adapters.
//!
//! Any `Fn(Arc<Event>) -> impl Future` closure is a handler, as long as the
//! future resolves to `()` or to a `Result<(), E>` with a displayable error.
//!
//! ```rust,ignore
//! bus.on("chat", |event: Arc<Event>| async move {
//!     if let Some(msg) = event.message() {
//!         tracing::info!(text = %msg.text, "got chat");
//!     }
//! });
//!
//! bus.on("track", |event: Arc<Event>| async move {
//!     let value = event.to_value();
//!     save(value).await.map_err(|e| format!("save failed: {e}"))
//! });
//! ```

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::foundation::event::Event;

/// Values a handler future may resolve to.
///
/// `Err` marks the invocation as failed; the failure is logged by the bus and
/// never reaches sibling handlers.
pub trait HandlerOutput: Send {
    /// Converts the output into a failure message, if any.
    fn into_failure(self) -> Option<String>;
}

impl HandlerOutput for () {
    fn into_failure(self) -> Option<String> {
        None
    }
}

impl<E: Display + Send> HandlerOutput for Result<(), E> {
    fn into_failure(self) -> Option<String> {
        self.err().map(|e| e.to_string())
    }
}

/// A type-erased, shareable event handler.
pub trait EventHandler: Send + Sync + 'static {
    /// Invokes the handler with the dispatched event.
    ///
    /// Resolves to `Some(message)` when the handler failed.
    fn call(&self, event: Arc<Event>) -> BoxFuture<'static, Option<String>>;
}

impl<F, Fut, R> EventHandler for F
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput,
{
    fn call(&self, event: Arc<Event>) -> BoxFuture<'static, Option<String>> {
        let fut = (self)(event);
        Box::pin(async move { fut.await.into_failure() })
    }
}

/// A handler shared between the bus and its snapshots.
pub type BoxedHandler = Arc<dyn EventHandler>;

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unit_handler_never_fails() {
        let handler = |_event: Arc<Event>| async {};
        assert_eq!(handler.call(Arc::new(Event::Load)).await, None);
    }

    #[tokio::test]
    async fn test_result_handler_reports_error() {
        let handler = |_event: Arc<Event>| async { Err::<(), _>("boom") };
        assert_eq!(
            handler.call(Arc::new(Event::Load)).await.as_deref(),
            Some("boom")
        );
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("bad state");
        assert_eq!(panic_message(payload.as_ref()), "bad state");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
