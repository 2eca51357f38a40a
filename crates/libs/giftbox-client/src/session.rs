use async_trait::async_trait;
use giftbox_proto::{EventFrame, EventKind, GiftError, RequestFrame};
use tokio::sync::broadcast;

/// Boundary to the game network client.
///
/// Implementations own connection establishment, authentication, and the
/// actual wire encoding. The engine only needs fire-and-forget submission
/// plus per-kind event subscriptions, and never assumes synchronous
/// delivery.
#[async_trait]
pub trait NetworkSession: Send + Sync + 'static {
    /// Queue a request frame for transmission. Completion means the frame
    /// was handed to the transport, not that a response arrived.
    async fn submit(&self, frame: RequestFrame) -> Result<(), GiftError>;

    /// Subscribe to one kind of inbound event. Each call returns a fresh
    /// receiver positioned at the current head of the stream; events that
    /// arrived earlier are not replayed.
    fn subscribe(&self, kind: EventKind) -> broadcast::Receiver<EventFrame>;

    /// Whether the underlying connection is currently usable.
    fn is_connected(&self) -> bool;
}
