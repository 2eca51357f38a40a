//! Client engine for the per-player gift mailbox service.
//!
//! The network transport is abstracted behind [`NetworkSession`]; everything
//! else in the mailbox protocol lives here:
//!
//! - [`ExchangeEngine`]: correlates outbound requests with asynchronous
//!   responses, owning tokens, timeouts, and result decoding
//! - [`MailboxState`]: the local open/closed state machine and its trait
//!   acceptance policy
//! - [`GiftPipeline`]: fans newly arrived gifts out to registered listeners
//! - [`GiftingService`]: the public facade tying the pieces together and
//!   owning shutdown
//!
//! All components expect to run inside a tokio runtime.

mod config;
mod engine;
mod mailbox;
mod pipeline;
mod service;
mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ClientConfig;
pub use engine::ExchangeEngine;
pub use mailbox::MailboxState;
pub use pipeline::{GiftPipeline, ListenerHandle};
pub use service::GiftingService;
pub use session::NetworkSession;
