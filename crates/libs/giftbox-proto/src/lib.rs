//! Wire contract and data model for the gift mailbox service.
//!
//! This crate defines everything that crosses the boundary between the
//! client engine and the game network session:
//!
//! - **Value types**: [`TraitName`], [`GiftItem`], [`ReceivedGift`],
//!   [`MailboxConfig`]
//! - **Frames**: correlated [`RequestFrame`]/[`ResponseFrame`] pairs and the
//!   unsolicited [`EventFrame`] stream
//! - **Outcomes**: [`SendGiftResult`]/[`CanGiftResult`] with their shared
//!   [`GiftRefusal`] reasons
//! - **[`GiftError`]**: the failure taxonomy for every client operation
//!
//! Types here are plain `serde` values; the session implementation owns the
//! actual byte encoding.

mod error;
mod outcome;
mod types;
mod wire;

pub use error::GiftError;
pub use outcome::{CanGiftResult, GiftRefusal, SendGiftResult};
pub use types::{GiftId, GiftItem, MailboxConfig, ReceivedGift, TraitName};
pub use wire::{EventFrame, EventKind, RequestBody, RequestFrame, ResponseBody, ResponseFrame};
