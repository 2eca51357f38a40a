use crate::outcome::{CanGiftResult, SendGiftResult};
use crate::types::{GiftId, GiftItem, ReceivedGift, TraitName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inbound event streams a session can be subscribed to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Replies to correlated requests.
    Response,
    /// Unsolicited notifications about gifts landing in the local mailbox.
    GiftReceived,
}

/// Payload of an outbound request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestBody {
    OpenMailbox { accepts_any_gift: bool, desired_traits: BTreeSet<TraitName> },
    CloseMailbox,
    SendGift { item: GiftItem, amount: u32, recipient_slot: u32, recipient_team: u32 },
    RefundGift { gift: ReceivedGift },
    CanGift { recipient_slot: u32, recipient_team: u32, traits: BTreeSet<TraitName> },
    GetContents,
    RemoveGifts { ids: BTreeSet<GiftId> },
}

impl RequestBody {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenMailbox { .. } => "open_mailbox",
            Self::CloseMailbox => "close_mailbox",
            Self::SendGift { .. } => "send_gift",
            Self::RefundGift { .. } => "refund_gift",
            Self::CanGift { .. } => "can_gift",
            Self::GetContents => "get_contents",
            Self::RemoveGifts { .. } => "remove_gifts",
        }
    }
}

/// Outbound request carrying its correlation token.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestFrame {
    pub token: u64,
    pub body: RequestBody,
}

/// Payload of a reply to a correlated request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseBody {
    /// Acknowledgement of an open or close request with the resulting state.
    MailboxUpdated { open: bool },
    Send(SendGiftResult),
    CanGift(CanGiftResult),
    Contents { gifts: Vec<ReceivedGift> },
    /// The subset of requested ids that were actually removed by this call.
    Removed { ids: BTreeSet<GiftId> },
    /// Remote-side failure to process the request at all.
    Error { message: String },
}

/// Reply to a correlated request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseFrame {
    pub token: u64,
    pub body: ResponseBody,
}

/// One inbound event from the session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventFrame {
    Response(ResponseFrame),
    GiftReceived(ReceivedGift),
}

impl EventFrame {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Response(_) => EventKind::Response,
            Self::GiftReceived(_) => EventKind::GiftReceived,
        }
    }
}
