use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote-reported reason a gift (or gift query) was turned down.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum GiftRefusal {
    /// The recipient's mailbox is not open.
    MailboxClosed,
    /// The recipient's mailbox is open but none of the offered traits are
    /// desired.
    TraitMismatch,
    /// No player exists at the addressed slot/team.
    RecipientNotFound,
}

impl fmt::Display for GiftRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MailboxClosed => "recipient mailbox is closed",
            Self::TraitMismatch => "recipient does not desire the offered traits",
            Self::RecipientNotFound => "recipient not found",
        };
        f.write_str(text)
    }
}

/// Outcome of a send or refund request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SendGiftResult {
    Success,
    Failure(GiftRefusal),
}

impl SendGiftResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Outcome of a side-effect-free "would this send succeed" query.
///
/// An `Accepted` answer reserves nothing; the mailbox may change state
/// before a following send.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CanGiftResult {
    Accepted,
    Refused(GiftRefusal),
}

impl CanGiftResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}
