use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque compatibility tag negotiated between sender and recipient.
///
/// Names are case-sensitive and carry no structure beyond set membership.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct TraitName(pub String);

impl TraitName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TraitName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl fmt::Display for TraitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote-assigned gift identifier, unique per mailbox and never reused.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct GiftId(pub String);

impl GiftId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GiftId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for GiftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An item offered as a gift, tagged with the traits it carries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GiftItem {
    pub name: String,
    #[serde(default)]
    pub traits: BTreeSet<TraitName>,
}

impl GiftItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), traits: BTreeSet::new() }
    }

    pub fn with_trait(mut self, name: impl Into<TraitName>) -> Self {
        self.traits.insert(name.into());
        self
    }
}

/// A gift delivered to the local mailbox.
///
/// Immutable once created; it is logically gone only after a removal request
/// reports its id back as removed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceivedGift {
    pub id: GiftId,
    pub item: GiftItem,
    pub amount: u32,
    pub sender_slot: u32,
    pub sender_team: u32,
}

/// Advertised acceptance policy of an open mailbox.
///
/// Mutated only by acknowledged open/close requests.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailboxConfig {
    pub accepts_any_gift: bool,
    #[serde(default)]
    pub desired_traits: BTreeSet<TraitName>,
}

impl MailboxConfig {
    pub fn accept_all() -> Self {
        Self { accepts_any_gift: true, desired_traits: BTreeSet::new() }
    }

    pub fn accept_traits(desired_traits: BTreeSet<TraitName>) -> Self {
        Self { accepts_any_gift: false, desired_traits }
    }

    /// Whether a gift carrying `offered` traits passes this policy.
    ///
    /// When `accepts_any_gift` is set the desired traits are advisory only
    /// and never reject anything. Otherwise at least one offered trait must
    /// be desired.
    pub fn accepts(&self, offered: &BTreeSet<TraitName>) -> bool {
        if self.accepts_any_gift {
            return true;
        }
        offered.iter().any(|name| self.desired_traits.contains(name))
    }
}
