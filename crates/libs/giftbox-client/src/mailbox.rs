use giftbox_proto::{MailboxConfig, TraitName};
use std::collections::BTreeSet;

/// Local mailbox lifecycle.
///
/// `Closed` until an open request is acknowledged, back to `Closed` on an
/// acknowledged close. There are no implicit transitions; overlapping
/// open/close calls race on the remote and the last acknowledged response
/// wins here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MailboxState {
    #[default]
    Closed,
    Open(MailboxConfig),
}

impl MailboxState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    pub fn config(&self) -> Option<&MailboxConfig> {
        match self {
            Self::Closed => None,
            Self::Open(config) => Some(config),
        }
    }

    pub fn apply_open(&mut self, config: MailboxConfig) {
        *self = Self::Open(config);
    }

    /// Idempotent; closing an already-closed box is a no-op.
    pub fn apply_close(&mut self) {
        *self = Self::Closed;
    }

    /// Whether a gift carrying `offered` traits would be accepted right now.
    pub fn accepts(&self, offered: &BTreeSet<TraitName>) -> bool {
        match self {
            Self::Closed => false,
            Self::Open(config) => config.accepts(offered),
        }
    }
}
