use crate::config::ClientConfig;
use crate::engine::ExchangeEngine;
use crate::mailbox::MailboxState;
use crate::pipeline::{GiftPipeline, ListenerHandle};
use crate::session::NetworkSession;
use giftbox_proto::{
    GiftError, GiftId, GiftItem, MailboxConfig, ReceivedGift, RequestBody, RequestFrame, TraitName,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Public facade over one player's gift mailbox.
///
/// Owns the exchange engine, the received-gift pipeline, and the local
/// mailbox state, plus teardown: [`shutdown`](Self::shutdown) issues a
/// best-effort close and cancels every in-flight and future operation.
///
/// Must be created inside a tokio runtime.
pub struct GiftingService<S: NetworkSession> {
    session: Arc<S>,
    engine: Arc<ExchangeEngine<S>>,
    pipeline: GiftPipeline,
    mailbox: Mutex<MailboxState>,
    cancel: CancellationToken,
}

impl<S: NetworkSession> GiftingService<S> {
    pub fn new(session: Arc<S>, config: ClientConfig) -> Self {
        let cancel = CancellationToken::new();
        let engine = ExchangeEngine::start(session.clone(), &config, cancel.child_token());
        let pipeline = GiftPipeline::new(cancel.child_token());
        Self { session, engine, pipeline, mailbox: Mutex::new(MailboxState::Closed), cancel }
    }

    /// Opens the local gift box. With `accepts_any_gifts` set, the desired
    /// traits are advertised as preferences only; otherwise they are the
    /// acceptance filter.
    ///
    /// Local state changes only on acknowledgement; any failure or timeout
    /// leaves it untouched and returns false.
    pub async fn open_gift_box(
        &self,
        accepts_any_gifts: bool,
        desired_traits: BTreeSet<TraitName>,
    ) -> bool {
        let config = MailboxConfig {
            accepts_any_gift: accepts_any_gifts,
            desired_traits: desired_traits.clone(),
        };
        match self.engine.open_mailbox(accepts_any_gifts, desired_traits).await {
            Ok(true) => {
                self.lock_mailbox().apply_open(config);
                true
            }
            Ok(false) => false,
            Err(err) => {
                log::warn!("service: open_gift_box failed: {err}");
                false
            }
        }
    }

    /// Idempotent: closing an already-closed box still returns true as long
    /// as the remote acknowledges.
    pub async fn close_gift_box(&self) -> bool {
        match self.engine.close_mailbox().await {
            Ok(true) => {
                self.lock_mailbox().apply_close();
                true
            }
            Ok(false) => false,
            Err(err) => {
                log::warn!("service: close_gift_box failed: {err}");
                false
            }
        }
    }

    /// The authoritative remote view of undelivered gifts. Remove gifts as
    /// you handle them to avoid reprocessing after a reconnect.
    pub async fn get_gift_box_contents(&self) -> Result<Vec<ReceivedGift>, GiftError> {
        self.engine.contents().await
    }

    /// Returns the ids actually removed by this call; absent ids are
    /// skipped, not errors.
    pub async fn remove_gifts_from_box(
        &self,
        ids: BTreeSet<GiftId>,
    ) -> Result<BTreeSet<GiftId>, GiftError> {
        self.engine.remove_gifts(ids).await
    }

    /// Whether a gift carrying `traits` would currently be accepted. Not a
    /// reservation: the answer can go stale before a following
    /// [`send_gift`](Self::send_gift).
    pub async fn can_gift_to_player(
        &self,
        recipient_slot: u32,
        recipient_team: u32,
        traits: BTreeSet<TraitName>,
    ) -> bool {
        match self.engine.can_gift(recipient_slot, recipient_team, traits).await {
            Ok(result) => result.is_accepted(),
            Err(err) => {
                log::warn!("service: can_gift_to_player failed: {err}");
                false
            }
        }
    }

    pub async fn send_gift(
        &self,
        item: GiftItem,
        amount: u32,
        recipient_slot: u32,
        recipient_team: u32,
    ) -> Result<(), GiftError> {
        self.engine.send_gift(item, amount, recipient_slot, recipient_team).await
    }

    /// Sends a received gift back to its original sender.
    pub async fn refund_gift(&self, gift: ReceivedGift) -> Result<(), GiftError> {
        self.engine.refund_gift(gift).await
    }

    /// Remove gifts from the box as soon as you handle them: arrivals can be
    /// redelivered across reconnects.
    pub fn register_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(ReceivedGift) + Send + Sync + 'static,
    {
        self.pipeline.register(listener)
    }

    pub fn unregister_listener(&self, handle: ListenerHandle) -> bool {
        self.pipeline.unregister(handle)
    }

    /// Idempotent. Gifts arriving while no listener is registered are
    /// dropped, so register at least one listener first.
    pub fn start_listening(&self) {
        self.pipeline.start(self.session.as_ref());
    }

    /// Snapshot of the local mailbox state machine.
    pub fn mailbox_state(&self) -> MailboxState {
        self.lock_mailbox().clone()
    }

    /// Best-effort close of the mailbox, then cancellation of all
    /// outstanding and future work. Does not wait for the close
    /// acknowledgement; in-flight operations resolve as
    /// [`GiftError::Cancelled`].
    pub fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        let session = self.session.clone();
        let token = self.engine.allocate_token();
        tokio::spawn(async move {
            let frame = RequestFrame { token, body: RequestBody::CloseMailbox };
            if let Err(err) = session.submit(frame).await {
                log::debug!("service: shutdown close request dropped: {err}");
            }
        });
    }

    fn lock_mailbox(&self) -> std::sync::MutexGuard<'_, MailboxState> {
        self.mailbox.lock().expect("mailbox state mutex poisoned")
    }
}

impl<S: NetworkSession> Drop for GiftingService<S> {
    fn drop(&mut self) {
        // Stops the dispatch and pipeline tasks if shutdown was never called.
        self.cancel.cancel();
    }
}
