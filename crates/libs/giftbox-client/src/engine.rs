use crate::config::ClientConfig;
use crate::session::NetworkSession;
use giftbox_proto::{
    CanGiftResult, EventFrame, EventKind, GiftError, GiftId, GiftItem, ReceivedGift, RequestBody,
    RequestFrame, ResponseBody, ResponseFrame, SendGiftResult, TraitName,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

/// Correlates outbound requests with asynchronous network responses.
///
/// Every operation allocates a token, parks a one-shot result slot in the
/// pending table, submits the frame, and waits for the dispatch task to
/// resolve the slot. A slot never dangles: it is consumed by the matching
/// response, removed on timeout, or dropped when shutdown cancels the
/// dispatch task.
pub struct ExchangeEngine<S: NetworkSession> {
    session: Arc<S>,
    pending: Mutex<HashMap<u64, oneshot::Sender<ResponseBody>>>,
    next_token: AtomicU64,
    request_timeout: Duration,
    cancel: CancellationToken,
}

impl<S: NetworkSession> ExchangeEngine<S> {
    /// Creates the engine and spawns its response dispatch task. Cancelling
    /// `cancel` stops the task and fails every in-flight operation with
    /// [`GiftError::Cancelled`].
    pub fn start(session: Arc<S>, config: &ClientConfig, cancel: CancellationToken) -> Arc<Self> {
        let engine = Arc::new(Self {
            session: session.clone(),
            pending: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            request_timeout: config.request_timeout,
            cancel,
        });
        let responses = session.subscribe(EventKind::Response);
        let dispatch = engine.clone();
        tokio::spawn(async move { dispatch.dispatch_loop(responses).await });
        engine
    }

    pub async fn open_mailbox(
        &self,
        accepts_any_gift: bool,
        desired_traits: BTreeSet<TraitName>,
    ) -> Result<bool, GiftError> {
        let body = RequestBody::OpenMailbox { accepts_any_gift, desired_traits };
        match self.roundtrip(body).await? {
            ResponseBody::MailboxUpdated { open } => Ok(open),
            other => Err(Self::mismatch("open_mailbox", other)),
        }
    }

    /// Valid regardless of the current state; closing an already-closed box
    /// still succeeds as long as the remote acknowledges.
    pub async fn close_mailbox(&self) -> Result<bool, GiftError> {
        match self.roundtrip(RequestBody::CloseMailbox).await? {
            ResponseBody::MailboxUpdated { open } => Ok(!open),
            other => Err(Self::mismatch("close_mailbox", other)),
        }
    }

    pub async fn send_gift(
        &self,
        item: GiftItem,
        amount: u32,
        recipient_slot: u32,
        recipient_team: u32,
    ) -> Result<(), GiftError> {
        if amount == 0 {
            return Err(GiftError::invalid("amount", "must be a positive integer"));
        }
        let body = RequestBody::SendGift { item, amount, recipient_slot, recipient_team };
        self.expect_send_result("send_gift", body).await
    }

    /// Sends a stored gift back to its original sender.
    pub async fn refund_gift(&self, gift: ReceivedGift) -> Result<(), GiftError> {
        if gift.amount == 0 {
            return Err(GiftError::invalid("gift.amount", "must be a positive integer"));
        }
        self.expect_send_result("refund_gift", RequestBody::RefundGift { gift }).await
    }

    /// Side-effect-free on both ends. An `Accepted` answer reserves no
    /// capacity; a following send may still fail if the mailbox changed
    /// state in between.
    pub async fn can_gift(
        &self,
        recipient_slot: u32,
        recipient_team: u32,
        traits: BTreeSet<TraitName>,
    ) -> Result<CanGiftResult, GiftError> {
        let body = RequestBody::CanGift { recipient_slot, recipient_team, traits };
        match self.roundtrip(body).await? {
            ResponseBody::CanGift(result) => Ok(result),
            other => Err(Self::mismatch("can_gift", other)),
        }
    }

    /// Authoritative remote view of the gifts delivered and not yet removed.
    pub async fn contents(&self) -> Result<Vec<ReceivedGift>, GiftError> {
        match self.roundtrip(RequestBody::GetContents).await? {
            ResponseBody::Contents { gifts } => Ok(gifts),
            other => Err(Self::mismatch("get_contents", other)),
        }
    }

    /// Returns exactly the subset of `ids` removed by this call. Removing an
    /// id that is absent is not an error; the remote is the single arbiter
    /// of "already removed" under concurrent requests.
    pub async fn remove_gifts(
        &self,
        ids: BTreeSet<GiftId>,
    ) -> Result<BTreeSet<GiftId>, GiftError> {
        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        match self.roundtrip(RequestBody::RemoveGifts { ids }).await? {
            ResponseBody::Removed { ids } => Ok(ids),
            other => Err(Self::mismatch("remove_gifts", other)),
        }
    }

    pub(crate) fn allocate_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    async fn expect_send_result(
        &self,
        operation: &'static str,
        body: RequestBody,
    ) -> Result<(), GiftError> {
        match self.roundtrip(body).await? {
            ResponseBody::Send(SendGiftResult::Success) => Ok(()),
            ResponseBody::Send(SendGiftResult::Failure(reason)) => Err(GiftError::Refused(reason)),
            other => Err(Self::mismatch(operation, other)),
        }
    }

    async fn roundtrip(&self, body: RequestBody) -> Result<ResponseBody, GiftError> {
        if self.cancel.is_cancelled() {
            return Err(GiftError::Cancelled);
        }
        if !self.session.is_connected() {
            return Err(GiftError::NotConnected);
        }

        let token = self.allocate_token();
        let operation = body.name();
        let (slot_tx, slot_rx) = oneshot::channel();
        self.lock_pending().insert(token, slot_tx);

        if let Err(err) = self.session.submit(RequestFrame { token, body }).await {
            self.lock_pending().remove(&token);
            return Err(err);
        }

        let outcome = tokio::time::timeout(self.request_timeout, async {
            tokio::select! {
                _ = self.cancel.cancelled() => None,
                resolved = slot_rx => Some(resolved),
            }
        })
        .await;

        match outcome {
            Ok(Some(Ok(body))) => Ok(body),
            // Slot dropped or shutdown observed before a response arrived.
            Ok(Some(Err(_))) | Ok(None) => {
                self.lock_pending().remove(&token);
                Err(GiftError::Cancelled)
            }
            Err(_) => {
                self.lock_pending().remove(&token);
                log::warn!("engine: {operation} request {token} timed out");
                Err(GiftError::Timeout(self.request_timeout))
            }
        }
    }

    async fn dispatch_loop(self: Arc<Self>, mut responses: broadcast::Receiver<EventFrame>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = responses.recv() => match next {
                    Ok(EventFrame::Response(frame)) => self.resolve(frame),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("engine: response stream lagged, {skipped} frames dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        self.fail_pending();
    }

    fn resolve(&self, frame: ResponseFrame) {
        match self.lock_pending().remove(&frame.token) {
            Some(slot) => {
                let _ = slot.send(frame.body);
            }
            // Late reply after a timeout already removed the slot.
            None => log::debug!("engine: dropping unmatched response for token {}", frame.token),
        }
    }

    fn fail_pending(&self) {
        let drained = std::mem::take(&mut *self.lock_pending());
        if !drained.is_empty() {
            log::debug!("engine: cancelling {} in-flight operations", drained.len());
        }
        // Dropping the senders resolves every waiter as Cancelled.
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<ResponseBody>>> {
        self.pending.lock().expect("pending table mutex poisoned")
    }

    fn mismatch(operation: &'static str, body: ResponseBody) -> GiftError {
        match body {
            ResponseBody::Error { message } => GiftError::Protocol(message),
            other => GiftError::Protocol(format!("{operation}: unexpected response body {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedSession};
    use giftbox_proto::GiftRefusal;

    fn engine_with(
        session: Arc<ScriptedSession>,
        timeout: Duration,
    ) -> (Arc<ExchangeEngine<ScriptedSession>>, CancellationToken) {
        let cancel = CancellationToken::new();
        let config = ClientConfig::default().with_request_timeout(timeout);
        (ExchangeEngine::start(session, &config, cancel.clone()), cancel)
    }

    #[tokio::test]
    async fn send_success_resolves_by_token() {
        let session = ScriptedSession::connected();
        session.script(Reply::Respond(ResponseBody::Send(SendGiftResult::Success)));
        let (engine, _cancel) = engine_with(session.clone(), Duration::from_secs(1));

        engine
            .send_gift(GiftItem::new("Apple").with_trait("fruit"), 2, 3, 0)
            .await
            .expect("send should succeed");
        let submitted = session.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].body.name(), "send_gift");
    }

    #[tokio::test]
    async fn remote_refusal_maps_to_refused_error() {
        let session = ScriptedSession::connected();
        session.script(Reply::Respond(ResponseBody::Send(SendGiftResult::Failure(
            GiftRefusal::MailboxClosed,
        ))));
        let (engine, _cancel) = engine_with(session.clone(), Duration::from_secs(1));

        let err = engine
            .send_gift(GiftItem::new("Apple"), 1, 3, 0)
            .await
            .expect_err("closed mailbox must refuse");
        assert_eq!(err, GiftError::Refused(GiftRefusal::MailboxClosed));
    }

    #[tokio::test]
    async fn zero_amount_is_rejected_before_the_network() {
        let session = ScriptedSession::connected();
        let (engine, _cancel) = engine_with(session.clone(), Duration::from_secs(1));

        let err = engine.send_gift(GiftItem::new("Apple"), 0, 3, 0).await.expect_err("invalid");
        assert!(matches!(err, GiftError::Validation { field: "amount", .. }));
        assert!(session.submitted().is_empty());
    }

    #[tokio::test]
    async fn disconnected_session_short_circuits() {
        let session = ScriptedSession::disconnected();
        let (engine, _cancel) = engine_with(session.clone(), Duration::from_secs(1));

        let err = engine.close_mailbox().await.expect_err("disconnected");
        assert_eq!(err, GiftError::NotConnected);
        assert!(session.submitted().is_empty());
    }

    #[tokio::test]
    async fn timeout_removes_the_pending_entry() {
        let session = ScriptedSession::connected();
        session.script(Reply::Silence);
        let timeout = Duration::from_millis(50);
        let (engine, _cancel) = engine_with(session.clone(), timeout);

        let err = engine.contents().await.expect_err("must time out");
        assert_eq!(err, GiftError::Timeout(timeout));
        assert!(engine.lock_pending().is_empty());
    }

    #[tokio::test]
    async fn late_response_after_timeout_is_dropped() {
        let session = ScriptedSession::connected();
        session.script(Reply::Silence);
        let (engine, _cancel) = engine_with(session.clone(), Duration::from_millis(50));

        engine.contents().await.expect_err("must time out");
        // Replay the reply for the timed-out token; nothing should panic and
        // the table must stay empty.
        let token = session.submitted()[0].token;
        session.emit_response(ResponseFrame {
            token,
            body: ResponseBody::Contents { gifts: Vec::new() },
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(engine.lock_pending().is_empty());
    }

    #[tokio::test]
    async fn cancellation_fails_in_flight_operations() {
        let session = ScriptedSession::connected();
        session.script(Reply::Silence);
        let (engine, cancel) = engine_with(session.clone(), Duration::from_secs(30));

        let pending = tokio::spawn({
            let engine = engine.clone();
            async move { engine.contents().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let err = pending.await.expect("task").expect_err("must cancel");
        assert_eq!(err, GiftError::Cancelled);
        let err = engine.contents().await.expect_err("engine is shut down");
        assert_eq!(err, GiftError::Cancelled);
    }

    #[tokio::test]
    async fn concurrent_requests_resolve_out_of_order() {
        let session = ScriptedSession::connected();
        // Hold both replies back, then answer in reverse submission order.
        session.script(Reply::Silence);
        session.script(Reply::Silence);
        let (engine, _cancel) = engine_with(session.clone(), Duration::from_secs(5));

        let contents = tokio::spawn({
            let engine = engine.clone();
            async move { engine.contents().await }
        });
        let can_gift = tokio::spawn({
            let engine = engine.clone();
            async move { engine.can_gift(1, 0, BTreeSet::new()).await }
        });
        let frames = session.wait_for_submissions(2).await;

        for frame in frames.iter().rev() {
            let body = match &frame.body {
                RequestBody::GetContents => ResponseBody::Contents { gifts: Vec::new() },
                RequestBody::CanGift { .. } => ResponseBody::CanGift(CanGiftResult::Accepted),
                other => panic!("unexpected request {other:?}"),
            };
            session.emit_response(ResponseFrame { token: frame.token, body });
        }

        assert_eq!(contents.await.expect("task").expect("contents"), Vec::new());
        assert!(can_gift.await.expect("task").expect("can_gift").is_accepted());
    }

    #[tokio::test]
    async fn remote_error_body_maps_to_protocol_error() {
        let session = ScriptedSession::connected();
        session.script(Reply::Respond(ResponseBody::Error {
            message: "unknown request".to_owned(),
        }));
        let (engine, _cancel) = engine_with(session.clone(), Duration::from_secs(1));

        let err = engine.contents().await.expect_err("remote error");
        assert_eq!(err, GiftError::Protocol("unknown request".to_owned()));
    }

    #[tokio::test]
    async fn empty_removal_set_skips_the_network() {
        let session = ScriptedSession::connected();
        let (engine, _cancel) = engine_with(session.clone(), Duration::from_secs(1));

        let removed = engine.remove_gifts(BTreeSet::new()).await.expect("empty removal");
        assert!(removed.is_empty());
        assert!(session.submitted().is_empty());
    }
}
