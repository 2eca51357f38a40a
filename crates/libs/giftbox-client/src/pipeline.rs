use crate::session::NetworkSession;
use giftbox_proto::{EventFrame, EventKind, ReceivedGift};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type GiftListener = Arc<dyn Fn(ReceivedGift) + Send + Sync>;

/// Identifies one listener registration; pass it back to
/// [`GiftPipeline::unregister`] to stop deliveries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Fans newly arrived gifts out to the registered listeners.
///
/// One upstream subscription, N listeners. Gifts are dispatched in arrival
/// order and every listener registered at dispatch time runs, in
/// registration order, before the next gift is processed. Only arrivals
/// after [`start`](Self::start) are streamed; pre-existing mailbox contents
/// must be fetched through the engine. Redelivery across reconnects is
/// possible, so callers should remove gifts from the box as they handle
/// them.
pub struct GiftPipeline {
    listeners: Arc<Mutex<Vec<(ListenerHandle, GiftListener)>>>,
    next_handle: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl GiftPipeline {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_handle: AtomicU64::new(1),
            task: Mutex::new(None),
            cancel,
        }
    }

    /// Safe to call at any time, including from inside a listener callback;
    /// the new listener sees subsequent gifts, not the one being dispatched.
    pub fn register<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(ReceivedGift) + Send + Sync + 'static,
    {
        let handle = ListenerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push((handle, Arc::new(listener)));
        handle
    }

    /// Returns false when the handle was already unregistered.
    pub fn unregister(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != handle);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    /// Starts the background dispatch task. Idempotent: a live task is left
    /// untouched, so no gift is ever dispatched twice.
    ///
    /// Gifts arriving while no listener is registered are dropped; that is
    /// the documented contract, so register before starting.
    pub fn start<S: NetworkSession>(&self, session: &S) {
        let mut task = self.task.lock().expect("pipeline task mutex poisoned");
        if let Some(running) = task.as_ref() {
            if !running.is_finished() {
                log::debug!("pipeline: already listening");
                return;
            }
        }
        if self.lock_listeners().is_empty() {
            log::warn!("pipeline: listening with no listeners registered, gifts will be dropped");
        }
        let events = session.subscribe(EventKind::GiftReceived);
        let listeners = self.listeners.clone();
        let cancel = self.cancel.clone();
        *task = Some(tokio::spawn(dispatch_loop(events, listeners, cancel)));
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerHandle, GiftListener)>> {
        self.listeners.lock().expect("listener registry mutex poisoned")
    }
}

async fn dispatch_loop(
    mut events: broadcast::Receiver<EventFrame>,
    listeners: Arc<Mutex<Vec<(ListenerHandle, GiftListener)>>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = events.recv() => match next {
                Ok(EventFrame::GiftReceived(gift)) => dispatch(&listeners, gift),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("pipeline: event stream lagged, {missed} arrivals not dispatched");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

fn dispatch(listeners: &Mutex<Vec<(ListenerHandle, GiftListener)>>, gift: ReceivedGift) {
    // Snapshot under the lock, invoke outside it, so listeners may register
    // or unregister from within their callback without deadlocking.
    let snapshot: Vec<GiftListener> = listeners
        .lock()
        .expect("listener registry mutex poisoned")
        .iter()
        .map(|(_, listener)| listener.clone())
        .collect();
    if snapshot.is_empty() {
        log::warn!("pipeline: gift {} dropped, no listeners registered", gift.id);
        return;
    }
    for listener in snapshot {
        listener(gift.clone());
    }
}
