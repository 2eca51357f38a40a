//! Scripted session double shared by the unit tests.

use crate::session::NetworkSession;
use async_trait::async_trait;
use giftbox_proto::{EventFrame, EventKind, GiftError, ReceivedGift, RequestFrame, ResponseBody, ResponseFrame};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Scripted reaction to one submitted frame, in submission order.
pub(crate) enum Reply {
    /// Answer immediately with this body, correlated to the submitted token.
    Respond(ResponseBody),
    /// Swallow the frame; the caller is left waiting.
    Silence,
}

/// In-memory [`NetworkSession`] that replays a scripted set of responses.
///
/// All event kinds share one broadcast channel; consumers filter by frame
/// variant exactly like they do against a real session.
pub(crate) struct ScriptedSession {
    connected: AtomicBool,
    script: Mutex<VecDeque<Reply>>,
    submitted: Mutex<Vec<RequestFrame>>,
    events: broadcast::Sender<EventFrame>,
}

impl ScriptedSession {
    pub(crate) fn connected() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            script: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            events: broadcast::channel(64).0,
        })
    }

    pub(crate) fn disconnected() -> Arc<Self> {
        let session = Self::connected();
        session.connected.store(false, Ordering::Relaxed);
        session
    }

    pub(crate) fn script(&self, reply: Reply) {
        self.script.lock().expect("script mutex poisoned").push_back(reply);
    }

    pub(crate) fn submitted(&self) -> Vec<RequestFrame> {
        self.submitted.lock().expect("submitted mutex poisoned").clone()
    }

    pub(crate) fn emit_response(&self, frame: ResponseFrame) {
        let _ = self.events.send(EventFrame::Response(frame));
    }

    pub(crate) fn emit_gift(&self, gift: ReceivedGift) {
        let _ = self.events.send(EventFrame::GiftReceived(gift));
    }

    /// Polls until `count` frames have been submitted; panics after one
    /// second so a wedged test fails fast.
    pub(crate) async fn wait_for_submissions(&self, count: usize) -> Vec<RequestFrame> {
        for _ in 0..100 {
            let frames = self.submitted();
            if frames.len() >= count {
                return frames;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} submissions, saw {}", self.submitted().len());
    }
}

#[async_trait]
impl NetworkSession for ScriptedSession {
    async fn submit(&self, frame: RequestFrame) -> Result<(), GiftError> {
        let token = frame.token;
        self.submitted.lock().expect("submitted mutex poisoned").push(frame);
        let reply = self.script.lock().expect("script mutex poisoned").pop_front();
        match reply {
            Some(Reply::Respond(body)) => {
                self.emit_response(ResponseFrame { token, body });
                Ok(())
            }
            Some(Reply::Silence) | None => Ok(()),
        }
    }

    fn subscribe(&self, _kind: EventKind) -> broadcast::Receiver<EventFrame> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
