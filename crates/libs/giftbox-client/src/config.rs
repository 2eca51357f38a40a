use std::time::Duration;

/// Tunables for the exchange engine.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// How long a correlated request may wait for its response before it
    /// resolves as [`GiftError::Timeout`](giftbox_proto::GiftError::Timeout).
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { request_timeout: Duration::from_secs(10) }
    }
}

impl ClientConfig {
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}
