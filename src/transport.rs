//! Transport collaborator contract
//!
//! A [`Transport`] is one message channel between this device and the
//! outside world: the pipeline drives exactly two of them, one tagged
//! [`Origin::Local`] and one tagged [`Origin::Cloud`]. Socket and radio
//! implementations live outside this crate; what ships here is the trait
//! plus [`ChannelTransport`], an in-process mailbox used for tests and
//! loopback embedding.
//!
//! [`Origin::Local`]: crate::dispatcher::Origin::Local
//! [`Origin::Cloud`]: crate::dispatcher::Origin::Cloud

use crate::dispatcher::{Origin, Request};
use crate::ids::RequestId;
use http::Method;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// One message channel (local or cloud).
///
/// `receive_message` may block the calling worker coroutine; the pipeline
/// only ever invokes it from the retrieval worker pool so a stalled source
/// cannot stall the drain loop.
pub trait Transport: Send + Sync {
    /// Pull the next pending request, or `None` when nothing is waiting.
    fn receive_message(&self) -> Option<Request>;

    /// Deliver a serialized response to the peer identified by `id`.
    /// Returns `false` when the transport could not hand it off.
    fn send_message(&self, id: &str, serialized: &str) -> bool;

    /// Bring the channel up. Returns `false` on failure.
    fn start(&self, port: u16) -> bool;

    /// Tear the channel down.
    fn stop(&self);
}

/// In-process mailbox transport.
///
/// Messages are injected with [`inject`](ChannelTransport::inject), which
/// mints a fresh [`RequestId`] for them the way a socket transport would
/// assign a connection id. Delivered responses accumulate in a sent-list
/// that tests inspect with [`sent`](ChannelTransport::sent).
///
/// The origin tag on injected requests is a placeholder; the pipeline
/// stamps the real origin when it retrieves them.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    inbound: Mutex<VecDeque<Request>>,
    outbound: Mutex<Vec<(String, String)>>,
    started: AtomicBool,
}

impl ChannelTransport {
    /// Create an empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message as if it had just arrived on the wire, minting an
    /// id for it. Returns the minted id.
    pub fn inject(&self, method: Method, path: &str, body: &str) -> String {
        let id = RequestId::new().to_string();
        self.inject_with_id(&id, method, path, body);
        id
    }

    /// Queue a message that already carries an id.
    pub fn inject_with_id(&self, id: &str, method: Method, path: &str, body: &str) {
        self.inbound.lock().push_back(Request {
            method,
            path: path.to_string(),
            body: body.to_string(),
            id: id.to_string(),
            origin: Origin::Local,
        });
    }

    /// Snapshot of every `(id, serialized response)` delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, String)> {
        self.outbound.lock().clone()
    }

    /// Number of pending (not yet retrieved) inbound messages.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inbound.lock().len()
    }

    /// Whether `start` has been called without a matching `stop`.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }
}

impl Transport for ChannelTransport {
    fn receive_message(&self) -> Option<Request> {
        self.inbound.lock().pop_front()
    }

    fn send_message(&self, id: &str, serialized: &str) -> bool {
        if id.is_empty() || serialized.is_empty() {
            return false;
        }
        debug!(id = %id, bytes = serialized.len(), "Message sent");
        self.outbound
            .lock()
            .push((id.to_string(), serialized.to_string()));
        true
    }

    fn start(&self, port: u16) -> bool {
        info!(port, "Channel transport started");
        self.started.store(true, Ordering::Relaxed);
        true
    }

    fn stop(&self) {
        info!("Channel transport stopped");
        self.started.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_and_receive() {
        let transport = ChannelTransport::new();
        let id = transport.inject(Method::GET, "/api", "");
        assert!(!id.is_empty());
        assert_eq!(transport.pending(), 1);

        let request = transport.receive_message().unwrap();
        assert_eq!(request.id, id);
        assert_eq!(request.path, "/api");
        assert!(transport.receive_message().is_none());
    }

    #[test]
    fn test_send_records_delivery() {
        let transport = ChannelTransport::new();
        assert!(transport.send_message("id-1", "payload"));
        assert!(!transport.send_message("", "payload"));
        assert!(!transport.send_message("id-2", ""));
        assert_eq!(transport.sent(), vec![("id-1".to_string(), "payload".to_string())]);
    }

    #[test]
    fn test_start_stop() {
        let transport = ChannelTransport::new();
        assert!(!transport.is_started());
        assert!(transport.start(8080));
        assert!(transport.is_started());
        transport.stop();
        assert!(!transport.is_started());
    }
}
