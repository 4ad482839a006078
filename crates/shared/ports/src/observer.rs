use l7_core::{ChannelState, ProtocolMessage};

use crate::error::TransportError;

/// Port for channel observability
///
/// Injected into each channel at construction, so different channels in one
/// process can report to different sinks:
/// - log forwarding in production
/// - recording observers in tests
///
/// Every method has an empty default; implement only what you need.
pub trait ChannelObserver: Send + Sync {
    /// The channel moved between lifecycle states
    fn state_changed(&self, from: ChannelState, to: ChannelState) {
        let _ = (from, to);
    }

    /// A frame was written to the transport
    fn frame_sent(&self, message: &ProtocolMessage) {
        let _ = message;
    }

    /// A frame passed decoding and ordering checks
    fn frame_received(&self, message: &ProtocolMessage) {
        let _ = message;
    }

    /// The peer broke the protocol; the channel is about to fail
    fn peer_violation(&self, description: &str) {
        let _ = description;
    }

    /// An ERROR frame could not be delivered to the peer
    fn notify_failed(&self, error: &TransportError) {
        let _ = error;
    }

    /// An application payload was discarded (unknown topic, full queue)
    fn payload_dropped(&self, topic: &str, reason: &str) {
        let _ = (topic, reason);
    }

    /// Observer name for debugging
    fn name(&self) -> &str {
        "ChannelObserver"
    }
}

/// Observer that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ChannelObserver for NoopObserver {
    fn name(&self) -> &str {
        "NoopObserver"
    }
}
