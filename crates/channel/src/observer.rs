//! Default channel observer: forwards protocol events to the `log` facade

use l7_core::{ChannelState, ProtocolMessage};
use l7_ports::{ChannelObserver, TransportError};
use log::{debug, info, warn};

/// Observer writing every event to `log`, prefixed with a channel label
#[derive(Debug, Clone)]
pub struct LogObserver {
    label: String,
}

impl LogObserver {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ChannelObserver for LogObserver {
    fn state_changed(&self, from: ChannelState, to: ChannelState) {
        info!("[{}] {} -> {}", self.label, from, to);
    }

    fn frame_sent(&self, message: &ProtocolMessage) {
        debug!("[{}] sent {} {}", self.label, message.kind, message.id);
    }

    fn frame_received(&self, message: &ProtocolMessage) {
        debug!("[{}] received {} {}", self.label, message.kind, message.id);
    }

    fn peer_violation(&self, description: &str) {
        warn!("[{}] bad peer: {}", self.label, description);
    }

    fn notify_failed(&self, error: &TransportError) {
        warn!("[{}] could not notify peer: {}", self.label, error);
    }

    fn payload_dropped(&self, topic: &str, reason: &str) {
        warn!("[{}] dropped payload on {:?}: {}", self.label, topic, reason);
    }

    fn name(&self) -> &str {
        &self.label
    }
}
