//! L7 Ports
//!
//! Port definitions (traits) for the L7 channel protocol.
//! These define the boundaries between the protocol engine and infrastructure:
//! - [`Connector`] / [`Transport`]: the point-to-point frame pipe
//! - [`ChannelObserver`]: where protocol events are reported

mod error;
mod observer;
mod transport;

pub use error::TransportError;
pub use observer::{ChannelObserver, NoopObserver};
pub use transport::{Connector, Transport};
