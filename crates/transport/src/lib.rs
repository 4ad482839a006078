//! L7 Transport
//!
//! Concrete [`Connector`](l7_ports::Connector) / [`Transport`](l7_ports::Transport)
//! adapters for the channel protocol:
//!
//! - **Memory** ([`MemoryNetwork`]): in-process endpoints over tokio channels,
//!   used for single-process operation and deterministic tests
//! - **TCP** ([`TcpConnector`]): length-delimited frames over a TCP stream
//!
//! ## Architecture
//!
//! ```text
//!   Channel (protocol engine)
//!         │ send(frame) / recv() / close()
//!    ┌────▼──────┐
//!    │ Transport │  l7-ports
//!    └────┬──────┘
//!         │
//!   ┌─────┴───────────┐
//!   │ Memory  │  TCP  │  this crate
//!   └─────────────────┘
//! ```

pub mod config;
pub mod memory;
pub mod tcp;

// Re-export commonly used types
pub use config::TcpConfig;
pub use memory::{MemoryNetwork, MemoryTransport};
pub use tcp::{TcpConnector, TcpTransport, socket_address};
