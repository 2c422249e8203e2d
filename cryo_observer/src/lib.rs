//! Cryo Observer
//!
//! Fan-out to connected dashboard observers and the operator command
//! plane: wire-format outbound messages, inbound command parsing, and
//! the registry that tracks per-connection name/verbosity state and
//! broadcasts ticks and history replay to everyone watching.

pub mod command;
pub mod fanout;
pub mod message;
pub mod transport;

pub use command::{ActiveArg, InboundCommand};
pub use fanout::ObserverRegistry;
pub use message::{LiveSample, OutboundMessage};
pub use transport::{ObserverTransport, ObserverTransportError, TcpObserverTransport};
