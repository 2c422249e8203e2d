//! USB controller transport, line protocol, and device identity registry.

pub mod codec;
pub mod registry;
pub mod transport;

pub use codec::{encode_request, parse_responses, ResponseLine, ResponseStatus};
pub use registry::{DeviceRegistry, IdentifyOutcome, Liveness, RegistryError, Slot};
pub use transport::{UsbError, UsbTransport};
