//! ADC (Modbus-TCP subset) polling client.

pub mod client;
pub mod transport;

pub use client::{AdcClient, AdcState, ADC_REQUEST, ADC_RESPONSE_LEN};
pub use transport::{AdcTransport, AdcTransportError};
