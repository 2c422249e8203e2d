//! Cryo HAL
//!
//! Hardware transport layer for the cryostat supervisor: the USB bulk
//! line protocol and device identity registry for motor/GPIO
//! controllers, and the Modbus-TCP-subset polling client for the 8-channel
//! ADC. Both hardware channels are abstracted behind small traits
//! (`UsbTransport`, `AdcTransport`) so the rest of the workspace never
//! depends on a concrete USB or socket stack.

pub mod adc;
pub mod usb;
