//! Pluggable USB bulk transport.
//!
//! `UsbTransport` abstracts a single controller's bulk-in/bulk-out
//! endpoints so the codec and registry never depend on a concrete USB
//! stack. A production binary backs this with a `rusb`-based
//! implementation; tests back it with an in-memory fake.

use std::time::Duration;

use thiserror::Error;

/// Error type for USB transport operations.
#[derive(Debug, Clone, Error)]
pub enum UsbError {
    /// Could not open the device or claim its interface.
    #[error("failed to open device: {0}")]
    OpenFailed(String),

    /// A bulk write failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A bulk read failed or timed out.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// The device was disconnected mid-operation.
    #[error("device disconnected")]
    Disconnected,
}

/// One physical controller's bulk endpoints.
///
/// # Lifecycle
///
/// 1. `write()` - send one encoded request packet
/// 2. `read()` - poll for a response packet (non-blocking; returns `Ok(None)`
///    if nothing has arrived yet)
/// 3. `close()` - release the interface
pub trait UsbTransport: Send {
    /// Opaque identity used to distinguish devices across attach/detach
    /// events (e.g. a USB bus/address pair). Two transports with equal
    /// handles are assumed to be the same physical device.
    fn handle(&self) -> u64;

    /// Send one encoded request packet to the device's bulk-out endpoint.
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<(), UsbError>;

    /// Poll the device's bulk-in endpoint for a response packet.
    ///
    /// Returns `Ok(None)` if no complete packet is available yet; the
    /// scheduler is expected to retry on the next tick.
    fn read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, UsbError>;

    /// Release the interface and close the device.
    fn close(&mut self) -> Result<(), UsbError>;
}

/// Uninhabited `UsbTransport` for binaries that have not wired in a real
/// USB stack. Real vendor/product enumeration and bulk transfer is a
/// `rusb`-based concern left out of this core's scope; this type lets a
/// binary still instantiate a `DeviceRegistry<T>` and run its ADC/observer
/// surfaces without a USB backend, with no device ever actually attaching.
pub enum NullUsbTransport {}

impl UsbTransport for NullUsbTransport {
    fn handle(&self) -> u64 {
        match *self {}
    }

    fn write(&mut self, _data: &[u8], _timeout: Duration) -> Result<(), UsbError> {
        match *self {}
    }

    fn read(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, UsbError> {
        match *self {}
    }

    fn close(&mut self) -> Result<(), UsbError> {
        match *self {}
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory `UsbTransport` for tests: records writes, replays queued
    /// reads.
    pub struct FakeUsbTransport {
        pub handle: u64,
        pub writes: Vec<Vec<u8>>,
        pub pending_reads: VecDeque<Vec<u8>>,
        pub closed: bool,
        pub fail_next_write: bool,
    }

    impl FakeUsbTransport {
        pub fn new(handle: u64) -> Self {
            Self {
                handle,
                writes: Vec::new(),
                pending_reads: VecDeque::new(),
                closed: false,
                fail_next_write: false,
            }
        }

        pub fn queue_response(&mut self, data: &[u8]) {
            self.pending_reads.push_back(data.to_vec());
        }
    }

    impl UsbTransport for FakeUsbTransport {
        fn handle(&self) -> u64 {
            self.handle
        }

        fn write(&mut self, data: &[u8], _timeout: Duration) -> Result<(), UsbError> {
            if self.fail_next_write {
                self.fail_next_write = false;
                return Err(UsbError::WriteFailed("simulated failure".to_string()));
            }
            self.writes.push(data.to_vec());
            Ok(())
        }

        fn read(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, UsbError> {
            Ok(self.pending_reads.pop_front())
        }

        fn close(&mut self) -> Result<(), UsbError> {
            self.closed = true;
            Ok(())
        }
    }

    #[test]
    fn fake_records_writes_and_replays_reads() {
        let mut t = FakeUsbTransport::new(1);
        t.queue_response(b"a.OK 123\n");
        t.write(b"a.ser\n", Duration::from_secs(1)).unwrap();
        assert_eq!(t.writes[0], b"a.ser\n");
        let resp = t.read(Duration::from_secs(1)).unwrap();
        assert_eq!(resp, Some(b"a.OK 123\n".to_vec()));
        assert_eq!(t.read(Duration::from_secs(1)).unwrap(), None);
    }
}
