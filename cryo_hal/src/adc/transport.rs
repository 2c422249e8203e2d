//! Pluggable ADC (Modbus-TCP) transport.

use std::time::Duration;

use thiserror::Error;

/// Error type for ADC transport operations.
#[derive(Debug, Clone, Error)]
pub enum AdcTransportError {
    #[error("failed to connect: {0}")]
    ConnectFailed(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("read failed: {0}")]
    ReadFailed(String),
}

/// A single Modbus-TCP-like connection to the ADC.
pub trait AdcTransport: Send {
    /// Send the fixed request packet.
    fn send(&mut self, data: &[u8]) -> Result<(), AdcTransportError>;

    /// Poll for a response packet, non-blocking: returns `Ok(None)` if
    /// nothing has arrived within `timeout`.
    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, AdcTransportError>;
}

/// `AdcTransport` backed by a real TCP socket to the Modbus ADC.
///
/// The socket is put in non-blocking mode so `recv` can be polled once
/// per scheduler tick without stalling the engine thread.
pub struct TcpAdcTransport {
    stream: std::net::TcpStream,
}

impl TcpAdcTransport {
    pub fn connect(addr: &str) -> Result<Self, AdcTransportError> {
        let stream = std::net::TcpStream::connect(addr)
            .map_err(|e| AdcTransportError::ConnectFailed(e.to_string()))?;
        stream
            .set_nonblocking(true)
            .map_err(|e| AdcTransportError::ConnectFailed(e.to_string()))?;
        Ok(Self { stream })
    }
}

impl AdcTransport for TcpAdcTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), AdcTransportError> {
        use std::io::Write;
        self.stream
            .write_all(data)
            .map_err(|e| AdcTransportError::WriteFailed(e.to_string()))
    }

    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, AdcTransportError> {
        use std::io::Read;
        let deadline = std::time::Instant::now() + timeout;
        let mut buf = [0u8; 256];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return Err(AdcTransportError::ReadFailed("connection closed".to_string())),
                Ok(n) => return Ok(Some(buf[..n].to_vec())),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if std::time::Instant::now() >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(e) => return Err(AdcTransportError::ReadFailed(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::VecDeque;

    pub struct FakeAdcTransport {
        pub sent: Vec<Vec<u8>>,
        pub pending: VecDeque<Vec<u8>>,
        pub fail_next_send: bool,
    }

    impl FakeAdcTransport {
        pub fn new() -> Self {
            Self {
                sent: Vec::new(),
                pending: VecDeque::new(),
                fail_next_send: false,
            }
        }

        pub fn queue_response(&mut self, data: &[u8]) {
            self.pending.push_back(data.to_vec());
        }
    }

    impl AdcTransport for FakeAdcTransport {
        fn send(&mut self, data: &[u8]) -> Result<(), AdcTransportError> {
            if self.fail_next_send {
                self.fail_next_send = false;
                return Err(AdcTransportError::WriteFailed("simulated".to_string()));
            }
            self.sent.push(data.to_vec());
            Ok(())
        }

        fn recv(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, AdcTransportError> {
            Ok(self.pending.pop_front())
        }
    }
}
