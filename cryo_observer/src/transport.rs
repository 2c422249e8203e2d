//! Pluggable observer transport.
//!
//! The outer HTTP/WebSocket upgrade and exact frame boundaries are out of
//! scope for this core; `ObserverTransport` abstracts one connected
//! client down to line-oriented send/receive so the fan-out and command
//! logic never depends on that framing. A minimal TCP-backed
//! implementation makes the crate runnable without a reverse proxy.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ObserverTransportError {
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
    #[error("connection closed")]
    Closed,
}

/// One connected observer's line-oriented I/O.
pub trait ObserverTransport: Send {
    /// Opaque identity, stable for the lifetime of the connection.
    fn id(&self) -> u64;

    /// Remote address, used for allow-list authorization.
    fn remote_addr(&self) -> String;

    /// Send one ASCII line (without trailing newline; the transport adds
    /// framing as appropriate).
    fn send_line(&mut self, line: &str) -> Result<(), ObserverTransportError>;

    /// Non-blocking poll for one inbound line, if any has arrived.
    fn try_recv_line(&mut self) -> Result<Option<String>, ObserverTransportError>;

    /// Close the connection.
    fn close(&mut self);
}

/// `ObserverTransport` backed by a raw TCP connection. A production
/// deployment would sit this behind a reverse proxy doing the WebSocket
/// upgrade; accepted here as a plain line-oriented socket so the crate is
/// runnable standalone, per the scope boundary in [`crate`]'s module docs.
pub struct TcpObserverTransport {
    id: u64,
    addr: String,
    stream: std::net::TcpStream,
    read_buf: Vec<u8>,
}

impl TcpObserverTransport {
    pub fn from_stream(id: u64, stream: std::net::TcpStream) -> Result<Self, ObserverTransportError> {
        let addr = stream
            .peer_addr()
            .map(|a| a.ip().to_string())
            .unwrap_or_default();
        stream
            .set_nonblocking(true)
            .map_err(|e| ObserverTransportError::ReceiveFailed(e.to_string()))?;
        Ok(Self { id, addr, stream, read_buf: Vec::new() })
    }
}

impl ObserverTransport for TcpObserverTransport {
    fn id(&self) -> u64 {
        self.id
    }

    fn remote_addr(&self) -> String {
        self.addr.clone()
    }

    fn send_line(&mut self, line: &str) -> Result<(), ObserverTransportError> {
        use std::io::Write;
        writeln!(self.stream, "{line}").map_err(|e| ObserverTransportError::SendFailed(e.to_string()))
    }

    fn try_recv_line(&mut self) -> Result<Option<String>, ObserverTransportError> {
        use std::io::Read;
        let mut tmp = [0u8; 512];
        loop {
            match self.stream.read(&mut tmp) {
                Ok(0) => return Err(ObserverTransportError::Closed),
                Ok(n) => self.read_buf.extend_from_slice(&tmp[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(ObserverTransportError::ReceiveFailed(e.to_string())),
            }
        }
        match self.read_buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let raw: Vec<u8> = self.read_buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw[..raw.len() - 1])
                    .trim_end_matches('\r')
                    .to_string();
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}
