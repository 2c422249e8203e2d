//! Modbus-TCP-subset polling client for the 8-channel ADC.
//!
//! Owns the connection liveness state machine described by the scheduler:
//! a fresh connection starts `Ok`; each tick sends the fixed request and
//! moves to `Waiting`; a well-formed 25-byte response returns to `Ok`
//! (from `Waiting` or `Missed`); a tick that finds the client still
//! `Waiting` demotes it to `Missed` without re-sending; any transport
//! error drops the connection to `Bad`.

use tracing::{debug, warn};

use super::transport::{AdcTransport, AdcTransportError};

/// Fixed 12-byte Modbus-TCP request: read 8 input registers from address 0.
pub const ADC_REQUEST: [u8; 12] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x04, 0x00, 0x00, 0x00, 0x08,
];

/// Expected response length: 9-byte header + 8 big-endian u16 values.
pub const ADC_RESPONSE_LEN: usize = 25;

/// Liveness state of the ADC connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcState {
    Bad,
    NotConnected,
    Ok,
    Waiting,
    Missed,
}

/// Polling client for the 8-channel ADC.
pub struct AdcClient<T> {
    transport: Option<T>,
    state: AdcState,
}

impl<T: AdcTransport> AdcClient<T> {
    pub fn new() -> Self {
        Self {
            transport: None,
            state: AdcState::NotConnected,
        }
    }

    pub fn state(&self) -> AdcState {
        self.state
    }

    /// True while the scheduler should attempt (re)connection.
    pub fn needs_reconnect(&self) -> bool {
        self.transport.is_none()
            && matches!(self.state, AdcState::Bad | AdcState::NotConnected)
    }

    /// Attach a freshly connected transport.
    pub fn connect(&mut self, transport: T) {
        self.transport = Some(transport);
        self.state = AdcState::Ok;
    }

    /// Drive one scheduler tick: send the request if the state machine
    /// permits it. Returns `Ok(true)` if a request was sent.
    pub fn tick(&mut self) -> Result<bool, AdcTransportError> {
        match self.state {
            AdcState::Ok | AdcState::Missed => {
                let sent = self.send_request();
                if sent.is_ok() {
                    self.state = AdcState::Waiting;
                }
                sent.map(|()| true)
            }
            AdcState::Waiting => {
                warn!("adc not responding");
                self.state = AdcState::Missed;
                Ok(false)
            }
            AdcState::Bad | AdcState::NotConnected => Ok(false),
        }
    }

    fn send_request(&mut self) -> Result<(), AdcTransportError> {
        match self.transport.as_mut() {
            Some(t) => match t.send(&ADC_REQUEST) {
                Ok(()) => Ok(()),
                Err(e) => {
                    self.to_bad();
                    Err(e)
                }
            },
            None => {
                self.to_bad();
                Err(AdcTransportError::WriteFailed("no transport".to_string()))
            }
        }
    }

    /// Poll for a response and decode it if one arrived. A response whose
    /// length is not exactly [`ADC_RESPONSE_LEN`] is ignored and does not
    /// advance the state machine.
    pub fn poll_response(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Option<[u16; 8]>, AdcTransportError> {
        let data = match self.transport.as_mut() {
            Some(t) => match t.recv(timeout) {
                Ok(d) => d,
                Err(e) => {
                    self.to_bad();
                    return Err(e);
                }
            },
            None => return Ok(None),
        };

        let Some(data) = data else { return Ok(None) };
        if data.len() != ADC_RESPONSE_LEN {
            return Ok(None);
        }

        let was_missed = self.state == AdcState::Missed;
        self.state = AdcState::Ok;
        if was_missed {
            debug!("adc ok");
        }

        let mut values = [0u16; 8];
        for (i, v) in values.iter_mut().enumerate() {
            let off = 9 + i * 2;
            *v = u16::from_be_bytes([data[off], data[off + 1]]);
        }
        Ok(Some(values))
    }

    fn to_bad(&mut self) {
        self.state = AdcState::Bad;
        self.transport = None;
    }
}

impl<T: AdcTransport> Default for AdcClient<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adc::transport::fake::FakeAdcTransport;
    use std::time::Duration;

    fn response_bytes(values: [u16; 8]) -> Vec<u8> {
        let mut out = vec![0u8; 9];
        for v in values {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out
    }

    #[test]
    fn starts_not_connected() {
        let client: AdcClient<FakeAdcTransport> = AdcClient::new();
        assert_eq!(client.state(), AdcState::NotConnected);
        assert!(client.needs_reconnect());
    }

    #[test]
    fn connect_moves_to_ok() {
        let mut client = AdcClient::new();
        client.connect(FakeAdcTransport::new());
        assert_eq!(client.state(), AdcState::Ok);
        assert!(!client.needs_reconnect());
    }

    #[test]
    fn tick_from_ok_sends_request_and_waits() {
        let mut client = AdcClient::new();
        client.connect(FakeAdcTransport::new());
        assert!(client.tick().unwrap());
        assert_eq!(client.state(), AdcState::Waiting);
    }

    #[test]
    fn second_tick_while_waiting_demotes_to_missed_without_resend() {
        let mut client = AdcClient::new();
        client.connect(FakeAdcTransport::new());
        client.tick().unwrap();
        assert!(!client.tick().unwrap());
        assert_eq!(client.state(), AdcState::Missed);
    }

    #[test]
    fn well_formed_response_returns_to_ok() {
        let mut client = AdcClient::new();
        client.connect(FakeAdcTransport::new());
        client.tick().unwrap();
        client
            .transport
            .as_mut()
            .unwrap()
            .queue_response(&response_bytes([1, 2, 3, 4, 5, 6, 7, 8]));
        let values = client.poll_response(Duration::from_millis(10)).unwrap();
        assert_eq!(values, Some([1, 2, 3, 4, 5, 6, 7, 8]));
        assert_eq!(client.state(), AdcState::Ok);
    }

    #[test]
    fn malformed_response_length_is_ignored() {
        let mut client = AdcClient::new();
        client.connect(FakeAdcTransport::new());
        client.tick().unwrap();
        client.transport.as_mut().unwrap().queue_response(&[0u8; 10]);
        let values = client.poll_response(Duration::from_millis(10)).unwrap();
        assert_eq!(values, None);
        assert_eq!(client.state(), AdcState::Waiting);
    }

    #[test]
    fn missed_recovers_to_ok_on_response() {
        let mut client = AdcClient::new();
        client.connect(FakeAdcTransport::new());
        client.tick().unwrap();
        client.tick().unwrap();
        assert_eq!(client.state(), AdcState::Missed);
        client
            .transport
            .as_mut()
            .unwrap()
            .queue_response(&response_bytes([0; 8]));
        client.poll_response(Duration::from_millis(10)).unwrap();
        assert_eq!(client.state(), AdcState::Ok);
    }

    #[test]
    fn send_failure_drops_to_bad_and_clears_transport() {
        let mut client = AdcClient::new();
        client.connect(FakeAdcTransport::new());
        client.transport.as_mut().unwrap().fail_next_send = true;
        assert!(client.tick().is_err());
        assert_eq!(client.state(), AdcState::Bad);
        assert!(client.needs_reconnect());
    }
}
