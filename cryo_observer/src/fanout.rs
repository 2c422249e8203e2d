//! Observer connection registry and broadcast fan-out.

use tracing::warn;

use cryo_common::config::SupervisorConfig;

use crate::message::OutboundMessage;
use crate::transport::ObserverTransport;

struct Connection<T: ObserverTransport> {
    transport: T,
    name: Option<String>,
    verbose: bool,
}

/// Tracks every connected observer and fans broadcasts out to all of them.
pub struct ObserverRegistry<T: ObserverTransport> {
    connections: Vec<Connection<T>>,
}

impl<T: ObserverTransport> ObserverRegistry<T> {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
        }
    }

    pub fn connect(&mut self, transport: T) {
        self.connections.push(Connection {
            transport,
            name: None,
            verbose: false,
        });
    }

    pub fn disconnect(&mut self, id: u64) {
        if let Some(idx) = self.connections.iter().position(|c| c.transport.id() == id) {
            let mut conn = self.connections.remove(idx);
            conn.transport.close();
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn set_name(&mut self, id: u64, name: Option<String>) {
        if let Some(conn) = self.connections.iter_mut().find(|c| c.transport.id() == id) {
            conn.name = name;
        }
    }

    pub fn name_of(&self, id: u64) -> Option<&str> {
        self.connections
            .iter()
            .find(|c| c.transport.id() == id)
            .and_then(|c| c.name.as_deref())
    }

    pub fn set_verbose(&mut self, id: u64, verbose: bool) {
        if let Some(conn) = self.connections.iter_mut().find(|c| c.transport.id() == id) {
            conn.verbose = verbose;
        }
    }

    pub fn is_verbose(&self, id: u64) -> bool {
        self.connections
            .iter()
            .find(|c| c.transport.id() == id)
            .map(|c| c.verbose)
            .unwrap_or(false)
    }

    pub fn connected_ids(&self) -> Vec<u64> {
        self.connections.iter().map(|c| c.transport.id()).collect()
    }

    /// Send one message to one observer, by id.
    pub fn send_to(&mut self, id: u64, msg: &OutboundMessage) {
        if let Some(conn) = self.connections.iter_mut().find(|c| c.transport.id() == id) {
            if let Err(e) = conn.transport.send_line(&msg.to_line()) {
                warn!(observer_id = id, error = %e, "failed to send to observer");
            }
        }
    }

    /// Broadcast to every connected observer, dropping any that fail to
    /// accept the write (the caller should then call `disconnect`).
    pub fn broadcast(&mut self, msg: &OutboundMessage) -> Vec<u64> {
        let mut failed = Vec::new();
        for conn in &mut self.connections {
            if let Err(e) = conn.transport.send_line(&msg.to_line()) {
                warn!(observer_id = conn.transport.id(), error = %e, "broadcast failed, dropping observer");
                failed.push(conn.transport.id());
            }
        }
        failed
    }

    /// Broadcast only to observers whose verbose flag is set.
    pub fn broadcast_verbose(&mut self, msg: &OutboundMessage) -> Vec<u64> {
        let mut failed = Vec::new();
        for conn in self.connections.iter_mut().filter(|c| c.verbose) {
            if let Err(e) = conn.transport.send_line(&msg.to_line()) {
                warn!(observer_id = conn.transport.id(), error = %e, "verbose broadcast failed, dropping observer");
                failed.push(conn.transport.id());
            }
        }
        failed
    }

    /// Drain one pending inbound line per connected observer, pairing it
    /// with whether the remote address is authorized to act on it.
    pub fn poll_inbound(&mut self, config: &SupervisorConfig) -> Vec<(u64, bool, String)> {
        let mut out = Vec::new();
        for conn in &mut self.connections {
            match conn.transport.try_recv_line() {
                Ok(Some(line)) => {
                    let authorized = config.is_authorized(&conn.transport.remote_addr());
                    out.push((conn.transport.id(), authorized, line));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(observer_id = conn.transport.id(), error = %e, "observer receive failed");
                }
            }
        }
        out
    }
}

impl<T: ObserverTransport> Default for ObserverRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeObserverTransport;
    use cryo_common::config::{CalibrationConfig, DeviceIdentityConfig, LogLevel, NetworkConfig};
    use cryo_common::calib::{CalibrationPoint, CalibrationTable};

    fn sample_table() -> CalibrationTable {
        CalibrationTable::new(vec![
            CalibrationPoint { raw: 0.0, calibrated: 0.0 },
            CalibrationPoint { raw: 1.0, calibrated: 1.0 },
        ])
        .unwrap()
    }

    fn config_with_allow_list(allow_list: Vec<String>) -> SupervisorConfig {
        SupervisorConfig {
            log_level: LogLevel::Info,
            log_dir: "/tmp".to_string(),
            tick_period_ms: 80,
            network: NetworkConfig {
                adc_host: "10.0.0.5".to_string(),
                adc_port: 502,
                bind_addr: "0.0.0.0:8080".to_string(),
            },
            identity: DeviceIdentityConfig {
                slot0_serial: "AVR0".to_string(),
                slot1_serial: "AVR1".to_string(),
            },
            calibration: CalibrationConfig {
                damper_position: [sample_table(), sample_table(), sample_table()],
                stage_position: [sample_table(), sample_table(), sample_table()],
                air_pressure: sample_table(),
            },
            allow_list,
        }
    }

    #[test]
    fn connect_and_disconnect_track_count() {
        let mut reg: ObserverRegistry<FakeObserverTransport> = ObserverRegistry::new();
        reg.connect(FakeObserverTransport::new(1, "127.0.0.1"));
        reg.connect(FakeObserverTransport::new(2, "127.0.0.1"));
        assert_eq!(reg.len(), 2);
        reg.disconnect(1);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.connected_ids(), vec![2]);
    }

    #[test]
    fn broadcast_reaches_every_connection() {
        let mut reg: ObserverRegistry<FakeObserverTransport> = ObserverRegistry::new();
        reg.connect(FakeObserverTransport::new(1, "127.0.0.1"));
        reg.connect(FakeObserverTransport::new(2, "127.0.0.1"));
        let failed = reg.broadcast(&OutboundMessage::Active(true));
        assert!(failed.is_empty());
    }

    #[test]
    fn broadcast_reports_failed_connections_without_panicking() {
        let mut reg: ObserverRegistry<FakeObserverTransport> = ObserverRegistry::new();
        let mut t = FakeObserverTransport::new(1, "127.0.0.1");
        t.fail_next_send = true;
        reg.connect(t);
        let failed = reg.broadcast(&OutboundMessage::Active(true));
        assert_eq!(failed, vec![1]);
    }

    #[test]
    fn broadcast_verbose_only_reaches_verbose_observers() {
        let mut reg: ObserverRegistry<FakeObserverTransport> = ObserverRegistry::new();
        reg.connect(FakeObserverTransport::new(1, "127.0.0.1"));
        reg.connect(FakeObserverTransport::new(2, "127.0.0.1"));
        reg.set_verbose(2, true);
        reg.broadcast_verbose(&OutboundMessage::Active(true));
        assert_eq!(reg.is_verbose(1), false);
        assert_eq!(reg.is_verbose(2), true);
    }

    #[test]
    fn poll_inbound_flags_unauthorized_addresses() {
        let mut reg: ObserverRegistry<FakeObserverTransport> = ObserverRegistry::new();
        let mut t = FakeObserverTransport::new(1, "203.0.113.7");
        t.queue_line("help");
        reg.connect(t);
        let config = config_with_allow_list(vec!["127.0.0.1".to_string()]);
        let inbound = reg.poll_inbound(&config);
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].1, false);
        assert_eq!(inbound[0].2, "help");
    }

    #[test]
    fn poll_inbound_authorizes_wildcard_allow_list() {
        let mut reg: ObserverRegistry<FakeObserverTransport> = ObserverRegistry::new();
        let mut t = FakeObserverTransport::new(1, "203.0.113.7");
        t.queue_line("who");
        reg.connect(t);
        let config = config_with_allow_list(vec!["*".to_string()]);
        let inbound = reg.poll_inbound(&config);
        assert!(inbound[0].1);
    }
}
