//! The supervisor engine (C6-C10 tied together).
//!
//! Owns every piece of mutable state the original teacher's `HalCore`
//! owned for its axes — driver, slot table, timing stats — generalized
//! to three dampers, an ADC link, and a set of dashboard observers. One
//! `Engine` instance is driven from a single thread; nothing here is
//! `Sync`, and nothing needs to be, because the scheduler tick, USB
//! response handling, and inbound observer commands are strictly
//! serialized by the caller (see `main.rs`).

use std::time::Duration;

use tracing::{debug, info, warn};

use cryo_common::config::{CalibrationConfig, SupervisorConfig};
use cryo_common::consts::{
    MOTOR_STEPS_PER_MM, NUM_AXES, NUM_LIMIT_SWITCHES, USB_TRANSFER_TIMEOUT_MS,
};

use cryo_control_unit::control::{self, ActivationState};
use cryo_control_unit::history::HistoryRing;
use cryo_control_unit::motor::{self, MotorCommand, MotorShadow};
use cryo_control_unit::physical::{self, CalibrationTables, PhysicalState};
use cryo_control_unit::safety::{self, BadPollKind, BadPollTracker, LimitSwitches};

use cryo_hal::adc::client::{AdcClient, AdcState};
use cryo_hal::adc::transport::AdcTransport;
use cryo_hal::usb::codec::{encode_request, parse_responses, ResponseLine, ResponseStatus};
use cryo_hal::usb::registry::{DeviceRegistry, IdentifyOutcome};
use cryo_hal::usb::transport::UsbTransport;

use cryo_observer::command::{ActiveArg, InboundCommand};
use cryo_observer::fanout::ObserverRegistry;
use cryo_observer::message::{LiveSample, OutboundMessage};
use cryo_observer::transport::ObserverTransport;

use crate::logsink::LogSink;

const MOTOR_SLOT: usize = 0;
const RESERVED_SLOT: usize = 1;

fn usb_timeout() -> Duration {
    Duration::from_millis(USB_TRANSFER_TIMEOUT_MS)
}

fn zero_physical_state() -> PhysicalState {
    PhysicalState {
        damper_position: [0.0; NUM_AXES],
        stage_position: [0.0; NUM_AXES],
        air_pressure: 0.0,
        damper_load: [0.0; NUM_AXES],
        damper_add_weight: [0.0; NUM_AXES],
    }
}

fn calibration_tables(cfg: &CalibrationConfig) -> CalibrationTables {
    CalibrationTables {
        damper_position: cfg.damper_position.clone(),
        stage_position: cfg.stage_position.clone(),
        air_pressure: cfg.air_pressure.clone(),
    }
}

pub struct Engine<U: UsbTransport, A: AdcTransport, O: ObserverTransport> {
    registry: DeviceRegistry<U>,
    adc: AdcClient<A>,
    observers: ObserverRegistry<O>,
    config: SupervisorConfig,
    cal: CalibrationTables,
    log: LogSink,

    motors: MotorShadow,
    physical: PhysicalState,
    activation: ActivationState,
    bad_polls: BadPollTracker,
    limit_switches: LimitSwitches,
    history: HistoryRing,
    full_poll: bool,
    now_ms: u64,
    pending_foreign_release: Vec<usize>,
}

impl<U: UsbTransport, A: AdcTransport, O: ObserverTransport> Engine<U, A, O> {
    pub fn new(config: SupervisorConfig, log: LogSink) -> Self {
        let cal = calibration_tables(&config.calibration);
        let expected = [config.identity.slot0_serial.clone(), config.identity.slot1_serial.clone()];
        Self {
            registry: DeviceRegistry::new(expected),
            adc: AdcClient::new(),
            observers: ObserverRegistry::new(),
            config,
            cal,
            log,
            motors: MotorShadow::default(),
            physical: zero_physical_state(),
            activation: ActivationState::Off,
            bad_polls: BadPollTracker::new(),
            limit_switches: safety::all_hit(),
            history: HistoryRing::new(),
            full_poll: false,
            now_ms: 0,
            pending_foreign_release: Vec::new(),
        }
    }

    // ── ADC connection management ──

    pub fn adc_needs_reconnect(&self) -> bool {
        self.adc.needs_reconnect()
    }

    pub fn adc_connect(&mut self, transport: A) {
        self.adc.connect(transport);
        info!("adc connected");
    }

    pub fn adc_host(&self) -> &str {
        &self.config.network.adc_host
    }

    pub fn adc_port(&self) -> u16 {
        self.config.network.adc_port
    }

    pub fn bind_addr(&self) -> &str {
        &self.config.network.bind_addr
    }

    // ── USB device lifecycle ──

    pub fn usb_attach(&mut self, transport: U) {
        match self.registry.attach(transport) {
            Ok(idx) => debug!(slot = idx, "usb device attached"),
            Err(e) => warn!(error = %e, "usb attach rejected, no free holding slot"),
        }
    }

    pub fn usb_detach(&mut self, handle: u64) {
        if let Some(idx) = self.registry.detach(handle) {
            info!(slot = idx, "usb device detached");
            if idx == MOTOR_SLOT && self.activation != ActivationState::Off {
                self.deactivate("slot 0 controller detached");
            }
        }
    }

    pub fn usb_response(&mut self, handle: u64, data: &[u8]) {
        let Some(idx) = self
            .registry
            .occupied_slots()
            .into_iter()
            .find(|&i| self.registry.slot(i).is_some_and(|s| s.transport.handle() == handle))
        else {
            return;
        };

        for line in parse_responses(data) {
            match idx {
                MOTOR_SLOT => self.handle_motor_response(idx, line),
                RESERVED_SLOT => {
                    if let Some(slot) = self.registry.slot_mut(idx) {
                        slot.alive_this_tick = line.status == ResponseStatus::Ok;
                    }
                }
                _ => self.handle_holding_response(idx, line),
            }
        }
    }

    fn handle_motor_response(&mut self, idx: usize, line: ResponseLine) {
        if let Some(slot) = self.registry.slot_mut(idx) {
            slot.alive_this_tick = line.status == ResponseStatus::Ok;
        }
        match line.id {
            'f' => {
                let nums: Vec<i32> = line
                    .body
                    .split_whitespace()
                    .filter_map(|t| t.parse::<i32>().ok())
                    .collect();
                for axis in 0..NUM_AXES {
                    if let (Some(&speed), Some(&pos)) = (nums.get(axis * 2), nums.get(axis * 2 + 1)) {
                        self.motors.apply_feedback(axis, speed, pos);
                        if self.activation != ActivationState::Off
                            && !safety::motor_stage_consistent(pos, self.physical.stage_position[axis])
                        {
                            self.log_line(&format!("axis {axis} motor/stage position diverged"));
                            self.deactivate("motor/stage position mismatch");
                            break;
                        }
                    }
                }
            }
            'g' => match safety::parse_limit_switches(&line.body) {
                Some(switches) => self.limit_switches = switches,
                None => {
                    self.limit_switches = safety::all_hit();
                    self.send_motor_command(MotorCommand::HaltAll);
                    self.log_line("malformed limit-switch poll, halting all axes");
                }
            },
            _ => {}
        }
    }

    fn handle_holding_response(&mut self, idx: usize, line: ResponseLine) {
        match line.id {
            'a' => {
                let serial = line.body.trim().to_string();
                match self.registry.identify(idx, serial.clone()) {
                    IdentifyOutcome::RehomedToRole(role) => {
                        self.log_line(&format!("controller {serial} identified as slot {role}"));
                    }
                    IdentifyOutcome::Foreign => {
                        self.pending_foreign_release.push(idx);
                        if let Some(slot) = self.registry.slot_mut(idx) {
                            let req = encode_request(&[('z', "wdt 0")]);
                            let _ = slot.transport.write(&req, usb_timeout());
                        }
                    }
                    IdentifyOutcome::Conflict(e) => {
                        warn!(error = %e, "identify conflict");
                    }
                }
            }
            'z' => {
                if let Some(pos) = self.pending_foreign_release.iter().position(|&i| i == idx) {
                    self.pending_foreign_release.remove(pos);
                    self.registry.release(idx);
                }
            }
            _ => {}
        }
    }

    fn send_motor_command(&mut self, cmd: MotorCommand) {
        let Some(slot) = self.registry.slot_mut(MOTOR_SLOT) else { return };
        let req = encode_command(cmd);
        if let Err(e) = slot.transport.write(&req, usb_timeout()) {
            warn!(error = %e, "failed to send motor command");
        }
    }

    // ── Observer connections ──

    pub fn observer_connect(&mut self, transport: O) {
        let id = transport.id();
        self.observers.connect(transport);
        self.observers.send_to(id, &OutboundMessage::Console("connected".to_string()));
        self.observers
            .send_to(id, &OutboundMessage::Active(self.activation != ActivationState::Off));
        self.observers.send_to(id, &OutboundMessage::Speeds(self.motors.speed));
        for (seq, values) in self.history.replay() {
            self.observers.send_to(id, &OutboundMessage::Historical { seq, values });
        }
    }

    pub fn observer_disconnect(&mut self, id: u64) {
        self.observers.disconnect(id);
    }

    /// Drain one pending command line per connected observer. Called once
    /// per tick rather than from a dedicated reader thread per connection,
    /// since every transport is already non-blocking.
    pub fn poll_observer_commands(&mut self) {
        for (id, authorized, line) in self.observers.poll_inbound(&self.config) {
            if !authorized {
                self.observers
                    .send_to(id, &OutboundMessage::Console("unauthorized".to_string()));
                continue;
            }
            let cmd = InboundCommand::parse(&line);
            self.dispatch_command(id, cmd);
        }
    }

    fn dispatch_command(&mut self, id: u64, cmd: InboundCommand) {
        match cmd {
            InboundCommand::Help => {
                self.observers.send_to(
                    id,
                    &OutboundMessage::Console(
                        "help active cal list log name verbose who avrN".to_string(),
                    ),
                );
            }
            InboundCommand::Active(None) => {
                let active = self.activation != ActivationState::Off;
                self.observers.send_to(id, &OutboundMessage::Active(active));
            }
            InboundCommand::Active(Some(ActiveArg::On)) => self.activate(ActivationState::On),
            InboundCommand::Active(Some(ActiveArg::Start)) => self.activate(ActivationState::Starting),
            InboundCommand::Active(Some(ActiveArg::Off)) => self.deactivate("operator command"),
            InboundCommand::Cal => {
                self.observers
                    .send_to(id, &OutboundMessage::Console("calibration tables loaded".to_string()));
            }
            InboundCommand::List => {
                let slots = self.registry.occupied_slots();
                self.observers
                    .send_to(id, &OutboundMessage::Console(format!("slots: {slots:?}")));
            }
            InboundCommand::Log(text) => self.log_line(&text),
            InboundCommand::Name(name) => self.observers.set_name(id, name),
            InboundCommand::Verbose(arg) => {
                let verbose = arg.unwrap_or(!self.observers.is_verbose(id));
                self.observers.set_verbose(id, verbose);
            }
            InboundCommand::Who => {
                let name = self.observers.name_of(id).unwrap_or("anonymous").to_string();
                self.observers.send_to(id, &OutboundMessage::Console(name));
            }
            InboundCommand::Avr { axis, raw } => {
                if let Some(slot) = self.registry.slot_mut(axis as usize) {
                    let req = encode_request(&[('e', raw.as_str())]);
                    let _ = slot.transport.write(&req, usb_timeout());
                }
            }
            InboundCommand::Unknown(text) => {
                self.observers
                    .send_to(id, &OutboundMessage::Console(format!("unknown command: {text}")));
            }
        }
    }

    // ── Activation ──

    fn activate(&mut self, state: ActivationState) {
        if self.registry.slot(MOTOR_SLOT).is_none() {
            self.log_line("cannot activate: slot 0 controller not present");
            return;
        }
        self.activation = state;
        for cmd in control::activation_commands(&self.physical.stage_position, MOTOR_STEPS_PER_MM) {
            self.send_motor_command(cmd);
        }
        self.log_line("activated");
        self.broadcast(&OutboundMessage::Active(true));
    }

    fn deactivate(&mut self, reason: &str) {
        self.activation = ActivationState::Off;
        self.send_motor_command(MotorCommand::HaltAll);
        self.log_line(&format!("deactivated: {reason}"));
        self.broadcast(&OutboundMessage::Active(false));
    }

    fn log_line(&mut self, text: &str) {
        match self.log.log(text) {
            Ok(stamped) => self.broadcast(&OutboundMessage::Console(stamped)),
            Err(e) => warn!(error = %e, "failed to write operator log"),
        }
    }

    /// Broadcast to every observer, dropping any connection that fails to
    /// accept the write.
    fn broadcast(&mut self, msg: &OutboundMessage) {
        for id in self.observers.broadcast(msg) {
            self.observers.disconnect(id);
        }
    }

    /// Broadcast only to observers with the verbose flag set (the `verbose`
    /// command), dropping any connection that fails to accept the write.
    fn broadcast_verbose(&mut self, msg: &OutboundMessage) {
        for id in self.observers.broadcast_verbose(msg) {
            self.observers.disconnect(id);
        }
    }

    // ── Scheduler tick (C6) ──

    pub fn tick(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
        self.full_poll = !self.full_poll;

        let adc_ok = self.adc.state() == AdcState::Ok;

        if !adc_ok && self.full_poll {
            self.history.add(now_ms, 0, None);
            self.broadcast_verbose(&OutboundMessage::Live { t: now_ms / 1000, sample: None });
            if self.adc.needs_reconnect() {
                debug!("adc socket absent, awaiting reconnect");
            }
        }

        let adc_bad = matches!(self.adc.state(), AdcState::Bad | AdcState::Missed);
        let controller_bad = self
            .registry
            .slot(MOTOR_SLOT)
            .map(|s| !s.alive_this_tick)
            .unwrap_or(true);

        let bad_kind = if adc_bad {
            Some(BadPollKind::Adc)
        } else if controller_bad {
            Some(BadPollKind::Controller)
        } else {
            None
        };
        let active = self.activation != ActivationState::Off;
        if self.bad_polls.record(bad_kind, active) {
            self.log_line("too many consecutive bad polls");
            self.deactivate("bad poll limit exceeded");
        }

        // Ok|Missed send the next request; Waiting demotes itself to Missed
        // without resending; Bad|NotConnected are no-ops inside `tick()`.
        // All four states must pass through here every engine tick, or a
        // connected-but-unresponsive link stays `Waiting` forever.
        if let Err(e) = self.adc.tick() {
            warn!(error = %e, "adc request send failed");
        }

        for idx in self.registry.occupied_slots() {
            if let Some(slot) = self.registry.slot_mut(idx) {
                slot.alive_this_tick = false;
            }
            let req = match idx {
                MOTOR_SLOT => encode_request(&[
                    ('f', "m0;m1;m2"),
                    ('g', &format!("pa0-{}", NUM_LIMIT_SWITCHES - 1)),
                ]),
                RESERVED_SLOT => encode_request(&[('c', "nop")]),
                _ => encode_request(&[('a', "ser"), ('b', "ver")]),
            };
            if let Some(slot) = self.registry.slot_mut(idx) {
                if let Err(e) = slot.transport.write(&req, usb_timeout()) {
                    warn!(slot = idx, error = %e, "scheduled command send failed");
                }
            }
        }

        self.poll_adc_sample();
        self.run_control_law();
        self.poll_observer_commands();
    }

    fn poll_adc_sample(&mut self) {
        match self.adc.poll_response(Duration::from_millis(1)) {
            Ok(Some(raw)) => {
                self.physical = physical::derive(&raw, &self.cal);
                self.history.add(self.now_ms, 0, Some(&self.physical.damper_position));
                if self.full_poll {
                    self.broadcast_verbose(&OutboundMessage::Live {
                        t: self.now_ms / 1000,
                        sample: Some(LiveSample {
                            damper_position: self.physical.damper_position,
                            stage_position: self.physical.stage_position,
                            air_pressure: self.physical.air_pressure,
                        }),
                    });
                    let sample_line = format!(
                        "sample damper={:?} stage={:?} air={:.2}",
                        self.physical.damper_position,
                        self.physical.stage_position,
                        self.physical.air_pressure
                    );
                    if let Err(e) = self.log.log_to_file(&sample_line) {
                        warn!(error = %e, "failed to write sampled values to log file");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "adc poll failed"),
        }
    }

    fn run_control_law(&mut self) {
        if self.activation == ActivationState::Off {
            return;
        }
        for axis in 0..NUM_AXES {
            let pos = self.physical.damper_position[axis];
            let load = self.physical.damper_load[axis];
            let spd = self.motors.speed[axis];
            let target = control::target_speed(pos, load, spd, self.activation);
            let (gated, blocked) = safety::limit_switch_gate(&self.limit_switches, axis, target);
            if blocked {
                self.send_motor_command(MotorCommand::Halt { axis });
                self.log_line(&format!("axis {axis} blocked by limit switch"));
                continue;
            }
            for cmd in motor::ramp_motor(&self.motors, axis, gated) {
                self.send_motor_command(cmd);
            }
        }
        self.activation = control::advance_activation(self.activation);
        self.broadcast(&OutboundMessage::Speeds(self.motors.speed));
    }
}

fn encode_command(cmd: MotorCommand) -> Vec<u8> {
    match cmd {
        MotorCommand::SetDirection { axis, forward } => {
            let body = format!("m{axis} dir {}", if forward { 1 } else { 0 });
            encode_request(&[('c', body.as_str())])
        }
        MotorCommand::Ramp { axis, speed } => {
            let body = format!("m{axis} ramp {speed}");
            encode_request(&[('c', body.as_str())])
        }
        MotorCommand::Halt { axis } => {
            let body = format!("m{axis} halt");
            encode_request(&[('c', body.as_str())])
        }
        MotorCommand::HaltAll => encode_request(&[('c', "halt")]),
        MotorCommand::SetPosition { axis, position } => {
            let body = format!("m{axis} pos {position}");
            encode_request(&[('c', body.as_str())])
        }
        MotorCommand::Energize { axis } => {
            let body = format!("m{axis} on 1");
            encode_request(&[('c', body.as_str())])
        }
    }
}
