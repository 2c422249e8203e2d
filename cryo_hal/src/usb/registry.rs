//! Device identity registry.
//!
//! Maps physical USB controllers (identified by serial number) to logical
//! slots. Slot 0 owns motors and limit switches; slot 1 is a reserved
//! role; slots beyond that are holding positions for devices that have
//! not yet reported their serial number, or that turned out not to
//! belong to this deployment at all.

use cryo_common::consts::{MAX_CONTROLLER_SLOTS, NUM_ROLE_SLOTS};
use thiserror::Error;

use super::transport::UsbTransport;

/// Error type for registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No holding slot was free for a newly attached device.
    #[error("no free slot for newly attached device")]
    SlotsFull,

    /// A device reported a serial matching a role already held by a
    /// different device.
    #[error("role slot {role} already held by a different device (existing serial {existing})")]
    RoleConflict { role: usize, existing: String },
}

/// Liveness of one occupied slot, for diagnostics and observer reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Attached but has not yet reported a serial number.
    Unidentified,
    /// Serial number matched an expected role.
    Known,
    /// Serial number did not match any expected role; watchdog is being
    /// disabled before the slot is released.
    Foreign,
}

/// One occupied slot in the registry.
pub struct Slot<T> {
    pub transport: T,
    pub serial: Option<String>,
    pub liveness: Liveness,
    /// Set by the scheduler each tick; cleared before the next poll and
    /// set again if a well-formed response arrived.
    pub alive_this_tick: bool,
}

/// Outcome of an `identify()` call, telling the caller what wire command
/// (if any) to send next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifyOutcome {
    /// Device was re-homed to the given role slot.
    RehomedToRole(usize),
    /// Device's serial matches nothing known; caller should disable its
    /// watchdog (`z.wdt 0`) before the slot is released on the ack.
    Foreign,
    /// The role slot this serial belongs to is already occupied by a
    /// different device; nothing changes.
    Conflict(RegistryError),
}

/// Maps attached USB controllers to logical slots by serial number.
pub struct DeviceRegistry<T> {
    expected: [String; NUM_ROLE_SLOTS],
    slots: Vec<Option<Slot<T>>>,
}

impl<T: UsbTransport> DeviceRegistry<T> {
    pub fn new(expected: [String; NUM_ROLE_SLOTS]) -> Self {
        let mut slots = Vec::with_capacity(MAX_CONTROLLER_SLOTS);
        slots.resize_with(MAX_CONTROLLER_SLOTS, || None);
        Self { expected, slots }
    }

    /// Register a newly attached device in the first free holding slot
    /// (index >= NUM_ROLE_SLOTS). Returns the allocated slot index.
    pub fn attach(&mut self, transport: T) -> Result<usize, RegistryError> {
        let idx = self
            .slots
            .iter()
            .enumerate()
            .skip(NUM_ROLE_SLOTS)
            .find(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .ok_or(RegistryError::SlotsFull)?;

        self.slots[idx] = Some(Slot {
            transport,
            serial: None,
            liveness: Liveness::Unidentified,
            alive_this_tick: false,
        });
        Ok(idx)
    }

    /// Process a reported serial number for the device currently at
    /// `holding_idx`. On a role match, moves the device's transport into
    /// that role slot and frees the holding slot; on conflict, the
    /// existing role-slot occupant is left untouched.
    pub fn identify(&mut self, holding_idx: usize, serial: String) -> IdentifyOutcome {
        let role = self.expected.iter().position(|e| e == &serial);

        match role {
            Some(role_idx) => {
                if let Some(existing) = &self.slots[role_idx] {
                    if existing.serial.as_deref() != Some(serial.as_str()) {
                        return IdentifyOutcome::Conflict(RegistryError::RoleConflict {
                            role: role_idx,
                            existing: existing.serial.clone().unwrap_or_default(),
                        });
                    }
                }
                let mut slot = self.slots[holding_idx].take().expect("slot occupied");
                slot.serial = Some(serial);
                slot.liveness = Liveness::Known;
                self.slots[role_idx] = Some(slot);
                IdentifyOutcome::RehomedToRole(role_idx)
            }
            None => {
                if let Some(slot) = self.slots[holding_idx].as_mut() {
                    slot.serial = Some(serial);
                    slot.liveness = Liveness::Foreign;
                }
                IdentifyOutcome::Foreign
            }
        }
    }

    /// Release the slot occupied by the device with the given opaque
    /// transport handle, if any. Returns the freed slot index.
    pub fn detach(&mut self, handle: u64) -> Option<usize> {
        let idx = self
            .slots
            .iter()
            .enumerate()
            .find(|(_, s)| s.as_ref().is_some_and(|s| s.transport.handle() == handle))
            .map(|(i, _)| i)?;
        self.slots[idx] = None;
        Some(idx)
    }

    /// Release the slot at `idx` unconditionally (used once a `z.OK` ack
    /// confirms a foreign device's watchdog has been disabled).
    pub fn release(&mut self, idx: usize) {
        self.slots[idx] = None;
    }

    pub fn slot(&self, idx: usize) -> Option<&Slot<T>> {
        self.slots[idx].as_ref()
    }

    pub fn slot_mut(&mut self, idx: usize) -> Option<&mut Slot<T>> {
        self.slots[idx].as_mut()
    }

    /// Number of role slots (0..NUM_ROLE_SLOTS) currently occupied by an
    /// identified device.
    pub fn found_count(&self) -> usize {
        self.slots[..NUM_ROLE_SLOTS].iter().filter(|s| s.is_some()).count()
    }

    /// Indices of all currently occupied slots (role and holding).
    pub fn occupied_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usb::transport::fake::FakeUsbTransport;

    fn registry() -> DeviceRegistry<FakeUsbTransport> {
        DeviceRegistry::new(["AVR0".to_string(), "AVR1".to_string()])
    }

    #[test]
    fn attach_allocates_holding_slot() {
        let mut reg = registry();
        let idx = reg.attach(FakeUsbTransport::new(1)).unwrap();
        assert!(idx >= NUM_ROLE_SLOTS);
        assert_eq!(reg.slot(idx).unwrap().liveness, Liveness::Unidentified);
    }

    #[test]
    fn identify_rehomes_to_matching_role() {
        let mut reg = registry();
        let idx = reg.attach(FakeUsbTransport::new(1)).unwrap();
        let outcome = reg.identify(idx, "AVR0".to_string());
        assert_eq!(outcome, IdentifyOutcome::RehomedToRole(0));
        assert!(reg.slot(idx).is_none());
        assert_eq!(reg.slot(0).unwrap().serial.as_deref(), Some("AVR0"));
        assert_eq!(reg.found_count(), 1);
    }

    #[test]
    fn identify_unknown_serial_marks_foreign() {
        let mut reg = registry();
        let idx = reg.attach(FakeUsbTransport::new(1)).unwrap();
        let outcome = reg.identify(idx, "XYZ".to_string());
        assert_eq!(outcome, IdentifyOutcome::Foreign);
        assert_eq!(reg.slot(idx).unwrap().liveness, Liveness::Foreign);
    }

    #[test]
    fn identify_role_conflict_leaves_existing_occupant() {
        let mut reg = registry();
        let first = reg.attach(FakeUsbTransport::new(1)).unwrap();
        reg.identify(first, "AVR0".to_string());

        let second = reg.attach(FakeUsbTransport::new(2)).unwrap();
        let outcome = reg.identify(second, "AVR0".to_string());
        assert!(matches!(outcome, IdentifyOutcome::Conflict(_)));
        assert_eq!(reg.slot(0).unwrap().transport.handle(), 1);
        assert_eq!(reg.slot(second).unwrap().transport.handle(), 2);
    }

    #[test]
    fn detach_frees_slot_by_handle() {
        let mut reg = registry();
        let idx = reg.attach(FakeUsbTransport::new(7)).unwrap();
        assert_eq!(reg.detach(7), Some(idx));
        assert!(reg.slot(idx).is_none());
    }

    #[test]
    fn detach_unknown_handle_is_ignored() {
        let mut reg = registry();
        assert_eq!(reg.detach(999), None);
    }

    #[test]
    fn slots_full_when_all_holding_slots_occupied() {
        let mut reg = registry();
        let capacity = MAX_CONTROLLER_SLOTS - NUM_ROLE_SLOTS;
        for i in 0..capacity {
            reg.attach(FakeUsbTransport::new(i as u64)).unwrap();
        }
        assert_eq!(
            reg.attach(FakeUsbTransport::new(999)),
            Err(RegistryError::SlotsFull)
        );
    }
}
