//! Simulated controller and target
//!
//! [`SimController`] implements [`I2cController`] entirely in memory: one
//! optional target with a 256-byte register file behind an
//! auto-incrementing pointer, injectable faults, line-level modelling for
//! bus recovery and a trace of everything that happened on the bus.
//! Requests complete instantly unless a fault stalls them, so tests are
//! fully deterministic.

use core::cell::Cell;

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use twinwire_hal::{Control, I2cController, Line, Status};

use crate::address::AckPolicy;

/// Maximum number of events kept in the trace
pub const TRACE_CAPACITY: usize = 2048;

/// Size of the simulated target's register file
pub const REGISTER_COUNT: usize = 256;

/// Something observable that happened on the simulated bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    /// Controller generated a start condition
    Start,
    /// Controller generated a repeated start condition
    RepeatedStart,
    /// Controller generated a stop condition
    Stop,
    /// Byte shifted out by the controller
    Transmit(u8),
    /// Byte shifted in by the controller
    Receive(u8),
    /// Acknowledge sent by the controller after a received byte
    Acknowledge(AckPolicy),
    /// Controller switched off
    Disabled,
    /// Controller switched on
    Enabled,
    /// SCL driven low then high by software
    ClockPulse,
    /// SDA driven low while SCL high, by software
    LineStart,
    /// SDA released while SCL high, by software
    LineStop,
}

/// Injectable faults. All of them persist until cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// Something holds SCL low permanently
    pub scl_stuck_low: bool,
    /// Something holds SDA low permanently
    pub sda_stuck_low: bool,
    /// Start request immediately raises a bus collision
    pub start_collision: bool,
    /// Start completes, then a bus collision is flagged
    pub delayed_start_collision: bool,
    /// Start request raises a write collision
    pub start_write_collision: bool,
    /// Start never completes
    pub stall_start: bool,
    /// Repeated start raises a bus collision
    pub repeated_start_collision: bool,
    /// Repeated start never completes
    pub stall_repeated_start: bool,
    /// Stop request immediately raises a bus collision
    pub stop_collision: bool,
    /// Stop never completes
    pub stall_stop: bool,
    /// Byte transmit never completes
    pub stall_transmit: bool,
    /// Byte transmit raises a bus collision
    pub transmit_collision: bool,
    /// Byte receive never completes
    pub stall_receive: bool,
    /// Received bytes are flagged as overflowing
    pub receive_overflow: bool,
    /// Acknowledge sequence never completes
    pub stall_ack: bool,
    /// Target refuses its address
    pub nak_address: bool,
    /// Target refuses the data byte with this index (sub-address excluded)
    pub nak_data_at: Option<usize>,
}

/// Register-file target
#[derive(Debug, Clone)]
pub struct SimTarget {
    /// 7-bit address the target answers to
    pub address: u8,
    /// Register contents
    pub registers: [u8; REGISTER_COUNT],
    pointer: u8,
}

impl SimTarget {
    /// Create a target with all registers zeroed
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; REGISTER_COUNT],
            pointer: 0,
        }
    }

    fn write_next(&mut self, byte: u8) {
        self.registers[self.pointer as usize] = byte;
        self.pointer = self.pointer.wrapping_add(1);
    }

    fn read_next(&mut self) -> u8 {
        let value = self.registers[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        value
    }
}

/// Where the target is in the current transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No transaction
    Idle,
    /// Next byte is an address byte
    Address,
    /// Next byte is the register pointer
    Register,
    /// Writing data; `index` counts bytes after the pointer
    WriteData { index: usize },
    /// Target drives data
    ReadData,
    /// Target not addressed (or gave up); it ignores the bus
    Ignored,
}

/// In-memory I2C master controller with one attached target
pub struct SimController {
    /// Active fault injection
    pub faults: Faults,
    target: Option<SimTarget>,
    phase: Phase,
    enabled: bool,
    controls: u8,
    status: u8,
    receive: u8,
    frequency: Option<u32>,
    scl_latch: bool,
    sda_latch: bool,
    sda_hold: Option<u8>,
    interrupt: bool,
    transmit_polls: Cell<u32>,
    control_polls: Cell<u32>,
    trace: Vec<BusEvent, TRACE_CAPACITY>,
}

impl Default for SimController {
    fn default() -> Self {
        Self::new()
    }
}

impl SimController {
    /// Create a controller with nothing attached to the bus
    pub fn new() -> Self {
        Self {
            faults: Faults::default(),
            target: None,
            phase: Phase::Idle,
            enabled: false,
            controls: 0,
            status: 0,
            receive: 0,
            frequency: None,
            scl_latch: true,
            sda_latch: true,
            sda_hold: None,
            interrupt: false,
            transmit_polls: Cell::new(0),
            control_polls: Cell::new(0),
            trace: Vec::new(),
        }
    }

    /// Create a controller with a register-file target at `address`
    pub fn with_target(address: u8) -> Self {
        let mut sim = Self::new();
        sim.target = Some(SimTarget::new(address));
        sim
    }

    /// The attached target, if any
    pub fn target(&self) -> Option<&SimTarget> {
        self.target.as_ref()
    }

    /// Mutable access to the attached target
    pub fn target_mut(&mut self) -> Option<&mut SimTarget> {
        self.target.as_mut()
    }

    /// Make the target hold SDA low as if interrupted mid-read.
    ///
    /// SDA stays low through `pulses` full clock pulses and is released on
    /// the falling edge of the next one.
    pub fn hold_sda_low(&mut self, pulses: u8) {
        self.sda_hold = Some(pulses);
    }

    /// Force a status flag, as the hardware would
    pub fn raise(&mut self, bit: Status) {
        self.status |= status_mask(bit);
    }

    /// Latch the master interrupt flag, as a completed bus event would
    pub fn raise_interrupt(&mut self) {
        self.interrupt = true;
    }

    /// Check whether the master interrupt flag is latched
    pub fn interrupt_pending(&self) -> bool {
        self.interrupt
    }

    /// Frequency programmed by the last `set_bus_frequency`
    pub fn frequency(&self) -> Option<u32> {
        self.frequency
    }

    /// Number of times the transmit-in-progress flag has been read
    pub fn transmit_polls(&self) -> u32 {
        self.transmit_polls.get()
    }

    /// Number of reads of a control bit that was still pending
    pub fn control_polls(&self) -> u32 {
        self.control_polls.get()
    }

    /// Everything recorded since the last [`clear_trace`](Self::clear_trace)
    pub fn trace(&self) -> &[BusEvent] {
        &self.trace
    }

    /// Number of occurrences of `event` in the trace
    pub fn count(&self, event: BusEvent) -> usize {
        self.trace.iter().filter(|&&e| e == event).count()
    }

    /// Bytes transmitted by the controller, in order
    pub fn transmitted(&self) -> impl Iterator<Item = u8> + '_ {
        self.trace.iter().filter_map(|event| match event {
            BusEvent::Transmit(byte) => Some(*byte),
            _ => None,
        })
    }

    /// Forget recorded events and poll counters
    pub fn clear_trace(&mut self) {
        self.trace.clear();
        self.transmit_polls.set(0);
        self.control_polls.set(0);
    }

    fn record(&mut self, event: BusEvent) {
        // A full trace drops new events; tests never get near the capacity.
        let _ = self.trace.push(event);
    }

    fn hold(&mut self, bit: Control) {
        self.controls |= control_mask(bit);
    }

    fn sda_level(&self) -> bool {
        self.sda_latch && self.sda_hold.is_none() && !self.faults.sda_stuck_low
    }

    fn scl_level(&self) -> bool {
        self.scl_latch && !self.faults.scl_stuck_low
    }

    /// Feed a transmitted byte to the target; returns whether it ACKs
    fn target_accepts(&mut self, byte: u8) -> bool {
        match self.phase {
            Phase::Address => {
                let addressed = !self.faults.nak_address
                    && self
                        .target
                        .as_ref()
                        .is_some_and(|target| target.address == byte >> 1);
                self.phase = match (addressed, byte & 1 == 1) {
                    (false, _) => Phase::Ignored,
                    (true, true) => Phase::ReadData,
                    (true, false) => Phase::Register,
                };
                addressed
            }
            Phase::Register => {
                if let Some(target) = self.target.as_mut() {
                    target.pointer = byte;
                }
                self.phase = Phase::WriteData { index: 0 };
                true
            }
            Phase::WriteData { index } => {
                if self.faults.nak_data_at == Some(index) {
                    self.phase = Phase::Ignored;
                    return false;
                }
                if let Some(target) = self.target.as_mut() {
                    target.write_next(byte);
                }
                self.phase = Phase::WriteData { index: index + 1 };
                true
            }
            Phase::Idle | Phase::ReadData | Phase::Ignored => false,
        }
    }

    fn request(&mut self, bit: Control) {
        if !self.enabled {
            // Nothing drives the bus; the request never completes.
            self.hold(bit);
            return;
        }

        match bit {
            Control::Start => {
                self.record(BusEvent::Start);
                if self.faults.start_write_collision {
                    self.raise(Status::WriteCollision);
                    self.hold(bit);
                } else if self.faults.start_collision {
                    self.raise(Status::BusCollision);
                    self.hold(bit);
                } else if self.faults.stall_start {
                    self.hold(bit);
                } else {
                    self.phase = Phase::Address;
                    if self.faults.delayed_start_collision {
                        self.raise(Status::BusCollision);
                    }
                }
            }
            Control::RepeatedStart => {
                self.record(BusEvent::RepeatedStart);
                if self.faults.stall_repeated_start {
                    self.hold(bit);
                } else {
                    self.phase = Phase::Address;
                    if self.faults.repeated_start_collision {
                        self.raise(Status::BusCollision);
                    }
                }
            }
            Control::Stop => {
                self.record(BusEvent::Stop);
                if self.faults.stop_collision {
                    self.raise(Status::BusCollision);
                    self.hold(bit);
                } else if self.faults.stall_stop {
                    self.hold(bit);
                } else {
                    self.phase = Phase::Idle;
                }
            }
            Control::ReceiveEnable => {
                if self.faults.stall_receive {
                    self.hold(bit);
                    return;
                }
                let value = match (self.phase, self.target.as_mut()) {
                    (Phase::ReadData, Some(target)) => target.read_next(),
                    // Released bus reads as all ones
                    _ => 0xFF,
                };
                if self.faults.receive_overflow || self.status & status_mask(Status::ReceiveFull) != 0
                {
                    self.raise(Status::ReceiveOverflow);
                }
                self.receive = value;
                self.raise(Status::ReceiveFull);
                self.record(BusEvent::Receive(value));
            }
            Control::AckEnable => {
                let policy = if self.controls & control_mask(Control::AckData) != 0 {
                    AckPolicy::Nack
                } else {
                    AckPolicy::Ack
                };
                self.record(BusEvent::Acknowledge(policy));
                if self.faults.stall_ack {
                    self.hold(bit);
                } else if policy == AckPolicy::Nack && self.phase == Phase::ReadData {
                    self.phase = Phase::Ignored;
                }
            }
            Control::AckData | Control::SlewRate => self.hold(bit),
        }
    }
}

impl I2cController for SimController {
    fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            self.record(BusEvent::Enabled);
        } else {
            // Switching the module off abandons every pending request
            for bit in Control::SEQUENCING {
                self.controls &= !control_mask(bit);
            }
            self.status &= !status_mask(Status::TransmitInProgress);
            self.phase = Phase::Idle;
            self.record(BusEvent::Disabled);
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_control(&mut self, bit: Control, value: bool) {
        if value {
            self.request(bit);
        } else {
            self.controls &= !control_mask(bit);
        }
    }

    fn control(&self, bit: Control) -> bool {
        let set = self.controls & control_mask(bit) != 0;
        if set {
            self.control_polls.set(self.control_polls.get() + 1);
        }
        set
    }

    fn status(&self, bit: Status) -> bool {
        if bit == Status::TransmitInProgress {
            self.transmit_polls.set(self.transmit_polls.get() + 1);
        }
        self.status & status_mask(bit) != 0
    }

    fn clear_status(&mut self, bit: Status) {
        self.status &= !status_mask(bit);
    }

    fn clear_interrupt(&mut self) {
        self.interrupt = false;
    }

    fn write_transmit(&mut self, byte: u8) {
        self.record(BusEvent::Transmit(byte));

        if !self.enabled || self.faults.stall_transmit {
            self.raise(Status::TransmitInProgress);
            return;
        }
        if self.faults.transmit_collision {
            self.raise(Status::BusCollision);
            return;
        }

        if self.target_accepts(byte) {
            self.clear_status(Status::AckStatus);
        } else {
            self.raise(Status::AckStatus);
        }
    }

    fn read_receive(&mut self) -> u8 {
        self.clear_status(Status::ReceiveFull);
        self.receive
    }

    fn set_bus_frequency(&mut self, frequency_hz: u32) {
        self.frequency = Some(frequency_hz);
    }

    fn configure_lines(&mut self) {
        self.scl_latch = true;
        self.sda_latch = true;
    }

    fn set_line(&mut self, line: Line, high: bool) {
        match line {
            Line::Scl => {
                let falling = self.scl_latch && !high;
                self.scl_latch = high;
                if falling && !self.enabled {
                    self.record(BusEvent::ClockPulse);
                    self.sda_hold = match self.sda_hold {
                        Some(0) | None => None,
                        Some(remaining) => Some(remaining - 1),
                    };
                }
            }
            Line::Sda => {
                let before = self.sda_level();
                self.sda_latch = high;
                let after = self.sda_level();
                if !self.enabled && self.scl_level() && before != after {
                    self.record(if after {
                        BusEvent::LineStop
                    } else {
                        BusEvent::LineStart
                    });
                }
            }
        }
    }

    fn line_is_high(&self, line: Line) -> bool {
        match line {
            Line::Scl => self.scl_level(),
            Line::Sda => self.sda_level(),
        }
    }
}

fn control_mask(bit: Control) -> u8 {
    1 << (bit as u8)
}

fn status_mask(bit: Status) -> u8 {
    1 << (bit as u8)
}

/// Delay source that only counts
#[derive(Debug, Default, Clone, Copy)]
pub struct SimDelay {
    elapsed_ns: u64,
}

impl SimDelay {
    /// Total time requested so far, in microseconds
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ns / 1_000
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_pointer_auto_increments() {
        let mut sim = SimController::with_target(0x20);
        sim.set_enabled(true);

        sim.set_control(Control::Start, true);
        sim.write_transmit(0x40);
        sim.write_transmit(0x10);
        sim.write_transmit(0xAA);
        sim.write_transmit(0xBB);
        assert!(!sim.status(Status::AckStatus));
        sim.set_control(Control::Stop, true);

        let target = sim.target().unwrap();
        assert_eq!(target.registers[0x10], 0xAA);
        assert_eq!(target.registers[0x11], 0xBB);
    }

    #[test]
    fn test_unknown_address_is_nacked() {
        let mut sim = SimController::with_target(0x20);
        sim.set_enabled(true);

        sim.set_control(Control::Start, true);
        sim.write_transmit(0x42);
        assert!(sim.status(Status::AckStatus));
    }

    #[test]
    fn test_sda_hold_released_after_pulses() {
        let mut sim = SimController::new();
        sim.hold_sda_low(1);
        assert!(!sim.line_is_high(Line::Sda));

        sim.set_line(Line::Scl, false);
        sim.set_line(Line::Scl, true);
        assert!(!sim.line_is_high(Line::Sda));

        sim.set_line(Line::Scl, false);
        sim.set_line(Line::Scl, true);
        assert!(sim.line_is_high(Line::Sda));
        assert_eq!(sim.count(BusEvent::ClockPulse), 2);
    }

    #[test]
    fn test_delay_accumulates() {
        let mut delay = SimDelay::default();
        delay.delay_us(10);
        delay.delay_ms(1);
        assert_eq!(delay.elapsed_us(), 1_010);
    }
}
