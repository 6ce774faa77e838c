//! Bus context
//!
//! [`I2cMaster`] owns the controller, the delay source used during
//! recovery, the dirty/clean tracker and the poll ceilings. Every
//! operation borrows it mutably, so two transfers can never overlap.

use embedded_hal::delay::DelayNs;
use twinwire_hal::{Control, I2cConfig, I2cController, Status};

use crate::config::PollLimits;
use crate::state::BusState;

/// Single-master I2C bus engine
pub struct I2cMaster<C, D> {
    pub(crate) controller: C,
    pub(crate) delay: D,
    pub(crate) state: BusState,
    pub(crate) limits: PollLimits,
}

impl<C, D> I2cMaster<C, D>
where
    C: I2cController,
    D: DelayNs,
{
    /// Create a bus engine with the default poll ceilings
    pub fn new(controller: C, delay: D) -> Self {
        Self::with_limits(controller, delay, PollLimits::default())
    }

    /// Create a bus engine with explicit poll ceilings
    pub fn with_limits(controller: C, delay: D, limits: PollLimits) -> Self {
        Self {
            controller,
            delay,
            state: BusState::new(),
            limits,
        }
    }

    /// Put the pins in their idle state and mark the bus dirty.
    ///
    /// The controller is left disabled; call
    /// [`start_module`](Self::start_module) to bring it up.
    pub fn initialize(&mut self) {
        self.controller.set_enabled(false);
        self.controller.configure_lines();
        self.state.mark_dirty();
        debug!("I2C lines idle, bus marked dirty");
    }

    /// Configure the clock divisor and slew rate, clear any latched
    /// interrupt flag, then enable the controller
    pub fn start_module(&mut self, config: &I2cConfig) {
        self.controller.set_enabled(false);
        for bit in Control::SEQUENCING {
            self.controller.set_control(bit, false);
        }
        self.controller.set_control(Control::AckData, false);
        self.controller.clear_interrupt();
        self.controller.set_bus_frequency(config.frequency);
        self.controller
            .set_control(Control::SlewRate, config.slew_rate_control());
        self.controller.set_enabled(true);
        info!("I2C controller enabled at {} Hz", config.frequency);
    }

    /// Check whether the bus must be recovered before reads and writes
    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    /// Current poll ceilings
    pub fn limits(&self) -> PollLimits {
        self.limits
    }

    /// Replace the poll ceilings (for example after changing bus speed)
    pub fn set_limits(&mut self, limits: PollLimits) {
        self.limits = limits;
    }

    /// Borrow the controller
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Mutably borrow the controller
    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    /// Give back the controller and delay source
    pub fn release(self) -> (C, D) {
        (self.controller, self.delay)
    }

    /// Poll until `bit` self-clears. Returns false if it is still set after
    /// `limit` reads.
    pub(crate) fn wait_control_clear(&self, bit: Control, limit: u32) -> bool {
        (0..limit).any(|_| !self.controller.control(bit))
    }

    /// Poll until `bit` reads `expected`. Returns false if it never does
    /// within `limit` reads.
    pub(crate) fn wait_status(&self, bit: Status, expected: bool, limit: u32) -> bool {
        (0..limit).any(|_| self.controller.status(bit) == expected)
    }

    /// Clear a bus collision. The flag only really clears across a
    /// disable/enable cycle of the controller.
    pub(crate) fn reset_collision(&mut self) {
        self.controller.clear_status(Status::BusCollision);
        if self.controller.is_enabled() {
            self.controller.set_enabled(false);
            self.controller.set_enabled(true);
        }
    }

    /// Diagnostic only: primitives are still attempted on a busy controller
    pub(crate) fn warn_if_busy(&self, _operation: &str) {
        if !self.controller.is_idle() {
            warn!("I2C controller not idle before {=str}", _operation);
        }
    }
}
