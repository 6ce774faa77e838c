//! Transaction primitives
//!
//! Each primitive asserts one controller request and busy-polls for the
//! hardware to complete it, bounded by the configured ceiling. None of them
//! retries; the addressed transfers decide how to unwind.

use embedded_hal::delay::DelayNs;
use twinwire_hal::{Control, I2cController, Status};

use crate::address::AckPolicy;
use crate::error::Error;
use crate::master::I2cMaster;

impl<C, D> I2cMaster<C, D>
where
    C: I2cController,
    D: DelayNs,
{
    /// Generate a start condition
    pub(crate) fn start(&mut self) -> Result<(), Error> {
        self.warn_if_busy("start");

        self.controller.set_control(Control::Start, true);

        if self.controller.status(Status::BusCollision) {
            error!("Bus collision when sending start");
            self.controller.set_control(Control::Start, false);
            self.reset_collision();
            return Err(Error::BusCollision);
        }

        if self.controller.status(Status::WriteCollision) {
            error!("Controller busy (write collision) when sending start");
            self.controller.set_control(Control::Start, false);
            self.controller.clear_status(Status::WriteCollision);
            return Err(Error::WriteCollision);
        }

        if !self.wait_control_clear(Control::Start, self.limits.control) {
            warn!("Timed out waiting for start to finish");
            return Err(Error::ClockStuck);
        }

        // A second start issued on top of the first turns into a stop
        // followed by a collision, visible only after completion.
        if self.controller.status(Status::BusCollision) {
            error!("Bus collision after sending start");
            self.reset_collision();
            return Err(Error::BusCollision);
        }

        Ok(())
    }

    /// Generate a repeated start condition (direction change without
    /// releasing the bus)
    pub(crate) fn repeated_start(&mut self) -> Result<(), Error> {
        self.warn_if_busy("repeated start");

        self.controller.set_control(Control::RepeatedStart, true);

        if !self.wait_control_clear(Control::RepeatedStart, self.limits.control) {
            warn!("Timed out waiting for repeated start to finish");
            return Err(Error::ClockStuck);
        }

        if self.controller.status(Status::BusCollision) {
            warn!("Bus collision on repeated start");
            self.reset_collision();
            return Err(Error::BusCollision);
        }

        Ok(())
    }

    /// Generate a stop condition
    pub(crate) fn stop(&mut self) -> Result<(), Error> {
        self.warn_if_busy("stop");

        self.controller.set_control(Control::Stop, true);

        if self.controller.status(Status::BusCollision) {
            error!("Bus collision when sending stop");
            self.reset_collision();
            return Err(Error::BusCollision);
        }

        if !self.wait_control_clear(Control::Stop, self.limits.control) {
            warn!("Timed out waiting for stop to finish");
            return Err(Error::ClockStuck);
        }

        Ok(())
    }

    /// Send one byte to an already addressed target (or the address byte
    /// itself).
    ///
    /// Returns `Ok(())` when the target acknowledged and [`Error::Nak`] when
    /// it did not. [`Error::TransmitBufferFull`] means a byte was still
    /// queued and nothing was sent.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.warn_if_busy("write byte");

        if self.controller.status(Status::TransmitFull) {
            warn!("Transmit buffer full on write byte");
            return Err(Error::TransmitBufferFull);
        }

        self.controller.write_transmit(byte);

        if !self.wait_status(Status::TransmitInProgress, false, self.limits.transfer) {
            warn!("Timed out waiting for transmit of 0x{=u8:02x}", byte);
            return Err(Error::ClockStuck);
        }

        if self.controller.status(Status::BusCollision) {
            error!("Bus collision when writing byte");
            self.reset_collision();
            return Err(Error::BusCollision);
        }

        if self.controller.status(Status::AckStatus) {
            debug!("Target NAKed 0x{=u8:02x}", byte);
            return Err(Error::Nak);
        }

        trace!("Target ACKed 0x{=u8:02x}", byte);
        Ok(())
    }

    /// Receive one byte from a target addressed for reading, then send
    /// `policy` (ACK for more, NACK on the last byte).
    ///
    /// A target stretching the clock for too long shows up as
    /// [`Error::ReceiveTimeout`].
    pub fn read_byte(&mut self, policy: AckPolicy) -> Result<u8, Error> {
        self.warn_if_busy("read byte");

        self.controller
            .set_control(Control::AckData, policy == AckPolicy::Nack);
        self.controller.set_control(Control::ReceiveEnable, true);

        if !self.wait_status(Status::ReceiveFull, true, self.limits.transfer) {
            warn!("Timed out waiting for byte on read");
            return Err(Error::ReceiveTimeout);
        }

        if self.controller.control(Control::ReceiveEnable) {
            warn!("Receive enable still set after read byte");
        }

        self.controller.set_control(Control::AckEnable, true);

        if !self.wait_control_clear(Control::AckEnable, self.limits.control) {
            warn!("Timed out waiting for acknowledge sequence on read");
            return Err(Error::ClockStuck);
        }

        if self.controller.status(Status::ReceiveOverflow) {
            warn!("Receive overflow on read byte");
            self.controller.clear_status(Status::ReceiveOverflow);
            return Err(Error::ReceiveOverflow);
        }

        Ok(self.controller.read_receive())
    }
}
