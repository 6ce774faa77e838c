//! Physical bus recovery
//!
//! With the controller disabled the pins are plain open-drain I/O. A target
//! that was interrupted mid-read keeps SDA low waiting for more clocks;
//! clocking SCL lets it finish its byte and release the line. A manual
//! START/STOP pair then puts every target back into its idle state.

use embedded_hal::delay::DelayNs;
use twinwire_hal::{Control, I2cController, Line, Status};

use crate::error::Error;
use crate::master::I2cMaster;

/// Settling time after each line change
const SETTLE_US: u32 = 10;

/// Clock pulses issued at most while SDA is held low
pub const MAX_RECOVERY_PULSES: u8 = 10;

impl<C, D> I2cMaster<C, D>
where
    C: I2cController,
    D: DelayNs,
{
    /// Reset the bus by driving the lines directly.
    ///
    /// Returns [`Error::SclLow`] if SCL cannot be released and
    /// [`Error::SdaLow`] if SDA is still held after
    /// [`MAX_RECOVERY_PULSES`] clock pulses. The controller is re-enabled
    /// only on success.
    pub fn recover_bus(&mut self) -> Result<(), Error> {
        self.controller.set_enabled(false);
        self.reset_lines()?;
        self.controller.set_enabled(true);
        Ok(())
    }

    /// Drop pending requests and error flags left by a failed transfer
    pub(crate) fn clear_errors(&mut self) {
        self.controller.set_control(Control::ReceiveEnable, false);
        self.controller.clear_status(Status::WriteCollision);
        self.reset_collision();
    }

    fn reset_lines(&mut self) -> Result<(), Error> {
        self.controller.set_line(Line::Scl, true);
        self.controller.set_line(Line::Sda, true);
        self.settle();

        if !self.controller.line_is_high(Line::Scl) {
            error!("SCL stuck low - is the pull-up fitted?");
            return Err(Error::SclLow);
        }

        let mut pulses = 0;
        while pulses < MAX_RECOVERY_PULSES && !self.controller.line_is_high(Line::Sda) {
            self.controller.set_line(Line::Scl, false);
            self.settle();
            self.controller.set_line(Line::Scl, true);
            self.settle();
            pulses += 1;
        }
        if pulses > 0 {
            debug!("Clocked {=u8} pulses to release SDA", pulses);
        }

        if !self.lines_released() {
            error!("SDA still low after {=u8} clock pulses", pulses);
            return Err(Error::SdaLow);
        }

        // START: SDA falls while SCL is high
        self.controller.set_line(Line::Sda, false);
        self.settle();

        // STOP: SDA rises while SCL is high
        self.controller.set_line(Line::Sda, true);
        self.settle();

        if !self.lines_released() {
            error!("Bus lines not idle after manual STOP");
            return Err(Error::SdaLow);
        }

        Ok(())
    }

    fn lines_released(&self) -> bool {
        self.controller.line_is_high(Line::Scl) && self.controller.line_is_high(Line::Sda)
    }

    fn settle(&mut self) {
        self.delay.delay_us(SETTLE_US);
    }
}
