//! Addressed transfers
//!
//! Poll, register read and register write built from the primitives. Once a
//! start condition has gone out, a stop is always attempted before
//! returning, and every path other than full success leaves the bus marked
//! dirty so the next poll recovers it.

use embedded_hal::delay::DelayNs;
use twinwire_hal::I2cController;

use crate::address::{AckPolicy, Address, Direction};
use crate::error::Error;
use crate::master::I2cMaster;

/// Outcome of a body run between start and stop
pub(crate) struct Framed<T> {
    /// Result of the body
    pub outcome: Result<T, Error>,
    /// Result of the closing stop
    pub stop: Result<(), Error>,
}

impl<C, D> I2cMaster<C, D>
where
    C: I2cController,
    D: DelayNs,
{
    /// Check that a target answers at `address`, recovering the bus first
    /// if it is dirty.
    ///
    /// Call this periodically and before data transfers; it is the only
    /// operation that clears a dirty bus.
    ///
    /// # Errors
    /// - [`Error::Hardware`]: the bus could not be recovered
    /// - [`Error::BadAddr`]: nothing acknowledged the address
    /// - [`Error::CommFail`]: any other failure
    pub fn poll(&mut self, address: Address) -> Result<(), Error> {
        if self.state.is_dirty() {
            info!("Initializing I2C bus to known state");
            self.clear_errors();
            if let Err(_e) = self.recover_bus() {
                error!("Failed to initialize I2C bus: {}", _e);
                return Err(Error::Hardware);
            }
            self.state.mark_clean();
        }

        let result = self.poll_target(address);
        self.settle_state(result)
    }

    /// Read `buffer.len()` bytes starting at register `register`.
    ///
    /// Refuses to touch the bus while it is dirty.
    ///
    /// # Errors
    /// - [`Error::BusDirty`]: poll the bus first
    /// - [`Error::BadAddr`]: nothing acknowledged the address
    /// - [`Error::CommFail`]: any other failure
    pub fn read(&mut self, address: Address, register: u8, buffer: &mut [u8]) -> Result<(), Error> {
        if self.state.is_dirty() {
            warn!("I2C read requested on a dirty bus");
            return Err(Error::BusDirty);
        }

        let framed = self.framed(|bus| bus.read_registers(address, register, buffer));
        self.finish(framed)
    }

    /// Write `data` starting at register `register`.
    ///
    /// Refuses to touch the bus while it is dirty. A data byte that is not
    /// acknowledged aborts the rest of the buffer.
    ///
    /// # Errors
    /// - [`Error::BusDirty`]: poll the bus first
    /// - [`Error::BadAddr`]: nothing acknowledged the address
    /// - [`Error::CommFail`]: any other failure
    pub fn write(&mut self, address: Address, register: u8, data: &[u8]) -> Result<(), Error> {
        if self.state.is_dirty() {
            warn!("I2C write requested on a dirty bus");
            return Err(Error::BusDirty);
        }

        let framed = self.framed(|bus| bus.write_registers(address, register, data));
        self.finish(framed)
    }

    /// Run `body` between a start and a stop condition.
    ///
    /// A failed start is reported as [`Error::CommFail`] and nothing else is
    /// sent. Otherwise the stop is issued whatever the body returned.
    pub(crate) fn framed<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<Framed<T>, Error> {
        if let Err(_e) = self.start() {
            error!("Failed to send I2C start: {}", _e);
            return Err(Error::CommFail);
        }

        let outcome = body(self);
        let stop = self.stop();
        Ok(Framed { outcome, stop })
    }

    /// Collapse a framed transfer into its result and update the bus state.
    /// Body errors win over a failed stop.
    pub(crate) fn finish(&mut self, framed: Result<Framed<()>, Error>) -> Result<(), Error> {
        let result = framed.and_then(|framed| match (framed.outcome, framed.stop) {
            (Err(e), _) => Err(e),
            (Ok(()), Err(_e)) => {
                error!("Failed to send I2C stop: {}", _e);
                Err(Error::CommFail)
            }
            (Ok(()), Ok(())) => Ok(()),
        });
        self.settle_state(result)
    }

    /// Address the target, telling an absent target apart from a bus fault
    pub(crate) fn address_target(
        &mut self,
        address: Address,
        direction: Direction,
    ) -> Result<(), Error> {
        match self.write_byte(address.frame(direction)) {
            Ok(()) => Ok(()),
            Err(Error::Nak) => {
                warn!("No ACK from I2C address 0x{=u8:02x}", address.get());
                Err(Error::BadAddr)
            }
            Err(_e) => {
                error!("Failed to address I2C target: {}", _e);
                Err(Error::CommFail)
            }
        }
    }

    fn settle_state(&mut self, result: Result<(), Error>) -> Result<(), Error> {
        match result {
            Ok(()) => self.state.mark_clean(),
            Err(_) => self.state.mark_dirty(),
        }
        result
    }

    fn poll_target(&mut self, address: Address) -> Result<(), Error> {
        let framed = self.framed(|bus| bus.write_byte(address.frame(Direction::Write)))?;

        if let Err(_e) = framed.stop {
            error!("Failed to send I2C stop on poll: {}", _e);
            return Err(Error::CommFail);
        }

        match framed.outcome {
            Ok(()) => Ok(()),
            Err(Error::Nak) => {
                warn!(
                    "No ACK polling 0x{=u8:02x}, check the address",
                    address.get()
                );
                Err(Error::BadAddr)
            }
            Err(_e) => {
                error!("Failed to poll I2C target: {}", _e);
                Err(Error::CommFail)
            }
        }
    }

    fn read_registers(
        &mut self,
        address: Address,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.address_target(address, Direction::Write)?;

        self.write_byte(register).map_err(|_e| {
            error!("Failed to select register 0x{=u8:02x} on read: {}", register, _e);
            Error::CommFail
        })?;

        self.repeated_start().map_err(|_e| {
            error!("Failed to send repeated start on read: {}", _e);
            Error::CommFail
        })?;

        self.write_byte(address.frame(Direction::Read))
            .map_err(|_e| {
                error!("Failed to address target for reading: {}", _e);
                Error::CommFail
            })?;

        let len = buffer.len();
        for (index, slot) in buffer.iter_mut().enumerate() {
            *slot = self
                .read_byte(AckPolicy::for_position(index, len))
                .map_err(|_e| {
                    error!("Failed to read byte {=usize} from I2C target: {}", index, _e);
                    Error::CommFail
                })?;
        }

        Ok(())
    }

    fn write_registers(&mut self, address: Address, register: u8, data: &[u8]) -> Result<(), Error> {
        self.address_target(address, Direction::Write)?;

        self.write_byte(register).map_err(|_e| {
            error!("Failed to select register 0x{=u8:02x} on write: {}", register, _e);
            Error::CommFail
        })?;

        for (_index, &byte) in data.iter().enumerate() {
            self.write_byte(byte).map_err(|_e| {
                error!("Failed to write byte {=usize} to I2C target: {}", _index, _e);
                Error::CommFail
            })?;
        }

        Ok(())
    }
}
