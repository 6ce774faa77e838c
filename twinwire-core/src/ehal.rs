//! embedded-hal 1.0 adapter
//!
//! Lets generic device drivers run on top of the engine. Transactions obey
//! the same dirty-bus rule as [`I2cMaster::read`] and
//! [`I2cMaster::write`]: poll first.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation};
use twinwire_hal::I2cController;

use crate::address::{AckPolicy, Address, Direction};
use crate::error::Error;
use crate::master::I2cMaster;

impl i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::BadAddr => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Error::Nak => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Error::BusCollision => ErrorKind::ArbitrationLoss,
            Error::ReceiveOverflow => ErrorKind::Overrun,
            Error::Hardware
            | Error::SclLow
            | Error::SdaLow
            | Error::ClockStuck
            | Error::ReceiveTimeout => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

impl<C, D> i2c::ErrorType for I2cMaster<C, D> {
    type Error = Error;
}

impl<C, D> I2c for I2cMaster<C, D>
where
    C: I2cController,
    D: DelayNs,
{
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let address = Address::try_from(address)?;
        if operations.is_empty() {
            return Ok(());
        }
        if self.state.is_dirty() {
            warn!("I2C transaction requested on a dirty bus");
            return Err(Error::BusDirty);
        }

        let framed = self.framed(|bus| bus.run_operations(address, operations));
        self.finish(framed)
    }
}

impl<C, D> I2cMaster<C, D>
where
    C: I2cController,
    D: DelayNs,
{
    /// Adjacent operations of the same kind share one address frame; a
    /// change of direction goes through a repeated start.
    fn run_operations(
        &mut self,
        address: Address,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        let mut current: Option<Direction> = None;

        for i in 0..operations.len() {
            let direction = match operations[i] {
                Operation::Read(_) => Direction::Read,
                Operation::Write(_) => Direction::Write,
            };
            // The last byte of a run of reads is NACKed, even when the
            // run spans several operations.
            let more_reads = operations[i + 1..]
                .iter()
                .take_while(|op| matches!(op, Operation::Read(_)))
                .any(|op| matches!(op, Operation::Read(buffer) if !buffer.is_empty()));

            if current != Some(direction) {
                if current.is_some() {
                    self.repeated_start().map_err(|_e| {
                        error!("Failed to send repeated start in transaction: {}", _e);
                        Error::CommFail
                    })?;
                }
                self.address_target(address, direction)?;
                current = Some(direction);
            }

            match &mut operations[i] {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        self.write_byte(byte).map_err(|e| match e {
                            Error::Nak => Error::Nak,
                            _ => Error::CommFail,
                        })?;
                    }
                }
                Operation::Read(buffer) => {
                    let len = buffer.len();
                    for (index, slot) in buffer.iter_mut().enumerate() {
                        let policy = match AckPolicy::for_position(index, len) {
                            AckPolicy::Nack if more_reads => AckPolicy::Ack,
                            policy => policy,
                        };
                        *slot = self.read_byte(policy).map_err(|_e| {
                            error!("Failed to read byte in transaction: {}", _e);
                            Error::CommFail
                        })?;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{BusEvent, SimController, SimDelay};
    use embedded_hal::i2c::Error as _;
    use twinwire_hal::I2cConfig;

    const SENSOR: u8 = 0x48;

    fn ready_bus(sim: SimController) -> I2cMaster<SimController, SimDelay> {
        let mut bus = I2cMaster::new(sim, SimDelay::default());
        bus.initialize();
        bus.start_module(&I2cConfig::STANDARD);
        bus.poll(Address::new(SENSOR).unwrap()).unwrap();
        bus.controller_mut().clear_trace();
        bus
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::BadAddr.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        );
        assert_eq!(
            Error::Nak.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
        );
        assert_eq!(Error::BusCollision.kind(), ErrorKind::ArbitrationLoss);
        assert_eq!(Error::ReceiveOverflow.kind(), ErrorKind::Overrun);
        assert_eq!(Error::SdaLow.kind(), ErrorKind::Bus);
        assert_eq!(Error::CommFail.kind(), ErrorKind::Other);
        assert_eq!(Error::BusDirty.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_write_read_uses_repeated_start() {
        let mut sim = SimController::with_target(SENSOR);
        sim.target_mut().unwrap().registers[0x05] = 0xC1;
        sim.target_mut().unwrap().registers[0x06] = 0x90;
        let mut bus = ready_bus(sim);

        let mut out = [0u8; 2];
        assert_eq!(I2c::write_read(&mut bus, SENSOR, &[0x05], &mut out), Ok(()));
        assert_eq!(out, [0xC1, 0x90]);
        assert_eq!(
            bus.controller().trace(),
            &[
                BusEvent::Start,
                BusEvent::Transmit(0x90),
                BusEvent::Transmit(0x05),
                BusEvent::RepeatedStart,
                BusEvent::Transmit(0x91),
                BusEvent::Receive(0xC1),
                BusEvent::Acknowledge(AckPolicy::Ack),
                BusEvent::Receive(0x90),
                BusEvent::Acknowledge(AckPolicy::Nack),
                BusEvent::Stop,
            ]
        );
        assert!(!bus.is_dirty());
    }

    #[test]
    fn test_adjacent_writes_share_address_frame() {
        let mut bus = ready_bus(SimController::with_target(SENSOR));

        let mut ops = [Operation::Write(&[0x10]), Operation::Write(&[1, 2])];
        assert_eq!(bus.transaction(SENSOR, &mut ops), Ok(()));
        assert_eq!(bus.controller().count(BusEvent::Transmit(0x90)), 1);
        assert_eq!(bus.controller().count(BusEvent::Start), 1);

        let target = bus.controller().target().unwrap();
        assert_eq!(target.registers[0x10], 1);
        assert_eq!(target.registers[0x11], 2);
    }

    #[test]
    fn test_split_read_acks_across_operations() {
        let mut bus = ready_bus(SimController::with_target(SENSOR));

        let mut first = [0u8; 1];
        let mut second = [0u8; 1];
        let mut ops = [Operation::Read(&mut first), Operation::Read(&mut second)];
        assert_eq!(bus.transaction(SENSOR, &mut ops), Ok(()));
        assert_eq!(bus.controller().count(BusEvent::Acknowledge(AckPolicy::Ack)), 1);
        assert_eq!(bus.controller().count(BusEvent::Acknowledge(AckPolicy::Nack)), 1);
        assert_eq!(bus.controller().count(BusEvent::Transmit(0x91)), 1);
    }

    #[test]
    fn test_missing_target_reports_address_nak() {
        let mut bus = ready_bus(SimController::with_target(SENSOR));

        let err = I2c::write(&mut bus, 0x49, &[0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        assert!(bus.is_dirty());
        assert_eq!(bus.controller().count(BusEvent::Stop), 1);
    }

    #[test]
    fn test_data_nak_reported() {
        let mut bus = ready_bus(SimController::with_target(SENSOR));
        bus.controller_mut().faults.nak_data_at = Some(0);

        assert_eq!(I2c::write(&mut bus, SENSOR, &[0x01, 0xFF]), Err(Error::Nak));
    }

    #[test]
    fn test_invalid_address_touches_nothing() {
        let mut bus = ready_bus(SimController::with_target(SENSOR));

        assert_eq!(I2c::write(&mut bus, 0x80, &[0x00]), Err(Error::BadAddr));
        assert!(bus.controller().trace().is_empty());
        assert!(!bus.is_dirty());
    }

    #[test]
    fn test_dirty_bus_refused() {
        let mut bus = I2cMaster::new(SimController::with_target(SENSOR), SimDelay::default());
        bus.initialize();
        bus.start_module(&I2cConfig::STANDARD);
        bus.controller_mut().clear_trace();

        assert_eq!(I2c::write(&mut bus, SENSOR, &[0x00]), Err(Error::BusDirty));
        assert!(bus.controller().trace().is_empty());
    }

    #[test]
    fn test_empty_transaction_is_noop() {
        let mut bus = ready_bus(SimController::with_target(SENSOR));

        assert_eq!(bus.transaction(SENSOR, &mut []), Ok(()));
        assert!(bus.controller().trace().is_empty());
    }
}
