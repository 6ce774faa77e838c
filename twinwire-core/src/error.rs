//! Bus error taxonomy
//!
//! Every primitive and transfer returns exactly one of these on failure.
//! Primitives report the precise cause; addressed transfers collapse
//! anything past the addressing phase into [`Error::CommFail`].

use core::fmt;

/// I2C bus errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bus recovery failed: SCL cannot be released (missing pull-up or a
    /// permanently failed peripheral)
    Hardware,
    /// SCL reads low after being released during recovery
    SclLow,
    /// SDA still low after clocking the bus during recovery
    SdaLow,
    /// Another driver was detected on the bus
    BusCollision,
    /// A sequencing request was issued while the controller was busy
    WriteCollision,
    /// The target did not acknowledge a byte
    Nak,
    /// The target did not acknowledge its address
    BadAddr,
    /// A byte was offered while the previous one was still queued
    TransmitBufferFull,
    /// A byte arrived before the previous one was consumed
    ReceiveOverflow,
    /// A sequencing bit did not self-clear within its poll ceiling
    ClockStuck,
    /// No byte arrived within the receive poll ceiling
    ReceiveTimeout,
    /// The bus must be recovered (via poll) before transfers are accepted
    BusDirty,
    /// A transfer failed after addressing; the bus is marked dirty
    CommFail,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Hardware => "bus recovery failed",
            Error::SclLow => "SCL stuck low",
            Error::SdaLow => "SDA stuck low",
            Error::BusCollision => "bus collision",
            Error::WriteCollision => "controller busy (write collision)",
            Error::Nak => "byte not acknowledged",
            Error::BadAddr => "address not acknowledged",
            Error::TransmitBufferFull => "transmit buffer full",
            Error::ReceiveOverflow => "receive overflow",
            Error::ClockStuck => "clock stuck (sequencing timeout)",
            Error::ReceiveTimeout => "receive timeout",
            Error::BusDirty => "bus dirty, recovery required",
            Error::CommFail => "communication failure",
        };
        f.write_str(msg)
    }
}
