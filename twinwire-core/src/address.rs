//! Target addressing and acknowledge policy

use crate::error::Error;

/// Transfer direction, carried in bit 0 of the address byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Direction {
    /// Master writes to the target
    Write = 0,
    /// Master reads from the target
    Read = 1,
}

/// 7-bit target address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address(u8);

impl Address {
    /// Highest valid 7-bit address
    pub const MAX: u8 = 0x7F;

    /// Create an address, rejecting values that do not fit in 7 bits
    pub const fn new(raw: u8) -> Option<Self> {
        if raw <= Self::MAX {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// The raw 7-bit address
    pub const fn get(self) -> u8 {
        self.0
    }

    /// The address byte sent on the wire for `direction`
    pub const fn frame(self, direction: Direction) -> u8 {
        (self.0 << 1) | direction as u8
    }
}

impl TryFrom<u8> for Address {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(Error::BadAddr)
    }
}

/// What the master sends after receiving a byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckPolicy {
    /// Acknowledge: the target should send another byte
    Ack,
    /// Not-acknowledge: this was the last byte of the read
    Nack,
}

impl AckPolicy {
    /// Policy for byte `index` of a read of `len` bytes (NACK the last one)
    pub const fn for_position(index: usize, len: usize) -> Self {
        if index + 1 >= len {
            AckPolicy::Nack
        } else {
            AckPolicy::Ack
        }
    }
}
