//! Poll ceilings
//!
//! Completion of every bus phase is detected by busy-polling a controller
//! bit. The ceilings here bound those loops; they stand in for elapsed time
//! and therefore depend on both the bus clock and how fast the CPU polls.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use twinwire_hal::I2cConfig;

/// Control ceiling used when nothing better is known
pub const DEFAULT_CONTROL_POLLS: u32 = 50;

/// Transfer ceiling used when nothing better is known
pub const DEFAULT_TRANSFER_POLLS: u32 = 500;

/// Bus clocks spent by a start, repeated start, stop or acknowledge
const CONTROL_CLOCKS: u32 = 1;

/// Bus clocks spent by one byte (8 data bits + acknowledge)
const BYTE_CLOCKS: u32 = 9;

/// Iteration ceilings for completion polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PollLimits {
    /// Polls allowed for start / repeated start / stop / acknowledge
    pub control: u32,
    /// Polls allowed for a byte transmit or receive
    pub transfer: u32,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROL_POLLS, DEFAULT_TRANSFER_POLLS)
    }
}

impl PollLimits {
    /// Create limits from explicit ceilings
    pub const fn new(control: u32, transfer: u32) -> Self {
        Self { control, transfer }
    }

    /// Derive limits from the bus clock.
    ///
    /// # Arguments
    /// - `bus`: Target bus configuration
    /// - `polls_per_second`: How many poll iterations the CPU executes per
    ///   second (roughly the instruction clock for a tight loop)
    ///
    /// The control ceiling covers one bus clock with 25% margin, the
    /// transfer ceiling nine bus clocks with 40% margin. At 400 kHz and
    /// 16 M polls/s this gives 50 and 504.
    pub fn for_bus(bus: &I2cConfig, polls_per_second: u32) -> Self {
        let per_clock = polls_per_second.div_ceil(bus.frequency.max(1)).max(1);

        Self {
            control: with_margin(per_clock.saturating_mul(CONTROL_CLOCKS), 5, 4),
            transfer: with_margin(per_clock.saturating_mul(BYTE_CLOCKS), 7, 5),
        }
    }
}

fn with_margin(polls: u32, num: u32, den: u32) -> u32 {
    polls.saturating_mul(num).div_ceil(den)
}
