//! PIC24-specific HAL for the twinwire I2C engine
//!
//! This crate implements [`twinwire_hal::I2cController`] on top of the
//! memory-mapped I2C master module found on Microchip PIC24 parts:
//!
//! - PIC24FJ256GB110 (I2C1 on RA14/RA15)
//!
//! # Features
//!
//! - `defmt` - Enable debug formatting of the shared register types
//!
//! # Usage
//!
//! ```ignore
//! let i2c = unsafe { PicI2c::i2c1(16_000_000) };
//! let mut bus = twinwire_core::I2cMaster::new(i2c, delay);
//! bus.initialize();
//! bus.start_module(&I2cConfig::FAST);
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod i2c;
pub mod regs;

pub use i2c::{baud_divisor, InterruptFlag, PicI2c};
