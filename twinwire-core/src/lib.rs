//! Board-agnostic I2C master engine
//!
//! This crate drives one polled I2C master peripheral through the
//! [`twinwire_hal::I2cController`] register interface and survives a bus
//! left in an unknown state by an earlier fault:
//!
//! - Bus state tracking (dirty / clean)
//! - Physical bus recovery (clocking a stuck target free, manual STOP)
//! - Transaction primitives (start, repeated start, stop, byte transfer)
//! - Addressed transfers (poll, register read, register write)
//! - A deterministic simulated controller for host tests
//!
//! All operations are blocking and bounded by iteration ceilings
//! ([`PollLimits`]) rather than wall-clock time.

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod address;
pub mod config;
mod ehal;
pub mod error;
pub mod master;
mod primitives;
mod recovery;
pub mod sim;
pub mod state;
mod transfer;

pub use address::{AckPolicy, Address, Direction};
pub use config::PollLimits;
pub use error::Error;
pub use master::I2cMaster;
pub use state::BusState;
pub use twinwire_hal::{I2cConfig, I2cController};
