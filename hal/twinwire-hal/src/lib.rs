//! Twinwire Hardware Abstraction Layer
//!
//! This crate defines the register-level view of an I2C master controller
//! that the bus engine in `twinwire-core` drives. Chip-specific crates
//! implement the traits here; the engine and its simulator never touch
//! hardware directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application / panel drivers            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  twinwire-core (poll / read / write)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  twinwire-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ twinwire-hal- │       │ twinwire_core │
//! │     pic       │       │    ::sim      │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`controller::I2cController`] - Control/status bits, data registers and
//!   raw line access of one I2C master peripheral

#![no_std]
#![deny(unsafe_code)]

pub mod controller;
pub mod i2c;

// Re-export key types at crate root for convenience
pub use controller::{Control, I2cController, Line, Status};
pub use i2c::I2cConfig;
