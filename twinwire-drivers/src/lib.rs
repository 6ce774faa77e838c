//! Device drivers
//!
//! This crate provides drivers for I2C peripherals that talk through the
//! register-oriented transfers of `twinwire-core`:
//!
//! - SH1106 132x64 OLED controller (1-bit framebuffer)

#![no_std]
#![deny(unsafe_code)]

pub mod sh1106;
