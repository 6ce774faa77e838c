//! Port pins used as open-drain bus lines
//!
//! Each PIC24 I/O port is four consecutive registers: TRIS (1 = input),
//! PORT (pin level), LAT (output latch) and ODC (1 = open drain).

#![allow(unsafe_code)]

use tock_registers::fields::Field;
use tock_registers::interfaces::{ReadWriteable, Readable};
use tock_registers::register_structs;
use tock_registers::registers::ReadWrite;

use crate::regs::StaticRef;

/// Data-space address of the PORTA register block (TRISA)
pub const PORTA_BASE: usize = 0x02C0;

register_structs! {
    /// One I/O port
    pub PortRegisters {
        (0x00 => tris: ReadWrite<u16>),
        (0x02 => port: ReadWrite<u16>),
        (0x04 => lat: ReadWrite<u16>),
        (0x06 => odc: ReadWrite<u16>),
        (0x08 => @END),
    }
}

/// Register block of one I/O port
#[derive(Clone, Copy)]
pub struct Port {
    registers: StaticRef<PortRegisters>,
}

impl Port {
    /// Port whose TRIS register sits at `base`
    ///
    /// # Safety
    ///
    /// `base` MUST be the TRIS register of a port block (or memory laid out
    /// the same way) and the pins used through it must not be driven from
    /// anywhere else.
    pub const unsafe fn new(base: *const PortRegisters) -> Self {
        Self {
            registers: StaticRef::new(base),
        }
    }

    /// Port A of the PIC24FJ256GB110
    ///
    /// # Safety
    ///
    /// See [`Port::new`].
    pub const unsafe fn porta() -> Self {
        Self::new(PORTA_BASE as *const PortRegisters)
    }

    /// Pin `bit` of this port
    pub const fn pin(self, bit: usize) -> OpenDrainPin {
        OpenDrainPin {
            port: self,
            field: Field::new(1, bit),
        }
    }
}

/// One port pin used as an open-drain output with readback
#[derive(Clone, Copy)]
pub struct OpenDrainPin {
    port: Port,
    field: Field<u16, ()>,
}

impl OpenDrainPin {
    /// Switch the pin to an open-drain output with the latch released
    pub fn configure(self) {
        let regs = self.port.registers;
        regs.lat.modify(self.field.val(1));
        regs.odc.modify(self.field.val(1));
        regs.tris.modify(self.field.val(0));
    }

    /// Drive the latch (high = released)
    pub fn set_high(self, high: bool) {
        self.port.registers.lat.modify(self.field.val(u16::from(high)));
    }

    /// Sense the actual pin level
    pub fn is_high(self) -> bool {
        self.port.registers.port.is_set(self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tock_registers::interfaces::Writeable;

    fn port(mem: &mut [u16; 4]) -> Port {
        unsafe { Port::new(mem.as_mut_ptr() as *const PortRegisters) }
    }

    #[test]
    fn test_configure_open_drain_output() {
        let mut mem = [0xFFFF, 0, 0, 0];
        let port = port(&mut mem);
        let regs = port.registers;

        port.pin(14).configure();
        assert_eq!(regs.tris.get(), 0xBFFF);
        assert_eq!(regs.lat.get(), 0x4000);
        assert_eq!(regs.odc.get(), 0x4000);
    }

    #[test]
    fn test_level_comes_from_port_not_latch() {
        let mut mem = [0u16; 4];
        let port = port(&mut mem);
        let pin = port.pin(15);

        pin.set_high(true);
        assert!(!pin.is_high());

        port.registers.port.set(1 << 15);
        assert!(pin.is_high());

        pin.set_high(false);
        assert_eq!(port.registers.lat.get(), 0);
    }
}
