//! I2C master module driver
//!
//! Maps the [`I2cController`] register interface onto the I2CxRCV,
//! I2CxTRN, I2CxBRG, I2CxCON and I2CxSTAT block, plus the module's master
//! interrupt flag.

#![allow(unsafe_code)]

use tock_registers::fields::Field;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};
use twinwire_hal::{Control, I2cController, Line, Status};

use crate::gpio::{OpenDrainPin, Port};
use crate::regs::StaticRef;

/// Data-space address of the I2C1 register block (I2C1RCV)
pub const I2C1_BASE: usize = 0x0200;

/// Data-space address of IFS1, which holds MI2C1IF
pub const IFS1_ADDR: usize = 0x0086;

/// MI2C1IF position in IFS1
pub const MI2C1IF_BIT: usize = 1;

/// RA14 carries SCL1
pub const I2C1_SCL_BIT: usize = 14;

/// RA15 carries SDA1
pub const I2C1_SDA_BIT: usize = 15;

register_structs! {
    /// One I2C module
    pub I2cRegisters {
        (0x00 => rcv: ReadOnly<u16, RCV::Register>),
        (0x02 => trn: ReadWrite<u16, TRN::Register>),
        (0x04 => brg: ReadWrite<u16, BRG::Register>),
        (0x06 => con: ReadWrite<u16, CON::Register>),
        (0x08 => stat: ReadWrite<u16, STAT::Register>),
        (0x0A => @END),
    }
}

register_bitfields! [u16,
    /// Receive buffer
    RCV [
        DATA OFFSET(0) NUMBITS(8) [],
    ],
    /// Transmit register
    TRN [
        DATA OFFSET(0) NUMBITS(8) [],
    ],
    /// Baud rate generator reload value
    BRG [
        I2CBRG OFFSET(0) NUMBITS(9) [],
    ],
    /// Control register
    CON [
        SEN OFFSET(0) NUMBITS(1) [],
        RSEN OFFSET(1) NUMBITS(1) [],
        PEN OFFSET(2) NUMBITS(1) [],
        RCEN OFFSET(3) NUMBITS(1) [],
        ACKEN OFFSET(4) NUMBITS(1) [],
        ACKDT OFFSET(5) NUMBITS(1) [],
        DISSLW OFFSET(9) NUMBITS(1) [],
        I2CEN OFFSET(15) NUMBITS(1) [],
    ],
    /// Status register
    STAT [
        TBF OFFSET(0) NUMBITS(1) [],
        RBF OFFSET(1) NUMBITS(1) [],
        I2COV OFFSET(6) NUMBITS(1) [],
        IWCOL OFFSET(7) NUMBITS(1) [],
        BCL OFFSET(10) NUMBITS(1) [],
        TRSTAT OFFSET(14) NUMBITS(1) [],
        ACKSTAT OFFSET(15) NUMBITS(1) [],
    ],
];

/// Largest value I2CxBRG holds
const BRG_MAX: u16 = 0x1FF;

/// I2CxBRG values 0 and 1 are not supported by the module
const BRG_MIN: u16 = 2;

/// Compute I2CxBRG for instruction clock `fcy_hz` and bus clock
/// `scl_hz`: `fcy / scl - fcy / 10 MHz - 1`, rounded down.
///
/// Worked in tenths so the pulse-gobbler term (`fcy / 10 MHz`, 1.6 at
/// 16 MHz) keeps its fraction. The result is clamped to what the register
/// accepts.
pub fn baud_divisor(fcy_hz: u32, scl_hz: u32) -> u16 {
    if scl_hz == 0 {
        return BRG_MAX;
    }
    let fcy = u64::from(fcy_hz);
    let tenths = (fcy * 10 / u64::from(scl_hz))
        .saturating_sub(fcy / 1_000_000)
        .saturating_sub(10);
    (tenths / 10).clamp(u64::from(BRG_MIN), u64::from(BRG_MAX)) as u16
}

/// Master interrupt flag of one module, living in a shared IFSx register
#[derive(Clone, Copy)]
pub struct InterruptFlag {
    register: StaticRef<ReadWrite<u16>>,
    field: Field<u16, ()>,
}

impl InterruptFlag {
    /// Flag `bit` of the IFSx register at `addr`
    ///
    /// # Safety
    ///
    /// `addr` MUST be an interrupt flag register (or plain memory).
    pub const unsafe fn new(addr: *const ReadWrite<u16>, bit: usize) -> Self {
        Self {
            register: StaticRef::new(addr),
            field: Field::new(1, bit),
        }
    }

    /// MI2C1IF of the PIC24FJ256GB110
    ///
    /// # Safety
    ///
    /// See [`InterruptFlag::new`].
    pub const unsafe fn mi2c1() -> Self {
        Self::new(IFS1_ADDR as *const ReadWrite<u16>, MI2C1IF_BIT)
    }

    /// Check whether the flag is raised
    pub fn is_set(self) -> bool {
        self.register.is_set(self.field)
    }

    /// Lower the flag, leaving its neighbours alone
    pub fn clear(self) {
        self.register.modify(self.field.val(0));
    }
}

/// One I2C master module with its two pins
pub struct PicI2c {
    registers: StaticRef<I2cRegisters>,
    interrupt: InterruptFlag,
    scl: OpenDrainPin,
    sda: OpenDrainPin,
    fcy_hz: u32,
}

impl PicI2c {
    /// Module whose I2CxRCV register sits at `base`, clocked from an
    /// instruction clock of `fcy_hz`.
    ///
    /// # Safety
    ///
    /// `base` MUST be the first register of an I2C module block (or memory
    /// laid out the same way), `interrupt`, `scl` and `sda` must belong to
    /// that module, and nothing else may touch any of them while this
    /// value exists.
    pub const unsafe fn new(
        base: *const I2cRegisters,
        interrupt: InterruptFlag,
        scl: OpenDrainPin,
        sda: OpenDrainPin,
        fcy_hz: u32,
    ) -> Self {
        Self {
            registers: StaticRef::new(base),
            interrupt,
            scl,
            sda,
            fcy_hz,
        }
    }

    /// I2C1 on RA14/RA15 of the PIC24FJ256GB110
    ///
    /// # Safety
    ///
    /// Only one instance may exist. See [`PicI2c::new`].
    pub const unsafe fn i2c1(fcy_hz: u32) -> Self {
        let port = Port::porta();
        Self::new(
            I2C1_BASE as *const I2cRegisters,
            InterruptFlag::mi2c1(),
            port.pin(I2C1_SCL_BIT),
            port.pin(I2C1_SDA_BIT),
            fcy_hz,
        )
    }

    /// Instruction clock the baud divisor is computed from
    pub fn fcy_hz(&self) -> u32 {
        self.fcy_hz
    }

    fn pin(&self, line: Line) -> OpenDrainPin {
        match line {
            Line::Scl => self.scl,
            Line::Sda => self.sda,
        }
    }
}

fn control_field(bit: Control) -> Field<u16, CON::Register> {
    match bit {
        Control::Start => CON::SEN,
        Control::RepeatedStart => CON::RSEN,
        Control::Stop => CON::PEN,
        Control::ReceiveEnable => CON::RCEN,
        Control::AckEnable => CON::ACKEN,
        Control::AckData => CON::ACKDT,
        Control::SlewRate => CON::DISSLW,
    }
}

fn status_field(bit: Status) -> Field<u16, STAT::Register> {
    match bit {
        Status::BusCollision => STAT::BCL,
        Status::WriteCollision => STAT::IWCOL,
        Status::ReceiveFull => STAT::RBF,
        Status::TransmitFull => STAT::TBF,
        Status::TransmitInProgress => STAT::TRSTAT,
        Status::AckStatus => STAT::ACKSTAT,
        Status::ReceiveOverflow => STAT::I2COV,
    }
}

impl I2cController for PicI2c {
    fn set_enabled(&mut self, enabled: bool) {
        self.registers.con.modify(CON::I2CEN.val(u16::from(enabled)));
    }

    fn is_enabled(&self) -> bool {
        self.registers.con.is_set(CON::I2CEN)
    }

    fn set_control(&mut self, bit: Control, value: bool) {
        // DISSLW is active low with respect to slew-rate control
        let value = if bit == Control::SlewRate { !value } else { value };
        self.registers
            .con
            .modify(control_field(bit).val(u16::from(value)));
    }

    fn control(&self, bit: Control) -> bool {
        let value = self.registers.con.is_set(control_field(bit));
        if bit == Control::SlewRate {
            !value
        } else {
            value
        }
    }

    fn status(&self, bit: Status) -> bool {
        self.registers.stat.is_set(status_field(bit))
    }

    fn clear_status(&mut self, bit: Status) {
        match bit {
            // RBF is read-only and clears when I2CxRCV is read
            Status::ReceiveFull => {
                let _ = self.registers.rcv.get();
            }
            _ => self.registers.stat.modify(status_field(bit).val(0)),
        }
    }

    fn clear_interrupt(&mut self) {
        self.interrupt.clear();
    }

    fn write_transmit(&mut self, byte: u8) {
        self.registers.trn.write(TRN::DATA.val(u16::from(byte)));
    }

    fn read_receive(&mut self) -> u8 {
        self.registers.rcv.read(RCV::DATA) as u8
    }

    fn set_bus_frequency(&mut self, frequency_hz: u32) {
        self.registers
            .brg
            .write(BRG::I2CBRG.val(baud_divisor(self.fcy_hz, frequency_hz)));
    }

    fn configure_lines(&mut self) {
        self.scl.configure();
        self.sda.configure();
    }

    fn set_line(&mut self, line: Line, high: bool) {
        self.pin(line).set_high(high);
    }

    fn line_is_high(&self, line: Line) -> bool {
        self.pin(line).is_high()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::PortRegisters;

    const RCV_WORD: usize = 0;
    const TRN_WORD: usize = 1;
    const BRG_WORD: usize = 2;
    const CON_WORD: usize = 3;
    const STAT_WORD: usize = 4;
    const TRIS_WORD: usize = 5;
    const PORT_WORD: usize = 6;
    const LAT_WORD: usize = 7;
    const ODC_WORD: usize = 8;
    const IFS_WORD: usize = 9;

    /// I2C block, port block and IFS register, all in plain memory
    struct Fixture {
        mem: [u16; 10],
    }

    impl Fixture {
        fn new() -> Self {
            Self { mem: [0; 10] }
        }

        fn controller(&mut self) -> (PicI2c, *mut u16) {
            let base = self.mem.as_mut_ptr();
            let i2c = unsafe {
                let port = Port::new(base.add(TRIS_WORD) as *const PortRegisters);
                PicI2c::new(
                    base as *const I2cRegisters,
                    InterruptFlag::new(
                        base.add(IFS_WORD) as *const ReadWrite<u16>,
                        MI2C1IF_BIT,
                    ),
                    port.pin(I2C1_SCL_BIT),
                    port.pin(I2C1_SDA_BIT),
                    16_000_000,
                )
            };
            (i2c, base)
        }
    }

    fn peek(base: *mut u16, index: usize) -> u16 {
        unsafe { base.add(index).read_volatile() }
    }

    fn poke(base: *mut u16, index: usize, value: u16) {
        unsafe { base.add(index).write_volatile(value) }
    }

    #[test]
    fn test_baud_divisor_matches_datasheet() {
        assert_eq!(baud_divisor(16_000_000, 400_000), 37);
        assert_eq!(baud_divisor(16_000_000, 100_000), 157);
        assert_eq!(baud_divisor(16_000_000, 1_000_000), 13);
    }

    #[test]
    fn test_baud_divisor_clamps() {
        assert_eq!(baud_divisor(16_000_000, 0), BRG_MAX);
        assert_eq!(baud_divisor(16_000_000, 10_000), BRG_MAX);
        assert_eq!(baud_divisor(1_000_000, 1_000_000), BRG_MIN);
    }

    #[test]
    fn test_enable_and_brg() {
        let mut fixture = Fixture::new();
        let (mut i2c, base) = fixture.controller();

        i2c.set_bus_frequency(400_000);
        i2c.set_enabled(true);
        assert!(i2c.is_enabled());
        assert_eq!(peek(base, BRG_WORD), 37);
        assert_eq!(peek(base, CON_WORD), 1 << 15);

        i2c.set_enabled(false);
        assert_eq!(peek(base, CON_WORD), 0);
    }

    #[test]
    fn test_slew_rate_is_inverted_disslw() {
        let mut fixture = Fixture::new();
        let (mut i2c, base) = fixture.controller();

        i2c.set_control(Control::SlewRate, true);
        assert_eq!(peek(base, CON_WORD) & (1 << 9), 0);
        assert!(i2c.control(Control::SlewRate));

        i2c.set_control(Control::SlewRate, false);
        assert_eq!(peek(base, CON_WORD), 1 << 9);
        assert!(!i2c.control(Control::SlewRate));
    }

    #[test]
    fn test_sequencing_bits() {
        let mut fixture = Fixture::new();
        let (mut i2c, base) = fixture.controller();

        i2c.set_control(Control::Start, true);
        i2c.set_control(Control::AckEnable, true);
        assert_eq!(peek(base, CON_WORD), 0b1_0001);
        assert!(!i2c.is_idle());

        i2c.set_control(Control::Start, false);
        i2c.set_control(Control::AckEnable, false);
        assert!(i2c.is_idle());
    }

    #[test]
    fn test_ack_data_bit() {
        let mut fixture = Fixture::new();
        let (mut i2c, base) = fixture.controller();

        i2c.set_control(Control::AckData, true);
        assert_eq!(peek(base, CON_WORD), 1 << 5);
        i2c.set_control(Control::AckData, false);
        assert_eq!(peek(base, CON_WORD), 0);
    }

    #[test]
    fn test_status_flags() {
        let mut fixture = Fixture::new();
        let (mut i2c, base) = fixture.controller();

        poke(base, STAT_WORD, (1 << 10) | (1 << 15) | (1 << 1));
        poke(base, RCV_WORD, 0x1A5);
        assert!(i2c.status(Status::BusCollision));
        assert!(i2c.status(Status::AckStatus));
        assert!(i2c.status(Status::ReceiveFull));
        assert!(!i2c.status(Status::TransmitInProgress));

        i2c.clear_status(Status::BusCollision);
        assert!(!i2c.status(Status::BusCollision));
        assert!(i2c.status(Status::AckStatus));
        assert_eq!(i2c.read_receive(), 0xA5);
    }

    #[test]
    fn test_transmit_register() {
        let mut fixture = Fixture::new();
        let (mut i2c, base) = fixture.controller();

        i2c.write_transmit(0x78);
        assert_eq!(peek(base, TRN_WORD), 0x78);
    }

    #[test]
    fn test_clear_interrupt_keeps_other_flags() {
        let mut fixture = Fixture::new();
        let (mut i2c, base) = fixture.controller();
        poke(base, IFS_WORD, 0b111);

        i2c.clear_interrupt();
        assert_eq!(peek(base, IFS_WORD), 0b101);
    }

    #[test]
    fn test_lines() {
        let mut fixture = Fixture::new();
        let (mut i2c, base) = fixture.controller();
        poke(base, TRIS_WORD, 0xFFFF);

        i2c.configure_lines();
        assert_eq!(peek(base, TRIS_WORD), 0x3FFF);
        assert_eq!(peek(base, LAT_WORD), 0xC000);
        assert_eq!(peek(base, ODC_WORD), 0xC000);

        i2c.set_line(Line::Scl, false);
        assert_eq!(peek(base, LAT_WORD), 0x8000);

        poke(base, PORT_WORD, 1 << 14);
        assert!(i2c.line_is_high(Line::Scl));
        assert!(!i2c.line_is_high(Line::Sda));
    }
}
