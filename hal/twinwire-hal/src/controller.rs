//! I2C master controller register interface
//!
//! Models the control register, status register and the two data
//! registers of a polled I2C master peripheral, plus direct access to the
//! SCL/SDA pins for the periods when the peripheral is switched off.

/// Control bits that software sets to request bus activity.
///
/// The sequencing bits (`Start`, `RepeatedStart`, `Stop`, `ReceiveEnable`,
/// `AckEnable`) are cleared by the hardware when the requested condition
/// has been generated on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Control {
    /// Generate a start condition
    Start,
    /// Generate a repeated start condition
    RepeatedStart,
    /// Generate a stop condition
    Stop,
    /// Clock in one byte from the target
    ReceiveEnable,
    /// Send the acknowledge value held in `AckData`
    AckEnable,
    /// Acknowledge value sent after a received byte (set = NACK)
    AckData,
    /// Slew-rate control on the output drivers
    SlewRate,
}

impl Control {
    /// Sequencing bits that must all be clear for the controller to be idle
    pub const SEQUENCING: [Control; 5] = [
        Control::Start,
        Control::RepeatedStart,
        Control::Stop,
        Control::ReceiveEnable,
        Control::AckEnable,
    ];
}

/// Status flags reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// Master bus collision detected
    BusCollision,
    /// Write attempted while the controller was busy
    WriteCollision,
    /// Receive register holds an unread byte
    ReceiveFull,
    /// Transmit register holds a byte not yet shifted out
    TransmitFull,
    /// A byte (including its acknowledge bit) is being transmitted
    TransmitInProgress,
    /// The target did not acknowledge the last byte (set = NACK)
    AckStatus,
    /// A byte was received while the previous one was still unread
    ReceiveOverflow,
}

/// The two bus lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    /// Clock line
    Scl,
    /// Data line
    Sda,
}

/// Register-level interface of one I2C master peripheral.
///
/// One instance owns one peripheral for its whole lifetime. All methods are
/// infallible register accesses; bus-level failure detection is the job of
/// the engine that drives this trait.
pub trait I2cController {
    /// Enable or disable the peripheral.
    ///
    /// While disabled the pins behave as plain open-drain GPIO and can be
    /// driven with [`set_line`](Self::set_line).
    fn set_enabled(&mut self, enabled: bool);

    /// Check whether the peripheral is enabled
    fn is_enabled(&self) -> bool;

    /// Set or clear a control bit
    fn set_control(&mut self, bit: Control, value: bool);

    /// Read back a control bit
    fn control(&self, bit: Control) -> bool;

    /// Read a status flag
    fn status(&self, bit: Status) -> bool;

    /// Clear a status flag
    fn clear_status(&mut self, bit: Status);

    /// Lower the peripheral's master interrupt flag.
    ///
    /// The engine polls and never enables the interrupt, but the flag still
    /// latches on every completed event. Peripherals without a separate
    /// flag keep the default no-op.
    fn clear_interrupt(&mut self) {}

    /// Load the transmit register, starting a byte transfer
    fn write_transmit(&mut self, byte: u8);

    /// Read the receive register.
    ///
    /// Reading clears [`Status::ReceiveFull`].
    fn read_receive(&mut self) -> u8;

    /// Program the clock divisor for the requested SCL frequency
    fn set_bus_frequency(&mut self, frequency_hz: u32);

    /// Configure both pins as open-drain outputs latched high.
    ///
    /// The peripheral takes over the pins while enabled; this only matters
    /// once it is disabled again for bus recovery.
    fn configure_lines(&mut self);

    /// Drive a line while the peripheral is disabled (high = released)
    fn set_line(&mut self, line: Line, high: bool);

    /// Sense the actual level of a line
    fn line_is_high(&self, line: Line) -> bool;

    /// Check that no sequencing request is pending
    fn is_idle(&self) -> bool {
        Control::SEQUENCING.iter().all(|&bit| !self.control(bit))
    }
}
