//! I2C bus configuration

/// I2C configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::FAST
    }
}

impl I2cConfig {
    /// Standard mode (100 kHz)
    pub const STANDARD: Self = Self { frequency: 100_000 };

    /// Fast mode (400 kHz)
    pub const FAST: Self = Self { frequency: 400_000 };

    /// Fast mode plus (1 MHz)
    pub const FAST_PLUS: Self = Self {
        frequency: 1_000_000,
    };

    /// Create a configuration for an arbitrary SCL frequency
    pub const fn with_frequency(frequency: u32) -> Self {
        Self { frequency }
    }

    /// Whether output slew-rate control should be enabled.
    ///
    /// Slew limiting suppresses ringing in fast mode; standard mode does not
    /// need it and fast mode plus edges are too fast for it.
    pub const fn slew_rate_control(&self) -> bool {
        self.frequency > Self::STANDARD.frequency && self.frequency < Self::FAST_PLUS.frequency
    }
}
