//! SH1106 OLED display driver
//!
//! Driver for 128x64 SH1106-based OLED displays. The controller has 132
//! columns of display RAM; the visible panel starts at column 2.
//!
//! The driver does not own the bus. Every call that talks to the panel
//! borrows the [`I2cMaster`], so other targets can share it between
//! frames. Commands go to control byte `0x00`, display RAM to `0x40`.
//!
//! The frame buffer is an embedded-graphics [`DrawTarget`], so shapes and
//! text are drawn with the usual `embedded_graphics` primitives.

use core::convert::Infallible;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_hal::delay::DelayNs;
use twinwire_core::{Address, Error, I2cController, I2cMaster};

/// Usual SH1106 I2C address (0x3D with SA0 high)
pub const DEFAULT_ADDRESS: u8 = 0x3C;

/// Visible columns
pub const WIDTH: usize = 128;

/// Visible rows
pub const HEIGHT: usize = 64;
const PAGES: usize = HEIGHT / 8;

/// First visible column in display RAM
const COLUMN_OFFSET: u8 = 2;

/// Control byte for a command
const CONTROL_COMMAND: u8 = 0x00;

/// Control byte for display RAM data
const CONTROL_DATA: u8 = 0x40;

/// SH1106 commands
mod cmd {
    pub const DISPLAY_OFF: u8 = 0xAE;
    pub const DISPLAY_ON: u8 = 0xAF;
    pub const SET_CONTRAST: u8 = 0x81;
    pub const SET_NORMAL: u8 = 0xA6;
    pub const SET_INVERSE: u8 = 0xA7;
    pub const DISPLAY_ALL_ON_RESUME: u8 = 0xA4;
    pub const SET_DISPLAY_OFFSET: u8 = 0xD3;
    pub const SET_COM_PINS: u8 = 0xDA;
    pub const SET_VCOM_DETECT: u8 = 0xDB;
    pub const SET_CLOCK_DIV: u8 = 0xD5;
    pub const SET_PRECHARGE: u8 = 0xD9;
    pub const SET_MUX_RATIO: u8 = 0xA8;
    pub const SET_LOW_COLUMN: u8 = 0x00;
    pub const SET_HIGH_COLUMN: u8 = 0x10;
    pub const SET_PAGE_ADDR: u8 = 0xB0;
    pub const SET_START_LINE: u8 = 0x40;
    pub const SET_SEG_REMAP: u8 = 0xA1;
    pub const SET_COM_SCAN_DEC: u8 = 0xC8;
    pub const SET_CHARGE_PUMP: u8 = 0x8D;
    pub const SET_MEMORY_MODE: u8 = 0x20;
}

/// Power-up sequence, sent one command per transfer
const INIT_SEQUENCE: &[u8] = &[
    cmd::DISPLAY_OFF,
    cmd::SET_CLOCK_DIV,
    0x80, // Suggested ratio
    cmd::SET_MUX_RATIO,
    0x3F, // 64 lines
    cmd::SET_DISPLAY_OFFSET,
    0x00,
    cmd::SET_START_LINE,
    cmd::SET_CHARGE_PUMP,
    0x10,
    cmd::SET_MEMORY_MODE,
    0x00, // Horizontal addressing
    cmd::SET_SEG_REMAP,    // Flip horizontally
    cmd::SET_COM_SCAN_DEC, // Flip vertically
    cmd::SET_COM_PINS,
    0x12, // Alternative COM config
    cmd::SET_CONTRAST,
    0x80,
    cmd::SET_PRECHARGE,
    0x22,
    cmd::SET_VCOM_DETECT,
    0x40,
    cmd::DISPLAY_ALL_ON_RESUME,
    cmd::SET_NORMAL,
    cmd::DISPLAY_ON,
];

/// Pixel operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Color {
    /// Pixel off
    Black,
    /// Pixel on
    White,
    /// Toggle the pixel
    Inverse,
}

impl From<BinaryColor> for Color {
    fn from(color: BinaryColor) -> Self {
        match color {
            BinaryColor::On => Color::White,
            BinaryColor::Off => Color::Black,
        }
    }
}

/// SH1106 OLED driver
pub struct Sh1106 {
    address: Address,
    /// Frame buffer (1 bit per pixel, organized as pages of 8 rows)
    buffer: [[u8; WIDTH]; PAGES],
}

impl Sh1106 {
    /// Create a driver for the panel at `address` with a blank frame buffer
    pub fn new(address: Address) -> Self {
        Self {
            address,
            buffer: [[0; WIDTH]; PAGES],
        }
    }

    /// Panel address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Initialize the display.
    ///
    /// The bus must be clean; poll the panel first.
    pub fn init<C, D>(&mut self, bus: &mut I2cMaster<C, D>) -> Result<(), Error>
    where
        C: I2cController,
        D: DelayNs,
    {
        for &c in INIT_SEQUENCE {
            self.command(bus, c)?;
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("SH1106 at 0x{=u8:02x} initialized", self.address.get());
        Ok(())
    }

    /// Send a command to the display
    fn command<C, D>(&self, bus: &mut I2cMaster<C, D>, c: u8) -> Result<(), Error>
    where
        C: I2cController,
        D: DelayNs,
    {
        bus.write(self.address, CONTROL_COMMAND, &[c])
    }

    /// Clear the frame buffer
    pub fn clear(&mut self) {
        for page in self.buffer.iter_mut() {
            page.fill(0);
        }
    }

    /// Change one pixel. Coordinates outside the panel are ignored.
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        if x >= WIDTH || y >= HEIGHT {
            return;
        }

        let byte = &mut self.buffer[y / 8][x];
        let mask = 1 << (y % 8);
        match color {
            Color::White => *byte |= mask,
            Color::Black => *byte &= !mask,
            Color::Inverse => *byte ^= mask,
        }
    }

    /// Read back one pixel from the frame buffer (off-panel reads as off)
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < WIDTH && y < HEIGHT && self.buffer[y / 8][x] & (1 << (y % 8)) != 0
    }

    /// Flush the frame buffer to the display, one page per transfer
    pub fn flush<C, D>(&self, bus: &mut I2cMaster<C, D>) -> Result<(), Error>
    where
        C: I2cController,
        D: DelayNs,
    {
        for (page, data) in self.buffer.iter().enumerate() {
            self.command(bus, cmd::SET_PAGE_ADDR | page as u8)?;
            self.command(bus, cmd::SET_LOW_COLUMN | (COLUMN_OFFSET & 0x0F))?;
            self.command(bus, cmd::SET_HIGH_COLUMN | (COLUMN_OFFSET >> 4))?;
            bus.write(self.address, CONTROL_DATA, data)?;
        }

        Ok(())
    }

    /// Set display contrast (0-255)
    pub fn set_contrast<C, D>(&self, bus: &mut I2cMaster<C, D>, contrast: u8) -> Result<(), Error>
    where
        C: I2cController,
        D: DelayNs,
    {
        self.command(bus, cmd::SET_CONTRAST)?;
        self.command(bus, contrast)
    }

    /// Turn display on/off
    pub fn set_display_on<C, D>(&self, bus: &mut I2cMaster<C, D>, on: bool) -> Result<(), Error>
    where
        C: I2cController,
        D: DelayNs,
    {
        if on {
            self.command(bus, cmd::DISPLAY_ON)
        } else {
            self.command(bus, cmd::DISPLAY_OFF)
        }
    }

    /// Invert display colors
    pub fn set_inverted<C, D>(&self, bus: &mut I2cMaster<C, D>, inverted: bool) -> Result<(), Error>
    where
        C: I2cController,
        D: DelayNs,
    {
        if inverted {
            self.command(bus, cmd::SET_INVERSE)
        } else {
            self.command(bus, cmd::SET_NORMAL)
        }
    }
}

impl OriginDimensions for Sh1106 {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

/// Drawing only touches the frame buffer; [`Sh1106::flush`] sends it.
impl DrawTarget for Sh1106 {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            // Negative coordinates are off-panel; set_pixel drops the rest
            if let (Ok(x), Ok(y)) = (usize::try_from(point.x), usize::try_from(point.y)) {
                self.set_pixel(x, y, color.into());
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let fill = if color.is_on() { 0xFF } else { 0x00 };
        for page in self.buffer.iter_mut() {
            page.fill(fill);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::mono_font::ascii::FONT_6X10;
    use embedded_graphics::mono_font::MonoTextStyle;
    use embedded_graphics::primitives::{Circle, Line, PrimitiveStyle, Rectangle};
    use embedded_graphics::text::{Baseline, Text};
    use twinwire_core::sim::{BusEvent, SimController, SimDelay};
    use twinwire_core::I2cConfig;

    fn panel() -> Sh1106 {
        Sh1106::new(Address::new(DEFAULT_ADDRESS).unwrap())
    }

    fn ready_bus() -> I2cMaster<SimController, SimDelay> {
        let mut bus = I2cMaster::new(
            SimController::with_target(DEFAULT_ADDRESS),
            SimDelay::default(),
        );
        bus.initialize();
        bus.start_module(&I2cConfig::FAST);
        bus.poll(Address::new(DEFAULT_ADDRESS).unwrap()).unwrap();
        bus.controller_mut().clear_trace();
        bus
    }

    #[test]
    fn test_set_and_clear_pixels() {
        let mut oled = panel();

        oled.set_pixel(3, 9, Color::White);
        assert!(oled.pixel(3, 9));
        assert_eq!(oled.buffer[1][3], 0x02);

        oled.set_pixel(3, 9, Color::Inverse);
        assert!(!oled.pixel(3, 9));
        oled.set_pixel(3, 9, Color::Inverse);
        assert!(oled.pixel(3, 9));

        oled.set_pixel(3, 9, Color::Black);
        assert!(!oled.pixel(3, 9));
    }

    #[test]
    fn test_out_of_range_pixels_ignored() {
        let mut oled = panel();

        oled.set_pixel(WIDTH, 0, Color::White);
        oled.set_pixel(0, HEIGHT, Color::White);
        assert!(!oled.pixel(WIDTH, 0));
        assert!(oled.buffer.iter().flatten().all(|&b| b == 0));
    }

    #[test]
    fn test_clear() {
        let mut oled = panel();
        oled.set_pixel(127, 63, Color::White);

        oled.clear();
        assert!(!oled.pixel(127, 63));
    }

    #[test]
    fn test_init_sends_one_command_per_transfer() {
        let mut bus = ready_bus();
        let mut oled = panel();

        assert_eq!(oled.init(&mut bus), Ok(()));
        let sim = bus.controller();
        assert_eq!(sim.count(BusEvent::Start), INIT_SEQUENCE.len());
        assert_eq!(sim.count(BusEvent::Stop), INIT_SEQUENCE.len());
        assert_eq!(sim.count(BusEvent::Transmit(0x78)), INIT_SEQUENCE.len());
        // Every command lands on control byte 0x00
        assert_eq!(sim.target().unwrap().registers[0], cmd::DISPLAY_ON);
    }

    #[test]
    fn test_commands_framing() {
        let mut bus = ready_bus();
        let oled = panel();

        oled.set_contrast(&mut bus, 0x3F).unwrap();
        oled.set_inverted(&mut bus, true).unwrap();
        oled.set_display_on(&mut bus, false).unwrap();

        let sent: heapless::Vec<u8, 16> = bus.controller().transmitted().collect();
        assert_eq!(
            sent.as_slice(),
            &[
                0x78, 0x00, 0x81, //
                0x78, 0x00, 0x3F, //
                0x78, 0x00, 0xA7, //
                0x78, 0x00, 0xAE,
            ]
        );
    }

    #[test]
    fn test_flush_writes_pages_at_column_offset() {
        let mut bus = ready_bus();
        let mut oled = panel();
        oled.set_pixel(5, 60, Color::White);

        assert_eq!(oled.flush(&mut bus), Ok(()));
        let sim = bus.controller();
        for page in 0..PAGES as u8 {
            assert_eq!(sim.count(BusEvent::Transmit(cmd::SET_PAGE_ADDR | page)), 1);
        }
        assert_eq!(sim.count(BusEvent::Transmit(CONTROL_DATA)), PAGES);
        assert_eq!(sim.count(BusEvent::Start), PAGES * 4);

        // The last page written sits at register 0x40 onwards
        let registers = &sim.target().unwrap().registers;
        assert_eq!(registers[0x40 + 5], 0x10);
        assert_eq!(registers[0x40 + 6], 0x00);
    }

    #[test]
    fn test_flush_refused_on_dirty_bus() {
        let mut bus = I2cMaster::new(
            SimController::with_target(DEFAULT_ADDRESS),
            SimDelay::default(),
        );
        bus.initialize();
        bus.start_module(&I2cConfig::FAST);

        assert_eq!(panel().flush(&mut bus), Err(Error::BusDirty));
    }

    #[test]
    fn test_missing_panel_stops_init() {
        let mut bus = ready_bus();
        let mut oled = Sh1106::new(Address::new(0x3D).unwrap());

        assert_eq!(oled.init(&mut bus), Err(Error::BadAddr));
        assert_eq!(bus.controller().count(BusEvent::Start), 1);
        assert!(bus.is_dirty());
    }

    #[test]
    fn test_draw_line() {
        let mut oled = panel();

        Line::new(Point::new(0, 0), Point::new(10, 0))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut oled)
            .unwrap();
        assert!((0..=10).all(|x| oled.pixel(x, 0)));
        assert!(!oled.pixel(11, 0));
        assert!(!oled.pixel(0, 1));
    }

    #[test]
    fn test_fill_rectangle_spanning_a_page() {
        let mut oled = panel();

        Rectangle::new(Point::new(4, 8), Size::new(3, 8))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut oled)
            .unwrap();
        assert_eq!(&oled.buffer[1][3..8], &[0x00, 0xFF, 0xFF, 0xFF, 0x00]);
        assert!(oled.buffer[0].iter().all(|&b| b == 0));
        assert!(oled.buffer[2].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fill_circle() {
        let mut oled = panel();

        Circle::new(Point::new(20, 20), 9)
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut oled)
            .unwrap();
        assert!(oled.pixel(24, 24));
        assert!(!oled.pixel(20, 20));
    }

    #[test]
    fn test_draw_text_stays_in_glyph_cells() {
        let mut oled = panel();

        Text::with_baseline(
            "Hi",
            Point::zero(),
            MonoTextStyle::new(&FONT_6X10, BinaryColor::On),
            Baseline::Top,
        )
        .draw(&mut oled)
        .unwrap();

        let lit = (0..WIDTH)
            .flat_map(|x| (0..HEIGHT).map(move |y| (x, y)))
            .filter(|&(x, y)| oled.pixel(x, y));
        let mut count = 0;
        for (x, y) in lit {
            assert!(x < 12 && y < 10, "pixel ({}, {}) outside the text", x, y);
            count += 1;
        }
        assert!(count > 0);
    }

    #[test]
    fn test_off_panel_drawing_is_clipped() {
        let mut oled = panel();

        Line::new(Point::new(-5, 2), Point::new(2, 2))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut oled)
            .unwrap();
        Line::new(Point::new(126, 63), Point::new(130, 63))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut oled)
            .unwrap();

        assert!((0..=2).all(|x| oled.pixel(x, 2)));
        assert!(oled.pixel(127, 63));
        let lit: usize = oled.buffer.iter().flatten().map(|b| b.count_ones() as usize).sum();
        assert_eq!(lit, 5);
    }

    #[test]
    fn test_draw_target_clear() {
        let mut oled = panel();

        DrawTarget::clear(&mut oled, BinaryColor::On).unwrap();
        assert!(oled.pixel(0, 0) && oled.pixel(127, 63));
        assert_eq!(oled.bounding_box().size, Size::new(128, 64));

        DrawTarget::clear(&mut oled, BinaryColor::Off).unwrap();
        assert!(oled.buffer.iter().flatten().all(|&b| b == 0));
    }

    #[test]
    fn test_init_selects_horizontal_addressing() {
        let mut bus = ready_bus();
        let mut oled = panel();

        oled.init(&mut bus).unwrap();
        let sent: heapless::Vec<u8, 128> = bus.controller().transmitted().collect();
        let commands: heapless::Vec<u8, 64> = sent.chunks(3).map(|frame| frame[2]).collect();
        let mode = commands
            .iter()
            .position(|&c| c == cmd::SET_MEMORY_MODE)
            .unwrap();
        assert_eq!(commands[mode + 1], 0x00);
        assert!(mode > commands.iter().position(|&c| c == cmd::SET_CHARGE_PUMP).unwrap());
    }
}
