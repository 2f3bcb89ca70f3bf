use embedded_graphics::{
    mono_font::{MonoTextStyle, ascii::FONT_9X18_BOLD},
    pixelcolor::{Rgb565, Rgb888},
    prelude::*,
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiDevice};

use crate::model::PmSize;
use crate::traits::{Frame, PanelDisplay, PanelError, RenderError, Renderer};

const LINE_HEIGHT: i32 = 20;
/// spidev's default transfer limit
const SPI_CHUNK: usize = 4096;

/// Static panel mounting. Rotation is applied in software when a frame is
/// pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// In-memory RGB565 image the panel renderer composites into.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgb565>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb565::BLACK; (width * height) as usize],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb565> {
        (x < self.width && y < self.height).then(|| self.pixels[(y * self.width + x) as usize])
    }

    /// Big-endian RGB565 bytes in panel scan order after applying `rotation`.
    pub fn to_native_bytes(&self, rotation: Rotation) -> Vec<u8> {
        let (w, h) = (self.width, self.height);
        let (native_w, native_h) = if rotation.swaps_axes() { (h, w) } else { (w, h) };

        let mut bytes = Vec::with_capacity(self.pixels.len() * 2);
        for ny in 0..native_h {
            for nx in 0..native_w {
                let (x, y) = match rotation {
                    Rotation::Deg0 => (nx, ny),
                    Rotation::Deg90 => (w - 1 - ny, nx),
                    Rotation::Deg180 => (w - 1 - nx, h - 1 - ny),
                    Rotation::Deg270 => (ny, h - 1 - nx),
                };
                let color = self.pixels[(y * w + x) as usize];
                bytes.extend(color.into_storage().to_be_bytes());
            }
        }
        bytes
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb565;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) {
                if x < self.width && y < self.height {
                    self.pixels[(y * self.width + x) as usize] = color;
                }
            }
        }
        Ok(())
    }
}

fn infallible(e: core::convert::Infallible) -> RenderError {
    match e {}
}

/// Draws the particulate lines and the runtime onto a panel.
///
/// Environmental values stay on the terminal; the panel only has room for
/// four lines.
pub struct PanelRenderer<D> {
    display: D,
    frame: FrameBuffer,
}

impl<D: PanelDisplay> PanelRenderer<D> {
    pub fn new(display: D) -> Self {
        let (width, height) = display.size();
        Self {
            display,
            frame: FrameBuffer::new(width, height),
        }
    }

    fn compose(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
        self.frame.clear(Rgb565::BLACK).map_err(infallible)?;

        for (i, (size, value)) in frame.reading.particulate().iter().enumerate() {
            let color = Rgb565::from(frame.colors[size.index()]);
            let line = format!("{}: {:.2}", size.label(), value);
            Text::with_baseline(
                &line,
                Point::new(0, i as i32 * LINE_HEIGHT),
                MonoTextStyle::new(&FONT_9X18_BOLD, color),
                Baseline::Top,
            )
            .draw(&mut self.frame)
            .map_err(infallible)?;
        }

        let right = self.frame.size().width as i32 - 1;
        Text::with_text_style(
            frame.runtime,
            Point::new(right, PmSize::ALL.len() as i32 * LINE_HEIGHT),
            MonoTextStyle::new(&FONT_9X18_BOLD, Rgb565::from(Rgb888::WHITE)),
            TextStyleBuilder::new()
                .alignment(Alignment::Right)
                .baseline(Baseline::Top)
                .build(),
        )
        .draw(&mut self.frame)
        .map_err(infallible)?;
        Ok(())
    }
}

impl<D: PanelDisplay> Renderer for PanelRenderer<D> {
    fn name(&self) -> &str {
        "panel"
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
        self.compose(frame)?;
        self.display
            .show(&self.frame)
            .map_err(|e| RenderError(e.to_string()))
    }
}

mod cmd {
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const NORON: u8 = 0x13;
    pub const INVOFF: u8 = 0x20;
    pub const INVON: u8 = 0x21;
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A;
    pub const RASET: u8 = 0x2B;
    pub const RAMWR: u8 = 0x2C;
    pub const MADCTL: u8 = 0x36;
    pub const COLMOD: u8 = 0x3A;
    pub const FRMCTR1: u8 = 0xB1;
    pub const FRMCTR2: u8 = 0xB2;
    pub const FRMCTR3: u8 = 0xB3;
    pub const INVCTR: u8 = 0xB4;
    pub const PWCTR1: u8 = 0xC0;
    pub const PWCTR2: u8 = 0xC1;
    pub const PWCTR3: u8 = 0xC2;
    pub const PWCTR4: u8 = 0xC3;
    pub const PWCTR5: u8 = 0xC4;
    pub const VMCTR1: u8 = 0xC5;
    pub const GMCTRP1: u8 = 0xE0;
    pub const GMCTRN1: u8 = 0xE1;
}

/// Physical layout of an ST7735 module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelGeometry {
    /// Native (unrotated) width in pixels
    pub width: u16,
    /// Native (unrotated) height in pixels
    pub height: u16,
    pub offset_left: u16,
    pub offset_top: u16,
    pub rotation: Rotation,
    pub invert: bool,
}

impl PanelGeometry {
    /// 0.96" 80x160 module, mounted landscape.
    pub const MINI_160X80: PanelGeometry = PanelGeometry {
        width: 80,
        height: 160,
        offset_left: 26,
        offset_top: 1,
        rotation: Rotation::Deg270,
        invert: true,
    };

    pub fn logical_size(&self) -> (u32, u32) {
        let (w, h) = (u32::from(self.width), u32::from(self.height));
        if self.rotation.swaps_axes() { (h, w) } else { (w, h) }
    }
}

/// ST7735 TFT over SPI with a data/command pin and a backlight pin.
pub struct St7735<SPI, DC, BL> {
    spi: SPI,
    dc: DC,
    backlight: BL,
    geometry: PanelGeometry,
}

impl<SPI, DC, BL> St7735<SPI, DC, BL>
where
    SPI: SpiDevice,
    DC: OutputPin,
    BL: OutputPin,
{
    pub fn new(spi: SPI, dc: DC, backlight: BL, geometry: PanelGeometry) -> Self {
        Self {
            spi,
            dc,
            backlight,
            geometry,
        }
    }

    /// Reset and configure the controller, then switch the backlight on.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), PanelError> {
        self.command(cmd::SWRESET, &[])?;
        delay.delay_ms(150);
        self.command(cmd::SLPOUT, &[])?;
        delay.delay_ms(500);

        self.command(cmd::FRMCTR1, &[0x01, 0x2C, 0x2D])?;
        self.command(cmd::FRMCTR2, &[0x01, 0x2C, 0x2D])?;
        self.command(cmd::FRMCTR3, &[0x01, 0x2C, 0x2D, 0x01, 0x2C, 0x2D])?;
        self.command(cmd::INVCTR, &[0x07])?;
        self.command(cmd::PWCTR1, &[0xA2, 0x02, 0x84])?;
        self.command(cmd::PWCTR2, &[0x0A, 0x00])?;
        self.command(cmd::PWCTR3, &[0x0A, 0x00])?;
        self.command(cmd::PWCTR4, &[0x8A, 0x2A])?;
        self.command(cmd::PWCTR5, &[0x8A, 0xEE])?;
        self.command(cmd::VMCTR1, &[0x0E])?;
        self.command(
            if self.geometry.invert { cmd::INVON } else { cmd::INVOFF },
            &[],
        )?;
        self.command(cmd::MADCTL, &[0xC8])?;
        self.command(cmd::COLMOD, &[0x05])?;
        self.set_window()?;
        self.command(
            cmd::GMCTRP1,
            &[
                0x02, 0x1C, 0x07, 0x12, 0x37, 0x32, 0x29, 0x2D, 0x29, 0x25, 0x2B, 0x39, 0x00, 0x01,
                0x03, 0x10,
            ],
        )?;
        self.command(
            cmd::GMCTRN1,
            &[
                0x03, 0x1D, 0x07, 0x06, 0x2E, 0x2C, 0x29, 0x2D, 0x2E, 0x2E, 0x37, 0x3F, 0x00, 0x00,
                0x02, 0x10,
            ],
        )?;
        self.command(cmd::NORON, &[])?;
        delay.delay_ms(10);
        self.command(cmd::DISPON, &[])?;
        delay.delay_ms(100);

        self.backlight.set_high().map_err(|_| PanelError::Pin)
    }

    fn set_window(&mut self) -> Result<(), PanelError> {
        let g = self.geometry;
        let x0 = g.offset_left;
        let x1 = g.offset_left + g.width - 1;
        let y0 = g.offset_top;
        let y1 = g.offset_top + g.height - 1;
        let [x0h, x0l] = x0.to_be_bytes();
        let [x1h, x1l] = x1.to_be_bytes();
        let [y0h, y0l] = y0.to_be_bytes();
        let [y1h, y1l] = y1.to_be_bytes();
        self.command(cmd::CASET, &[x0h, x0l, x1h, x1l])?;
        self.command(cmd::RASET, &[y0h, y0l, y1h, y1l])
    }

    fn command(&mut self, command: u8, data: &[u8]) -> Result<(), PanelError> {
        self.dc.set_low().map_err(|_| PanelError::Pin)?;
        self.spi.write(&[command]).map_err(|_| PanelError::Spi)?;
        if !data.is_empty() {
            self.data(data)?;
        }
        Ok(())
    }

    fn data(&mut self, data: &[u8]) -> Result<(), PanelError> {
        self.dc.set_high().map_err(|_| PanelError::Pin)?;
        for chunk in data.chunks(SPI_CHUNK) {
            self.spi.write(chunk).map_err(|_| PanelError::Spi)?;
        }
        Ok(())
    }
}

impl<SPI, DC, BL> PanelDisplay for St7735<SPI, DC, BL>
where
    SPI: SpiDevice,
    DC: OutputPin,
    BL: OutputPin,
{
    fn size(&self) -> (u32, u32) {
        self.geometry.logical_size()
    }

    fn show(&mut self, frame: &FrameBuffer) -> Result<(), PanelError> {
        let expected = self.size();
        let got = (frame.size().width, frame.size().height);
        if got != expected {
            return Err(PanelError::Geometry { got, expected });
        }
        let bytes = frame.to_native_bytes(self.geometry.rotation);
        self.set_window()?;
        self.command(cmd::RAMWR, &[])?;
        self.data(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Particulate, SensorReading};
    use crate::severity::{COLOR_CRITICAL, COLOR_GOOD, COLOR_WARNING};
    use chrono::Local;
    use embedded_hal_mock::eh1::{
        digital::{Mock as PinMock, State, Transaction as PinTransaction},
        spi::{Mock as SpiMock, Transaction as SpiTransaction},
    };

    fn write(bytes: &[u8]) -> Vec<SpiTransaction<u8>> {
        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(bytes.to_vec()),
            SpiTransaction::transaction_end(),
        ]
    }

    fn idle_pin() -> PinMock {
        PinMock::new(&Vec::<PinTransaction>::new())
    }

    #[test]
    fn rotation_270_turns_landscape_into_portrait() {
        let mut fb = FrameBuffer::new(3, 2);
        Pixel(Point::new(0, 0), Rgb565::RED).draw(&mut fb).unwrap();
        Pixel(Point::new(2, 1), Rgb565::BLUE).draw(&mut fb).unwrap();

        let bytes = fb.to_native_bytes(Rotation::Deg270);
        assert_eq!(bytes.len(), 12);
        let native: Vec<u16> = bytes
            .chunks(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        // Native is 2 wide, 3 tall; logical (0,0) lands top right.
        assert_eq!(native[1], Rgb565::RED.into_storage());
        assert_eq!(native[4], Rgb565::BLUE.into_storage());
        assert_eq!(native.iter().filter(|&&p| p != 0).count(), 2);
    }

    #[test]
    fn rotation_0_and_180_keep_dimensions() {
        let mut fb = FrameBuffer::new(2, 1);
        Pixel(Point::new(0, 0), Rgb565::GREEN).draw(&mut fb).unwrap();
        let green = Rgb565::GREEN.into_storage().to_be_bytes();
        assert_eq!(fb.to_native_bytes(Rotation::Deg0)[..2], green);
        assert_eq!(fb.to_native_bytes(Rotation::Deg180)[2..], green);
    }

    #[test]
    fn out_of_bounds_pixels_are_clipped() {
        let mut fb = FrameBuffer::new(2, 2);
        Pixel(Point::new(-1, 0), Rgb565::RED).draw(&mut fb).unwrap();
        Pixel(Point::new(5, 5), Rgb565::RED).draw(&mut fb).unwrap();
        assert_eq!(fb, FrameBuffer::new(2, 2));
    }

    #[test]
    fn show_pushes_whole_window_then_pixels() {
        let geometry = PanelGeometry {
            width: 2,
            height: 1,
            offset_left: 26,
            offset_top: 1,
            rotation: Rotation::Deg0,
            invert: false,
        };
        let mut fb = FrameBuffer::new(2, 1);
        Pixel(Point::new(1, 0), Rgb565::WHITE).draw(&mut fb).unwrap();

        let mut expected = Vec::new();
        expected.extend(write(&[cmd::CASET]));
        expected.extend(write(&[0, 26, 0, 27]));
        expected.extend(write(&[cmd::RASET]));
        expected.extend(write(&[0, 1, 0, 1]));
        expected.extend(write(&[cmd::RAMWR]));
        expected.extend(write(&[0x00, 0x00, 0xFF, 0xFF]));
        let mut spi = SpiMock::new(&expected);
        let dc_expected = [
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
        ];
        let mut dc = PinMock::new(&dc_expected);
        let mut bl = idle_pin();

        let mut panel = St7735::new(spi.clone(), dc.clone(), bl.clone(), geometry);
        panel.show(&fb).unwrap();

        spi.done();
        dc.done();
        bl.done();
    }

    #[test]
    fn show_rejects_mismatched_frame() {
        let mut spi = SpiMock::new(&Vec::<SpiTransaction<u8>>::new());
        let mut dc = idle_pin();
        let mut bl = idle_pin();
        let mut panel = St7735::new(
            spi.clone(),
            dc.clone(),
            bl.clone(),
            PanelGeometry::MINI_160X80,
        );
        assert_eq!(panel.size(), (160, 80));
        assert!(matches!(
            panel.show(&FrameBuffer::new(80, 160)),
            Err(PanelError::Geometry { .. })
        ));
        spi.done();
        dc.done();
        bl.done();
    }

    #[derive(Default)]
    struct CapturePanel {
        frames: Vec<FrameBuffer>,
    }

    impl PanelDisplay for &mut CapturePanel {
        fn size(&self) -> (u32, u32) {
            (160, 80)
        }

        fn show(&mut self, frame: &FrameBuffer) -> Result<(), PanelError> {
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    fn band_has(fb: &FrameBuffer, rows: std::ops::Range<u32>, color: Rgb565) -> bool {
        rows.flat_map(|y| (0..160).map(move |x| (x, y)))
            .any(|(x, y)| fb.pixel(x, y) == Some(color))
    }

    #[test]
    fn panel_draws_one_colored_line_per_bucket_and_runtime() {
        let mut capture = CapturePanel::default();
        let reading = SensorReading::new(
            Local::now(),
            Particulate {
                pm1_0: 0.5,
                pm2_5: 200.0,
                pm10: 2000.0,
            },
            None,
        );
        let frame = Frame {
            reading: &reading,
            colors: [COLOR_GOOD, COLOR_WARNING, COLOR_CRITICAL],
            runtime: "01:02:03",
        };

        let mut renderer = PanelRenderer::new(&mut capture);
        renderer.render(&frame).unwrap();
        renderer.render(&frame).unwrap();
        drop(renderer);

        assert_eq!(capture.frames.len(), 2);
        let fb = &capture.frames[0];
        assert!(band_has(fb, 0..20, Rgb565::from(COLOR_GOOD)));
        assert!(band_has(fb, 20..40, Rgb565::from(COLOR_WARNING)));
        assert!(band_has(fb, 40..60, Rgb565::from(COLOR_CRITICAL)));
        assert!(band_has(fb, 60..80, Rgb565::WHITE));
        assert!(!band_has(fb, 0..20, Rgb565::WHITE));
    }
}
