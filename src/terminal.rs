//! ANSI terminal output.

use std::io::{self, Write};

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

use crate::traits::{Frame, RenderError, Renderer};

const CLEAR_SCREEN: &str = "\x1b[H\x1b[J";
const BOTTOM_ROW: &str = "\x1b[999;0H";
const RESET: &str = "\x1b[0m";

/// Wrap `text` in a 24-bit foreground color escape.
pub fn paint(text: &str, color: Rgb888) -> String {
    format!(
        "\x1b[38;2;{};{};{}m{text}{RESET}",
        color.r(),
        color.g(),
        color.b()
    )
}

/// Redraws the whole screen every tick: colored particulate lines, plain
/// environment lines when present, runtime pinned to the last row.
pub struct TerminalRenderer<W> {
    out: W,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, frame: &Frame<'_>) -> io::Result<()> {
        let mut screen = String::from(CLEAR_SCREEN);
        for (size, value) in frame.reading.particulate().iter() {
            let line = format!("{}: {:.2}", size.label(), value);
            screen.push_str(&paint(&line, frame.colors[size.index()]));
            screen.push('\n');
        }
        if let Some(env) = frame.reading.environment() {
            screen.push_str(&format!("Temperature: {:.2} C\n", env.temperature));
            screen.push_str(&format!("Pressure: {:.2} hPa\n", env.pressure));
            screen.push_str(&format!("Humidity: {:.2} %\n", env.humidity));
        }
        screen.push('\n');
        screen.push_str(BOTTOM_ROW);
        screen.push_str("Runtime: ");
        screen.push_str(frame.runtime);

        self.out.write_all(screen.as_bytes())?;
        self.out.flush()
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn name(&self) -> &str {
        "terminal"
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
        self.draw(frame).map_err(|e| RenderError(e.to_string()))
    }
}
