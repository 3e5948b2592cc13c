//! Relay and indicator outputs on sysfs GPIO lines.
//!
//! Lines are addressed by the path of their `value` file
//! (e.g. `/sys/class/gpio/gpio17/value`); exporting the line and setting its
//! direction is left to the system image.

use crate::display::DisplayBoard;
use crate::error::{HardwareError, IndicatorError, Result};
use crate::traits::{Actuator, Indicator};
use crate::types::LedColor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Gap between two buzzer pulses.
const PULSE_GAP: Duration = Duration::from_millis(100);

/// One digital output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioLine {
    path: PathBuf,
    active_low: bool,
}

impl GpioLine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            active_low: false,
        }
    }

    /// Invert the line: writing "on" drives it low.
    pub fn active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drive the line.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from writing the value file.
    pub async fn set(&self, on: bool) -> std::io::Result<()> {
        let level = if on != self.active_low { "1" } else { "0" };
        tokio::fs::write(&self.path, level).await
    }
}

/// Door strike driven by one GPIO line.
#[derive(Debug)]
pub struct GpioRelay {
    line: GpioLine,
}

impl GpioRelay {
    pub fn new(line: GpioLine) -> Self {
        Self { line }
    }
}

impl Actuator for GpioRelay {
    async fn trigger(&mut self, duration: Duration) -> Result<()> {
        self.line.set(true).await?;
        debug!(line = %self.line.path().display(), duration_ms = duration.as_millis() as u64, "Relay energized");

        tokio::time::sleep(duration).await;

        if let Err(e) = self.line.set(false).await {
            warn!(line = %self.line.path().display(), error = %e, "Failed to release relay");
            return Err(HardwareError::Io(e));
        }
        debug!(line = %self.line.path().display(), "Relay released");
        Ok(())
    }
}

/// LED and buzzer lines for one door.
///
/// Any line may be absent; the matching capability then does nothing.
/// Text goes to the shared [`DisplayBoard`] when one is attached.
#[derive(Debug, Clone, Default)]
pub struct GpioIndicator {
    red: Option<GpioLine>,
    green: Option<GpioLine>,
    blue: Option<GpioLine>,
    buzzer: Option<GpioLine>,
    board: Option<DisplayBoard>,
    hold: Duration,
}

impl GpioIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rgb(mut self, red: Option<GpioLine>, green: Option<GpioLine>, blue: Option<GpioLine>) -> Self {
        self.red = red;
        self.green = green;
        self.blue = blue;
        self
    }

    pub fn with_buzzer(mut self, buzzer: GpioLine) -> Self {
        self.buzzer = Some(buzzer);
        self
    }

    /// Post text to `board`, keeping each message for `hold`.
    pub fn with_board(mut self, board: DisplayBoard, hold: Duration) -> Self {
        self.board = Some(board);
        self.hold = hold;
        self
    }

    async fn write(line: &Option<GpioLine>, on: bool) -> std::result::Result<(), IndicatorError> {
        if let Some(line) = line {
            line.set(on)
                .await
                .map_err(|e| IndicatorError::line(line.path(), e))?;
        }
        Ok(())
    }
}

impl Indicator for GpioIndicator {
    async fn set_color(&mut self, color: LedColor) -> std::result::Result<(), IndicatorError> {
        let [r, g, b] = color.as_digital();
        Self::write(&self.red, r).await?;
        Self::write(&self.green, g).await?;
        Self::write(&self.blue, b).await
    }

    async fn pulse(&mut self, pattern: &[Duration]) -> std::result::Result<(), IndicatorError> {
        if self.buzzer.is_none() {
            return Ok(());
        }
        for (i, length) in pattern.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(PULSE_GAP).await;
            }
            Self::write(&self.buzzer, true).await?;
            tokio::time::sleep(*length).await;
            Self::write(&self.buzzer, false).await?;
        }
        Ok(())
    }

    async fn flash(
        &mut self,
        color: LedColor,
        times: u32,
        period: Duration,
    ) -> std::result::Result<(), IndicatorError> {
        let half = period / 2;
        for _ in 0..times {
            self.set_color(color).await?;
            tokio::time::sleep(half).await;
            self.set_color(LedColor::Off).await?;
            tokio::time::sleep(half).await;
        }
        Ok(())
    }

    async fn off(&mut self) -> std::result::Result<(), IndicatorError> {
        self.set_color(LedColor::Off).await?;
        Self::write(&self.buzzer, false).await
    }

    async fn show_text(&mut self, lines: &[String]) -> std::result::Result<(), IndicatorError> {
        if let Some(board) = &self.board {
            board.show(lines.to_vec(), self.hold);
        }
        Ok(())
    }
}
