//! Character display frame buffer and the message board that feeds it.
//!
//! [`VirtualDisplay`] is a rows × columns frame buffer that stands in for the
//! physical character LCD. It only holds printable ASCII (0x20-0x7E); any
//! other character is replaced with `?` so the buffer always matches what a
//! real HD44780-style controller could show.
//!
//! [`DisplayBoard`] is where indicators post scan results. The idle display
//! refresher reads it on every tick and shows the posted message until its
//! hold time runs out, then falls back to the idle screen.

use crate::bus::I2cBus;
use crate::error::Result;
use crate::traits::CharacterDisplay;
use labgate_core::constants::{DEFAULT_DISPLAY_COLS, DEFAULT_DISPLAY_ROWS};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Text alignment options for display lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Text starts at column 0, padded with spaces on the right.
    Left,
    /// Text centered with equal padding on both sides (extra space on right if odd).
    Center,
    /// Text ends at the last column, padded with spaces on the left.
    Right,
}

/// Truncate text to at most `max_chars` characters.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Pad or truncate `text` to exactly `width` characters.
///
/// # Examples
///
/// ```
/// use labgate_hardware::display::{Alignment, align_text};
///
/// assert_eq!(align_text("AI LAB", 10, Alignment::Center), "  AI LAB  ");
/// assert_eq!(align_text("toolong", 4, Alignment::Left), "tool");
/// ```
pub fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let char_count = text.chars().count();

    if char_count >= width {
        return truncate_text(text, width);
    }

    let padding = width - char_count;

    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left_pad = padding / 2;
            let right_pad = padding - left_pad;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
        }
    }
}

fn sanitize_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '?' })
        .collect()
}

/// In-memory character display.
///
/// Clones share the same frame buffer, so a test (or the CLI status output)
/// can keep a clone and look at what the refresher drew.
///
/// # Examples
///
/// ```
/// use labgate_hardware::display::VirtualDisplay;
///
/// let display = VirtualDisplay::new(4, 20);
/// assert_eq!(display.lines().len(), 4);
/// assert!(display.lines().iter().all(|l| l.len() == 20));
/// ```
#[derive(Debug, Clone)]
pub struct VirtualDisplay {
    rows: usize,
    cols: usize,
    frame: Arc<Mutex<Frame>>,
}

#[derive(Debug)]
struct Frame {
    buffer: Vec<String>,
    renders: u64,
}

impl VirtualDisplay {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            frame: Arc::new(Mutex::new(Frame {
                buffer: vec![" ".repeat(cols); rows],
                renders: 0,
            })),
        }
    }

    /// Current frame, one string of exactly `cols` characters per row.
    pub fn lines(&self) -> Vec<String> {
        self.frame.lock().buffer.clone()
    }

    /// Row `row` with trailing padding removed.
    pub fn line(&self, row: usize) -> Option<String> {
        self.frame
            .lock()
            .buffer
            .get(row)
            .map(|l| l.trim_end().to_string())
    }

    /// Number of completed renders.
    pub fn render_count(&self) -> u64 {
        self.frame.lock().renders
    }

    /// Lay out `lines` into a full frame: centered, truncated, padded, blank
    /// rows below the text.
    pub fn compose(&self, lines: &[String]) -> Vec<String> {
        (0..self.rows)
            .map(|row| {
                let text = lines.get(row).map(|l| sanitize_text(l)).unwrap_or_default();
                align_text(&text, self.cols, Alignment::Center)
            })
            .collect()
    }
}

impl Default for VirtualDisplay {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_ROWS, DEFAULT_DISPLAY_COLS)
    }
}

impl CharacterDisplay for VirtualDisplay {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    async fn render(&mut self, _bus: &mut dyn I2cBus, lines: &[String]) -> Result<()> {
        let composed = self.compose(lines);
        let mut frame = self.frame.lock();
        frame.buffer = composed;
        frame.renders += 1;
        Ok(())
    }
}

#[derive(Debug)]
struct Posted {
    lines: Vec<String>,
    until: Instant,
}

/// Shared slot for the message currently owed to the display.
///
/// Cheap to clone; all clones see the same slot. A newer message replaces an
/// older one.
#[derive(Debug, Clone, Default)]
pub struct DisplayBoard {
    slot: Arc<Mutex<Option<Posted>>>,
}

impl DisplayBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post `lines` for `hold`.
    pub fn show(&self, lines: Vec<String>, hold: Duration) {
        *self.slot.lock() = Some(Posted {
            lines,
            until: Instant::now() + hold,
        });
    }

    /// The posted message, if it has not expired yet.
    pub fn current(&self) -> Option<Vec<String>> {
        let mut slot = self.slot.lock();
        if slot
            .as_ref()
            .is_some_and(|posted| Instant::now() >= posted.until)
        {
            *slot = None;
        }
        slot.as_ref().map(|posted| posted.lines.clone())
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBus;

    #[test]
    fn test_text_alignment_left() {
        assert_eq!(align_text("HELLO", 10, Alignment::Left), "HELLO     ");
    }

    #[test]
    fn test_text_alignment_center_odd_padding() {
        assert_eq!(align_text("ABC", 8, Alignment::Center), "  ABC   ");
    }

    #[test]
    fn test_text_alignment_right() {
        assert_eq!(align_text("HELLO", 10, Alignment::Right), "     HELLO");
    }

    #[test]
    fn test_compose_pads_and_truncates() {
        let display = VirtualDisplay::new(2, 8);
        let frame = display.compose(&["ABCDEFGHIJK".to_string()]);
        assert_eq!(frame, vec!["ABCDEFGH".to_string(), "        ".to_string()]);
    }

    #[test]
    fn test_compose_replaces_non_ascii() {
        let display = VirtualDisplay::new(1, 6);
        let frame = display.compose(&["Kapı".to_string()]);
        assert_eq!(frame[0], " Kap? ");
    }

    #[tokio::test]
    async fn test_render_updates_shared_frame() {
        let (mut bus, _handle) = MockBus::new();
        let mut display = VirtualDisplay::new(4, 20);
        let observer = display.clone();

        display
            .render(&mut bus, &["Card read".to_string(), "Door opened".to_string()])
            .await
            .unwrap();

        assert_eq!(observer.render_count(), 1);
        assert_eq!(observer.line(0).unwrap().trim(), "Card read");
        assert_eq!(observer.line(1).unwrap().trim(), "Door opened");
        assert_eq!(observer.line(3).unwrap(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_board_message_expires() {
        let board = DisplayBoard::new();
        board.show(vec!["Card read".to_string()], Duration::from_secs(2));

        assert_eq!(board.current(), Some(vec!["Card read".to_string()]));

        tokio::time::advance(Duration::from_millis(2001)).await;
        assert_eq!(board.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_board_newer_message_replaces_older() {
        let board = DisplayBoard::new();
        let poster = board.clone();

        poster.show(vec!["first".to_string()], Duration::from_secs(5));
        poster.show(vec!["second".to_string()], Duration::from_secs(5));

        assert_eq!(board.current(), Some(vec!["second".to_string()]));
        board.clear();
        assert_eq!(board.current(), None);
    }
}
