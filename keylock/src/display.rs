//! The screen the lock talks to.

use std::fmt::{Debug, Formatter};
use std::io::Write;
use log::warn;
use keylock_gpio::{GpioError, GpioResult};
use keylock_gpio::lcd::hd44780::HD44780Driver;
use crate::utils::WithinExt;

/// Lines on the display.
pub const DISPLAY_ROWS: usize = 2;
/// Characters per line.
pub const DISPLAY_COLS: usize = 16;

/// A 16x2 character display.
pub trait DisplaySurface: Debug {
    /// Clears the screen and moves the cursor to the start of line 1.
    fn clear(&mut self) -> GpioResult<()>;

    /// Moves the cursor. Both `row` and `col` are 0-based.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the position is off-screen.
    fn set_cursor(&mut self, row: usize, col: usize) -> GpioResult<()>;

    /// Writes text at the cursor, moving it right.
    fn print(&mut self, s: &str) -> GpioResult<()>;
}

fn check_position(row: usize, col: usize) -> GpioResult<()> {
    if !row.within(0..DISPLAY_ROWS) || !col.within(0..DISPLAY_COLS) {
        return Err(GpioError::InvalidArgument);
    }
    Ok(())
}

fn to_ascii(c: char) -> u8 {
    if c.is_ascii() {
        c as u8
    } else {
        warn!("Non-ASCII character: {}", c);
        b'?'
    }
}

impl <T: ?Sized + HD44780Driver> DisplaySurface for T {
    fn clear(&mut self) -> GpioResult<()> {
        self.clear_display()
    }

    fn set_cursor(&mut self, row: usize, col: usize) -> GpioResult<()> {
        check_position(row, col)?;
        self.set_ddram_address((0x40 * row + col) as u8)
    }

    fn print(&mut self, s: &str) -> GpioResult<()> {
        for c in s.chars() {
            self.send_data(to_ascii(c))?;
        }
        Ok(())
    }
}

/// A display kept in memory and drawn as a framed box on a writer after every change.
pub struct TerminalDisplay<W: Write> {
    cells: [[u8; DISPLAY_COLS]; DISPLAY_ROWS],
    cursor: (usize, usize),
    out: W,
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        TerminalDisplay {
            cells: [[b' '; DISPLAY_COLS]; DISPLAY_ROWS],
            cursor: (0, 0),
            out,
        }
    }

    /// Gets the text on a line, without trailing blanks.
    pub fn line(&self, row: usize) -> String {
        let line = String::from_utf8_lossy(&self.cells[row]).into_owned();
        line.trim_end().to_string()
    }

    #[cfg(test)]
    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        &self.out
    }

    fn render(&mut self) -> GpioResult<()> {
        let border = "-".repeat(DISPLAY_COLS);
        writeln!(self.out, "+{}+", border)?;
        for row in &self.cells {
            writeln!(self.out, "|{}|", String::from_utf8_lossy(row))?;
        }
        writeln!(self.out, "+{}+", border)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> Debug for TerminalDisplay<W> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TerminalDisplay({:?}, {:?})", self.line(0), self.line(1))
    }
}

impl<W: Write> DisplaySurface for TerminalDisplay<W> {
    fn clear(&mut self) -> GpioResult<()> {
        self.cells = [[b' '; DISPLAY_COLS]; DISPLAY_ROWS];
        self.cursor = (0, 0);
        self.render()
    }

    fn set_cursor(&mut self, row: usize, col: usize) -> GpioResult<()> {
        check_position(row, col)?;
        self.cursor = (row, col);
        Ok(())
    }

    fn print(&mut self, s: &str) -> GpioResult<()> {
        let (row, mut col) = self.cursor;
        for c in s.chars() {
            // Past the last column the controller keeps writing into memory that isn't shown.
            if let Some(cell) = self.cells[row].get_mut(col) {
                *cell = to_ascii(c);
            }
            col += 1;
        }
        self.cursor = (row, col);
        self.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Recorder {
        bytes: Vec<(bool, u8)>,
    }

    impl HD44780Driver for Recorder {
        fn init(&mut self) -> GpioResult<()> {
            Ok(())
        }

        fn send_command(&mut self, command: u8) -> GpioResult<()> {
            self.bytes.push((false, command));
            Ok(())
        }

        fn send_data(&mut self, data: u8) -> GpioResult<()> {
            self.bytes.push((true, data));
            Ok(())
        }
    }

    #[test]
    fn lcd_cursor_addresses() {
        let mut lcd = Recorder::default();
        lcd.set_cursor(0, 9).unwrap();
        lcd.set_cursor(1, 0).unwrap();
        assert_eq!(lcd.bytes, vec![(false, 0x89), (false, 0xC0)]);
    }

    #[test]
    fn lcd_rejects_off_screen_cursor() {
        let mut lcd = Recorder::default();
        assert_eq!(lcd.set_cursor(2, 0), Err(GpioError::InvalidArgument));
        assert_eq!(lcd.set_cursor(0, 16), Err(GpioError::InvalidArgument));
        assert!(lcd.bytes.is_empty());
    }

    #[test]
    fn lcd_print_replaces_non_ascii() {
        let mut lcd = Recorder::default();
        lcd.print("Ok°").unwrap();
        assert_eq!(lcd.bytes, vec![(true, b'O'), (true, b'k'), (true, b'?')]);
    }

    #[test]
    fn terminal_display_tracks_text() {
        let mut display = TerminalDisplay::new(Vec::new());
        display.clear().unwrap();
        display.print("Password:").unwrap();
        display.set_cursor(1, 0).unwrap();
        display.print("Wrong Try").unwrap();
        assert_eq!(display.line(0), "Password:");
        assert_eq!(display.line(1), "Wrong Try");

        display.clear().unwrap();
        assert_eq!(display.line(0), "");
        assert_eq!(display.cursor(), (0, 0));
    }

    #[test]
    fn terminal_display_clips_long_lines() {
        let mut display = TerminalDisplay::new(std::io::sink());
        display.set_cursor(0, 12).unwrap();
        display.print("123456").unwrap();
        assert_eq!(display.line(0), "            1234");
        assert_eq!(display.cursor(), (0, 18));
    }

    #[test]
    fn terminal_display_renders_frames() {
        let mut display = TerminalDisplay::new(Vec::new());
        display.print("Welcome").unwrap();
        let out = String::from_utf8(display.writer().clone()).unwrap();
        assert_eq!(
            out,
            "+----------------+\n|Welcome         |\n|                |\n+----------------+\n",
        );
    }
}
