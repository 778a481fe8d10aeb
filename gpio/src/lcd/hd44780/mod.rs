//! HD44780-compatible character LCD module.
//!
//! Only the write path is supported; the R/W line is expected to be tied low.

mod gpio;

use crate::{GpioError, GpioResult};
pub use gpio::*;
use std::fmt::Debug;

/// Direction the address counter moves after a character is written.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    Left,
    Right,
}

pub trait HD44780Driver: Debug {
    /// Wakes the controller up in 4-bit mode and applies the default settings: two lines, display
    /// on with the cursor hidden, left-to-right entry, cleared screen.
    fn init(&mut self) -> GpioResult<()>;

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(0b0000_0001)
    }

    /// Sets the cursor movement direction and whether the display shifts with it.
    fn entry_mode(&mut self, direction: CursorDirection, shift: bool) -> GpioResult<()> {
        let mut command = 0b0000_0100;
        if direction == CursorDirection::Right {
            command |= 0b0000_0010;
        }
        if shift {
            command |= 0b0000_0001;
        }
        self.send_command(command)
    }

    /// Turns the display, the cursor and the cursor blinking on or off.
    fn display_control(&mut self, display: bool, cursor: bool, blink: bool) -> GpioResult<()> {
        let mut command = 0b0000_1000;
        if display {
            command |= 0b0000_0100;
        }
        if cursor {
            command |= 0b0000_0010;
        }
        if blink {
            command |= 0b0000_0001;
        }
        self.send_command(command)
    }

    /// Sets the interface width, line count and font. `eight_bit` must match the wiring.
    fn function_set(&mut self, eight_bit: bool, two_lines: bool, tall_font: bool) -> GpioResult<()> {
        let mut command = 0b0010_0000;
        if eight_bit {
            command |= 0b0001_0000;
        }
        if two_lines {
            command |= 0b0000_1000;
        }
        if tall_font {
            command |= 0b0000_0100;
        }
        self.send_command(command)
    }

    /// Moves the cursor to a DDRAM address. Line 1 starts at `0x00`, line 2 at `0x40`.
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b0111_1111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(0b1000_0000 | address)
    }

    /// Sends a command byte (RS low).
    fn send_command(&mut self, command: u8) -> GpioResult<()>;

    /// Sends a data byte (RS high), writing a character at the cursor.
    fn send_data(&mut self, data: u8) -> GpioResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Recorder {
        commands: Vec<u8>,
    }

    impl HD44780Driver for Recorder {
        fn init(&mut self) -> GpioResult<()> {
            Ok(())
        }

        fn send_command(&mut self, command: u8) -> GpioResult<()> {
            self.commands.push(command);
            Ok(())
        }

        fn send_data(&mut self, _data: u8) -> GpioResult<()> {
            Ok(())
        }
    }

    #[test]
    fn command_encoding() {
        let mut lcd = Recorder::default();
        lcd.clear_display().unwrap();
        lcd.function_set(false, true, false).unwrap();
        lcd.display_control(true, false, false).unwrap();
        lcd.entry_mode(CursorDirection::Right, false).unwrap();
        lcd.set_ddram_address(0x40).unwrap();
        lcd.set_ddram_address(0x09).unwrap();
        assert_eq!(lcd.commands, vec![0x01, 0x28, 0x0C, 0x06, 0xC0, 0x89]);
    }

    #[test]
    fn ddram_address_out_of_range() {
        let mut lcd = Recorder::default();
        assert_eq!(lcd.set_ddram_address(0x80), Err(GpioError::InvalidArgument));
        assert!(lcd.commands.is_empty());
    }
}
