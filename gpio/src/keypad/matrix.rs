use std::fmt::{Debug, Formatter};
use std::time::Duration;
use log::{debug, trace};
use crate::{Delay, GpioBusInput, GpioBusOutput, GpioResult};
use crate::keypad::{Keypad, KeypadKey};

/// Number of row lines (driven by the scanner).
pub const MATRIX_ROWS: usize = 4;
/// Number of column lines (sampled by the scanner).
pub const MATRIX_COLS: usize = 3;

/// Timings used by [MatrixKeypad::scan].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScanTiming {
    /// Wait between driving a row and sampling the columns.
    pub settle: Duration,
    /// Wait after a press is detected, before waiting for the release.
    pub debounce: Duration,
    /// Wait after the key was released.
    pub release: Duration,
    /// Interval between column samples while waiting for the release.
    pub release_poll: Duration,
}

impl Default for ScanTiming {
    fn default() -> Self {
        ScanTiming {
            settle: Duration::from_micros(50),
            debounce: Duration::from_millis(20),
            release: Duration::from_millis(20),
            release_poll: Duration::from_millis(1),
        }
    }
}

/// A 4x3 matrix keypad scanned by driving one row at a time and sampling the columns.
///
/// Rows and columns are read and written in logical levels, so for the usual wiring (rows
/// open-drain, columns pulled up) both buses should be configured active-low.
pub struct MatrixKeypad<'a> {
    rows: &'a dyn GpioBusOutput<MATRIX_ROWS>,
    cols: &'a dyn GpioBusInput<MATRIX_COLS>,
    delay: &'a dyn Delay,
    timing: ScanTiming,
}

impl Debug for MatrixKeypad<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatrixKeypad({:?}, {:?})", self.rows, self.cols)
    }
}

impl<'a> MatrixKeypad<'a> {
    /// Creates a new `MatrixKeypad` with the default [ScanTiming].
    pub fn new(
        rows: &'a dyn GpioBusOutput<MATRIX_ROWS>,
        cols: &'a dyn GpioBusInput<MATRIX_COLS>,
        delay: &'a dyn Delay,
    ) -> Self {
        MatrixKeypad {
            rows,
            cols,
            delay,
            timing: ScanTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: ScanTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn timing(&self) -> ScanTiming {
        self.timing
    }

    fn drive_row(&self, row: Option<usize>) -> GpioResult<()> {
        let lines = std::array::from_fn(|i| Some(i) == row);
        self.rows.write(&lines)
    }

    /// Finds the first active column in the given row, lowest column first.
    fn sample_row(&self, row: usize) -> GpioResult<Option<usize>> {
        self.drive_row(Some(row))?;
        self.delay.delay(self.timing.settle);
        let cols = self.cols.read()?;
        Ok(cols.iter().position(|&active| active))
    }

    /// Blocks until the column goes inactive. The detected row must still be driven.
    fn wait_release(&self, col: usize) -> GpioResult<()> {
        let mut polls = 0u64;
        while self.cols.read()?[col] {
            polls += 1;
            self.delay.delay(self.timing.release_poll);
        }
        trace!("Column {} released after {} polls.", col, polls);
        Ok(())
    }

    fn find_press(&self) -> GpioResult<Option<(usize, usize)>> {
        for row in 0..MATRIX_ROWS {
            if let Some(col) = self.sample_row(row)? {
                return Ok(Some((row, col)));
            }
        }
        Ok(None)
    }
}

impl Keypad for MatrixKeypad<'_> {
    type Key = KeypadKey;

    fn scan(&self) -> GpioResult<Option<KeypadKey>> {
        let pressed = match self.find_press() {
            Ok(Some(pos)) => pos,
            Ok(None) => {
                self.drive_row(None)?;
                return Ok(None);
            }
            Err(e) => {
                self.drive_row(None)?;
                return Err(e);
            }
        };

        let (row, col) = pressed;
        self.delay.delay(self.timing.debounce);
        let released = self.wait_release(col);
        self.drive_row(None)?;
        released?;
        self.delay.delay(self.timing.release);

        let key = KeypadKey::from_position(pressed);
        debug!("Key at row {}, col {}: {:?}", row, col, key);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{InstantDelay, SimMatrix};

    #[test]
    fn idle_matrix_gives_none() {
        let matrix = SimMatrix::new();
        let delay = InstantDelay::default();
        let keypad = MatrixKeypad::new(matrix.rows(), matrix.cols(), &delay);

        assert_eq!(keypad.scan().unwrap(), None);
        assert_eq!(matrix.driven_row(), None);
        // One settle wait per row, nothing else.
        assert_eq!(delay.total(), keypad.timing().settle * MATRIX_ROWS as u32);
    }

    #[test]
    fn resolves_every_key() {
        let matrix = SimMatrix::new();
        let delay = InstantDelay::default();
        let keypad = MatrixKeypad::new(matrix.rows(), matrix.cols(), &delay);

        for c in "123456789*0#".chars() {
            matrix.press(KeypadKey::from_char(c).unwrap());
        }
        let typed: String = std::iter::from_fn(|| keypad.scan().unwrap())
            .map(KeypadKey::to_char)
            .collect();
        assert_eq!(typed, "123456789*0#");
        assert!(matrix.is_idle());
    }

    #[test]
    fn one_press_per_scan_even_when_held() {
        let matrix = SimMatrix::new();
        let delay = InstantDelay::default();
        let keypad = MatrixKeypad::new(matrix.rows(), matrix.cols(), &delay);

        matrix.press_held(KeypadKey::Digit(5), 40);
        assert_eq!(keypad.scan().unwrap(), Some(KeypadKey::Digit(5)));
        assert_eq!(keypad.scan().unwrap(), None);
    }

    #[test]
    fn scan_blocks_until_release() {
        let matrix = SimMatrix::new();
        let delay = InstantDelay::default();
        let timing = ScanTiming::default();
        let keypad = MatrixKeypad::new(matrix.rows(), matrix.cols(), &delay).with_timing(timing);

        // Row 0 holds '1'; the press is seen on the first sample and then for 9 more polls.
        matrix.press_held(KeypadKey::Digit(1), 10);
        assert_eq!(keypad.scan().unwrap(), Some(KeypadKey::Digit(1)));

        let expected = timing.settle
            + timing.debounce
            + timing.release_poll * 9
            + timing.release;
        assert_eq!(delay.total(), expected);
        assert_eq!(matrix.driven_row(), None);
    }

    #[test]
    fn first_column_wins_within_a_row() {
        let matrix = SimMatrix::new();
        let delay = InstantDelay::default();
        let keypad = MatrixKeypad::new(matrix.rows(), matrix.cols(), &delay);

        matrix.press_contacts(&[(1, 2), (1, 1)], 1);
        assert_eq!(keypad.scan().unwrap(), Some(KeypadKey::Digit(5)));
    }

    #[test]
    fn lowest_row_wins() {
        let matrix = SimMatrix::new();
        let delay = InstantDelay::default();
        let keypad = MatrixKeypad::new(matrix.rows(), matrix.cols(), &delay);

        matrix.press_contacts(&[(3, 0), (2, 2)], 1);
        assert_eq!(keypad.scan().unwrap(), Some(KeypadKey::Digit(9)));
    }
}
