//! Simulated hardware, for running the lock without a board and for tests.
//!
//! [SimMatrix] stands in for the keypad wiring: presses are queued up front and show up on the
//! column lines whenever the scanner drives the row they're on. Between two presses the columns
//! read idle at least once, the same way fingers leave the keys between presses.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::time::Duration;
use log::trace;
use crate::{Delay, GpioBusInput, GpioBusOutput, GpioError, GpioResult};
use crate::keypad::{KeypadKey, MATRIX_COLS, MATRIX_ROWS};

/// A queued key press.
#[derive(Clone, Debug, Eq, PartialEq)]
struct SimPress {
    /// Closed (row, column) contacts.
    contacts: Vec<(usize, usize)>,
    /// How many more column samples will still see this press.
    remaining: usize,
}

/// A simulated key matrix.
#[derive(Default)]
pub struct SimMatrix {
    presses: RefCell<VecDeque<SimPress>>,
    driven_row: Cell<Option<usize>>,
    /// Set when a press was released and no idle read happened since.
    releasing: Cell<bool>,
}

impl SimMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a press of `key` that is released right after it's first seen.
    pub fn press(&self, key: KeypadKey) {
        self.press_held(key, 1);
    }

    /// Queues a press of `key` that stays down for `samples` column reads.
    ///
    /// Keys that aren't on the matrix (digits above 9) are ignored.
    pub fn press_held(&self, key: KeypadKey, samples: usize) {
        if let Some(position) = key.position() {
            self.press_contacts(&[position], samples);
        }
    }

    /// Queues a press closing all `contacts` at once, e.g. two keys mashed together.
    ///
    /// Contacts outside the matrix are ignored.
    pub fn press_contacts(&self, contacts: &[(usize, usize)], samples: usize) {
        let contacts: Vec<_> = contacts
            .iter()
            .copied()
            .filter(|&(row, col)| row < MATRIX_ROWS && col < MATRIX_COLS)
            .collect();
        if contacts.is_empty() || samples == 0 {
            return;
        }
        self.presses.borrow_mut().push_back(SimPress { contacts, remaining: samples });
    }

    /// Queues a press for every keypad character in `keys`, skipping anything else.
    ///
    /// Returns the amount of presses queued.
    pub fn type_str(&self, keys: &str) -> usize {
        keys.chars()
            .filter_map(KeypadKey::from_char)
            .inspect(|&key| self.press(key))
            .count()
    }

    /// Whether every queued press has been consumed.
    pub fn is_idle(&self) -> bool {
        self.presses.borrow().is_empty()
    }

    /// The row currently driven active by the scanner, if any.
    pub fn driven_row(&self) -> Option<usize> {
        self.driven_row.get()
    }

    /// The row output side of the matrix.
    pub fn rows(&self) -> &dyn GpioBusOutput<MATRIX_ROWS> {
        self
    }

    /// The column input side of the matrix.
    pub fn cols(&self) -> &dyn GpioBusInput<MATRIX_COLS> {
        self
    }
}

impl Debug for SimMatrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimMatrix({} queued)", self.presses.borrow().len())
    }
}

impl GpioBusOutput<MATRIX_ROWS> for SimMatrix {
    fn write(&self, values: &[bool; MATRIX_ROWS]) -> GpioResult<()> {
        let mut active = values.iter().enumerate().filter(|&(_, &v)| v).map(|(i, _)| i);
        let row = active.next();
        if active.next().is_some() {
            // Two driven rows would short through any pressed key in a shared column.
            return Err(GpioError::InvalidArgument);
        }
        self.driven_row.set(row);
        Ok(())
    }
}

impl GpioBusInput<MATRIX_COLS> for SimMatrix {
    fn read(&self) -> GpioResult<[bool; MATRIX_COLS]> {
        let mut cols = [false; MATRIX_COLS];
        let Some(row) = self.driven_row.get() else {
            return Ok(cols);
        };
        if self.releasing.replace(false) {
            return Ok(cols);
        }

        let mut presses = self.presses.borrow_mut();
        let Some(press) = presses.front_mut() else {
            return Ok(cols);
        };

        for &(r, c) in &press.contacts {
            if r == row {
                cols[c] = true;
            }
        }

        if cols.contains(&true) {
            press.remaining -= 1;
            if press.remaining == 0 {
                trace!("Simulated press {:?} released.", press.contacts);
                presses.pop_front();
                self.releasing.set(true);
            }
        }

        Ok(cols)
    }
}

/// A [Delay] that returns immediately and only adds up the time it was asked to wait.
#[derive(Debug, Default)]
pub struct InstantDelay {
    total: Cell<Duration>,
}

impl InstantDelay {
    /// Total time requested so far.
    pub fn total(&self) -> Duration {
        self.total.get()
    }
}

impl Delay for InstantDelay {
    fn delay(&self, duration: Duration) {
        self.total.set(self.total.get() + duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_follow_the_driven_row() {
        let matrix = SimMatrix::new();
        matrix.press_held(KeypadKey::Digit(6), 5);

        matrix.rows().write(&[true, false, false, false]).unwrap();
        assert_eq!(matrix.cols().read().unwrap(), [false; 3]);

        matrix.rows().write(&[false, true, false, false]).unwrap();
        assert_eq!(matrix.cols().read().unwrap(), [false, false, true]);
        assert_eq!(matrix.driven_row(), Some(1));
    }

    #[test]
    fn press_is_released_after_its_samples() {
        let matrix = SimMatrix::new();
        matrix.press_held(KeypadKey::Hash, 2);
        matrix.rows().write(&[false, false, false, true]).unwrap();

        assert_eq!(matrix.cols().read().unwrap(), [false, false, true]);
        assert_eq!(matrix.cols().read().unwrap(), [false, false, true]);
        assert_eq!(matrix.cols().read().unwrap(), [false; 3]);
        assert!(matrix.is_idle());
    }

    #[test]
    fn presses_are_separated_by_an_idle_read() {
        let matrix = SimMatrix::new();
        matrix.type_str("11");
        matrix.rows().write(&[true, false, false, false]).unwrap();

        assert_eq!(matrix.cols().read().unwrap(), [true, false, false]);
        assert_eq!(matrix.cols().read().unwrap(), [false; 3]);
        assert_eq!(matrix.cols().read().unwrap(), [true, false, false]);
        assert!(matrix.is_idle());
    }

    #[test]
    fn keys_off_the_matrix_are_not_queued() {
        let matrix = SimMatrix::new();
        matrix.press(KeypadKey::Digit(11));
        assert!(matrix.is_idle());
    }

    #[test]
    fn driving_two_rows_is_rejected() {
        let matrix = SimMatrix::new();
        assert_eq!(
            matrix.rows().write(&[true, true, false, false]),
            Err(GpioError::InvalidArgument),
        );
    }

    #[test]
    fn type_str_skips_unknown_characters() {
        let matrix = SimMatrix::new();
        assert_eq!(matrix.type_str("12 a#\n"), 3);
    }

    #[test]
    fn instant_delay_adds_up() {
        let delay = InstantDelay::default();
        delay.delay(Duration::from_millis(20));
        delay.delay(Duration::from_micros(50));
        assert_eq!(delay.total(), Duration::from_micros(20_050));
    }
}
