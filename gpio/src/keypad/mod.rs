mod matrix;

use std::fmt::Debug;
use crate::GpioResult;
pub use matrix::*;

/// The `Keypad` trait defines the interface for keypad input devices.
pub trait Keypad: Debug {
    type Key;

    /// Scans the keypad once.
    ///
    /// Returns `None` if no key was pressed during the pass.
    fn scan(&self) -> GpioResult<Option<Self::Key>>;
}

/// Represents the keys on a 4x3 telephone-style keypad.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum KeypadKey {
    /// One of the `0`..`9` keys. Values above 9 don't exist on the keypad; build digits with
    /// [KeypadKey::digit] to rule them out.
    Digit(u8),
    /// The `*` key.
    Star,
    /// The `#` key.
    Hash,
}

impl KeypadKey {
    const KEYS: [[KeypadKey; MATRIX_COLS]; MATRIX_ROWS] = {
        use KeypadKey::*;
        [
            [ Digit(1), Digit(2), Digit(3), ],
            [ Digit(4), Digit(5), Digit(6), ],
            [ Digit(7), Digit(8), Digit(9), ],
            [ Star,     Digit(0), Hash,     ],
        ]
    };

    /// Converts a position tuple (row, column), both 0-based, to a [KeypadKey].
    pub fn from_position(pos: (usize, usize)) -> Option<KeypadKey> {
        Self::KEYS.get(pos.0)?.get(pos.1).copied()
    }

    /// Gets the (row, column) position of the key in the matrix, or `None` for a digit above 9.
    pub fn position(self) -> Option<(usize, usize)> {
        match self {
            KeypadKey::Digit(0) => Some((3, 1)),
            KeypadKey::Digit(d @ 1..=9) => {
                let i = (d - 1) as usize;
                Some((i / MATRIX_COLS, i % MATRIX_COLS))
            }
            KeypadKey::Digit(_) => None,
            KeypadKey::Star => Some((3, 0)),
            KeypadKey::Hash => Some((3, 2)),
        }
    }

    /// Converts the [KeypadKey] to its corresponding character.
    pub fn to_char(self) -> char {
        match self {
            KeypadKey::Digit(d) => char::from_digit(d as u32, 10).unwrap_or('?'),
            KeypadKey::Star => '*',
            KeypadKey::Hash => '#',
        }
    }

    /// Parses a keypad character. Anything that isn't on the keypad gives `None`.
    pub fn from_char(c: char) -> Option<KeypadKey> {
        match c {
            '*' => Some(KeypadKey::Star),
            '#' => Some(KeypadKey::Hash),
            _ => KeypadKey::digit(c.to_digit(10)? as u8),
        }
    }

    /// Makes a digit key. Gives `None` if `d` isn't a single decimal digit.
    pub fn digit(d: u8) -> Option<KeypadKey> {
        (d <= 9).then_some(KeypadKey::Digit(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_telephone_keypad() {
        let layout: String = (0..MATRIX_ROWS)
            .flat_map(|row| (0..MATRIX_COLS).map(move |col| (row, col)))
            .map(|pos| KeypadKey::from_position(pos).unwrap().to_char())
            .collect();
        assert_eq!(layout, "123456789*0#");
    }

    #[test]
    fn out_of_range_positions() {
        assert_eq!(KeypadKey::from_position((4, 0)), None);
        assert_eq!(KeypadKey::from_position((0, 3)), None);
    }

    #[test]
    fn position_is_inverse_of_from_position() {
        for c in "0123456789*#".chars() {
            let key = KeypadKey::from_char(c).unwrap();
            let position = key.position().unwrap();
            assert_eq!(KeypadKey::from_position(position), Some(key), "key {c}");
        }
    }

    #[test]
    fn digits_above_nine_are_not_keys() {
        assert_eq!(KeypadKey::digit(9), Some(KeypadKey::Digit(9)));
        assert_eq!(KeypadKey::digit(10), None);
        assert_eq!(KeypadKey::Digit(12).position(), None);
        assert_eq!(KeypadKey::Digit(12).to_char(), '?');
    }

    #[test]
    fn from_char_rejects_other_characters() {
        assert_eq!(KeypadKey::from_char('A'), None);
        assert_eq!(KeypadKey::from_char(' '), None);
        assert_eq!(KeypadKey::from_char('7'), Some(KeypadKey::Digit(7)));
    }
}
