//! The lock's state: what's being typed, the password and the door.

/// Maximum amount of digits in an entry. Further digits are discarded.
pub const MAX_DIGITS: u8 = 6;

/// The factory password.
pub const DEFAULT_PASSWORD: u32 = 1234;

/// Digits typed so far, as a number.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Accumulator {
    value: u32,
    digits: u8,
}

impl Accumulator {
    /// Appends a digit (`value * 10 + digit`).
    ///
    /// Returns `false` and leaves the accumulator untouched once [MAX_DIGITS] digits are in, or if
    /// `digit` isn't a decimal digit.
    pub fn push(&mut self, digit: u8) -> bool {
        if self.digits >= MAX_DIGITS || digit > 9 {
            return false;
        }
        self.value = self.value * 10 + digit as u32;
        self.digits += 1;
        true
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn digits(&self) -> u8 {
        self.digits
    }

    pub fn is_empty(&self) -> bool {
        self.digits == 0
    }
}

/// What typed digits are for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EntryMode {
    /// Typing the password to toggle the door.
    Normal {
        input: Accumulator,
    },
    /// Typing a new password.
    ChangingPassword {
        new_pass: Accumulator,
    },
}

impl Default for EntryMode {
    fn default() -> Self {
        EntryMode::Normal {
            input: Accumulator::default(),
        }
    }
}

impl EntryMode {
    /// Starts a fresh password change.
    pub fn changing_password() -> Self {
        EntryMode::ChangingPassword {
            new_pass: Accumulator::default(),
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, EntryMode::Normal { .. })
    }

    /// The accumulator receiving digits in this mode.
    pub fn accumulator(&self) -> &Accumulator {
        match self {
            EntryMode::Normal { input } => input,
            EntryMode::ChangingPassword { new_pass } => new_pass,
        }
    }

    pub fn accumulator_mut(&mut self) -> &mut Accumulator {
        match self {
            EntryMode::Normal { input } => input,
            EntryMode::ChangingPassword { new_pass } => new_pass,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DoorState {
    #[default]
    Closed,
    Open,
}

impl DoorState {
    pub fn toggled(self) -> Self {
        match self {
            DoorState::Closed => DoorState::Open,
            DoorState::Open => DoorState::Closed,
        }
    }

    pub fn is_open(self) -> bool {
        self == DoorState::Open
    }
}

/// Everything the lock remembers. Lives for as long as the device runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub(crate) mode: EntryMode,
    pub(crate) password: u32,
    pub(crate) door: DoorState,
}

impl Session {
    pub fn new(password: u32) -> Self {
        Session {
            mode: EntryMode::default(),
            password,
            door: DoorState::default(),
        }
    }

    pub fn mode(&self) -> &EntryMode {
        &self.mode
    }

    pub fn password(&self) -> u32 {
        self.password
    }

    pub fn door(&self) -> DoorState {
        self.door
    }

    /// Digits typed in the current mode.
    pub fn digits(&self) -> u8 {
        self.mode.accumulator().digits()
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new(DEFAULT_PASSWORD)
    }
}
