//! The module for the key handling logic of the lock.

use std::fmt::{Display, Formatter};
use std::time::Duration;
use log::{debug, trace};
use keylock_gpio::{Delay, GpioResult};
use keylock_gpio::keypad::KeypadKey;
use crate::display::DisplaySurface;
use crate::session::{EntryMode, Session};

pub const PROMPT_PASSWORD: &str = "Password:";
pub const PROMPT_NEW_PASSWORD: &str = "Enter New Pass:";
pub const MSG_WELCOME: &str = "Welcome";
pub const MSG_SAVED: &str = "Password Saved";
pub const MSG_OPEN: &str = "OPEN";
pub const MSG_CLOSED: &str = "CLOSED";
pub const MSG_WRONG: &str = "Wrong Try";
/// Echoed for every accepted digit.
pub const MASK: &str = "*";

/// How long messages stay on screen before the prompt comes back.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HoldTiming {
    /// After `OPEN`, `CLOSED` or `Wrong Try`.
    pub result: Duration,
    /// After `Password Saved`.
    pub saved: Duration,
    /// The boot screen.
    pub welcome: Duration,
}

impl Default for HoldTiming {
    fn default() -> Self {
        HoldTiming {
            result: Duration::from_millis(1500),
            saved: Duration::from_millis(1500),
            welcome: Duration::from_millis(2000),
        }
    }
}

/// Something worth telling the outside world about.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccessEvent {
    DoorOpened,
    DoorClosed,
    WrongPassword,
    PasswordChangeStarted,
    PasswordChanged,
    /// `#` pressed twice without a digit in between.
    PasswordChangeAborted,
}

impl Display for AccessEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccessEvent::DoorOpened => "door opened",
            AccessEvent::DoorClosed => "door closed",
            AccessEvent::WrongPassword => "wrong password entered",
            AccessEvent::PasswordChangeStarted => "password change started",
            AccessEvent::PasswordChanged => "password changed",
            AccessEvent::PasswordChangeAborted => "password change aborted",
        };
        f.write_str(s)
    }
}

/// Turns key presses into session changes and screen updates.
///
/// The session is always updated before anything is drawn, so a failing display can't leave it
/// half-way through a transition.
#[derive(Debug)]
pub struct InputStateMachine {
    session: Session,
    holds: HoldTiming,
}

impl InputStateMachine {
    pub fn new(password: u32, holds: HoldTiming) -> Self {
        InputStateMachine {
            session: Session::new(password),
            holds,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Shows the boot screen, then the password prompt.
    pub fn show_welcome(
        &self,
        display: &mut dyn DisplaySurface,
        delay: &dyn Delay,
    ) -> GpioResult<()> {
        display.clear()?;
        display.print(MSG_WELCOME)?;
        delay.delay(self.holds.welcome);
        Self::show_prompt(display)
    }

    /// Draws the prompt for the current mode, with the cursor where digits go.
    pub fn redraw(&self, display: &mut dyn DisplaySurface) -> GpioResult<()> {
        if self.session.mode().is_normal() {
            Self::show_prompt(display)
        } else {
            Self::show_new_password_prompt(display)
        }
    }

    fn show_prompt(display: &mut dyn DisplaySurface) -> GpioResult<()> {
        display.clear()?;
        display.print(PROMPT_PASSWORD)?;
        display.set_cursor(0, PROMPT_PASSWORD.len())
    }

    fn show_new_password_prompt(display: &mut dyn DisplaySurface) -> GpioResult<()> {
        display.clear()?;
        display.print(PROMPT_NEW_PASSWORD)?;
        display.set_cursor(1, 0)
    }

    /// Handles the key from one scan.
    ///
    /// Blocks for the configured hold times while a result message is shown.
    pub fn handle_key(
        &mut self,
        key: Option<KeypadKey>,
        display: &mut dyn DisplaySurface,
        delay: &dyn Delay,
    ) -> GpioResult<Option<AccessEvent>> {
        let Some(key) = key else {
            return Ok(None);
        };
        trace!(
            "Handling {:?} in {:?}, {} digits typed",
            key,
            self.session.mode(),
            self.session.digits(),
        );

        match (key, self.session.mode) {
            (KeypadKey::Digit(d), _) if d > 9 => {
                debug!("Ignoring invalid digit key {}.", d);
                Ok(None)
            }
            (KeypadKey::Digit(d), _) => {
                // Every digit is masked on screen, even the ones past the end of the entry.
                if !self.session.mode.accumulator_mut().push(d) {
                    debug!("Entry is full, digit not accumulated.");
                }
                display.print(MASK)?;
                Ok(None)
            }
            (KeypadKey::Hash, EntryMode::Normal { .. }) => {
                self.session.mode = EntryMode::changing_password();
                Self::show_new_password_prompt(display)?;
                Ok(Some(AccessEvent::PasswordChangeStarted))
            }
            (KeypadKey::Hash, EntryMode::ChangingPassword { new_pass }) => {
                self.session.mode = EntryMode::default();
                let event = if new_pass.is_empty() {
                    AccessEvent::PasswordChangeAborted
                } else {
                    self.session.password = new_pass.value();
                    debug!("New password is {}.", new_pass.value());
                    AccessEvent::PasswordChanged
                };

                if event == AccessEvent::PasswordChanged {
                    display.clear()?;
                    display.print(MSG_SAVED)?;
                    delay.delay(self.holds.saved);
                }
                Self::show_prompt(display)?;
                Ok(Some(event))
            }
            (KeypadKey::Star, EntryMode::Normal { input }) => {
                self.session.mode = EntryMode::default();
                let event = if !input.is_empty() && input.value() == self.session.password() {
                    self.session.door = self.session.door.toggled();
                    if self.session.door.is_open() {
                        AccessEvent::DoorOpened
                    } else {
                        AccessEvent::DoorClosed
                    }
                } else {
                    AccessEvent::WrongPassword
                };

                let message = match event {
                    AccessEvent::DoorOpened => MSG_OPEN,
                    AccessEvent::DoorClosed => MSG_CLOSED,
                    _ => MSG_WRONG,
                };
                display.set_cursor(1, 0)?;
                display.print(message)?;
                delay.delay(self.holds.result);
                Self::show_prompt(display)?;
                Ok(Some(event))
            }
            (KeypadKey::Star, EntryMode::ChangingPassword { .. }) => {
                debug!("Ignoring * while changing the password.");
                Ok(None)
            }
        }
    }
}
