//! The module for the main loop of the lock: scanning, handling keys and driving the door.

use log::{debug, info, warn};
use keylock_gpio::{Delay, GpioOutput, GpioResult};
use keylock_gpio::keypad::{Keypad, KeypadKey};
use crate::config::Config;
use crate::display::DisplaySurface;
use crate::machine::{AccessEvent, InputStateMachine};
use crate::session::DoorState;

/// What happened during one [App::update].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Cycle {
    /// No key was pressed.
    Idle,
    /// A key was pressed and handled.
    Key {
        key: KeypadKey,
        event: Option<AccessEvent>,
    },
}

/// The main app struct, tying the keypad, the display and the door output together.
pub struct App<'a> {
    machine: InputStateMachine,
    keypad: &'a dyn Keypad<Key = KeypadKey>,
    display: &'a mut dyn DisplaySurface,
    delay: &'a dyn Delay,
    /// The output driving the door latch, if there is one.
    door_pin: Option<&'a dyn GpioOutput>,
    /// The door state last written to `door_pin`.
    door_written: Option<DoorState>,
}

impl<'a> App<'a> {
    pub fn new(
        config: &Config,
        keypad: &'a dyn Keypad<Key = KeypadKey>,
        display: &'a mut dyn DisplaySurface,
        delay: &'a dyn Delay,
    ) -> App<'a> {
        App {
            machine: InputStateMachine::new(config.password, config.hold_timing()),
            keypad,
            display,
            delay,
            door_pin: None,
            door_written: None,
        }
    }

    pub fn with_door_pin(mut self, door_pin: Option<&'a dyn GpioOutput>) -> Self {
        self.door_pin = door_pin;
        self
    }

    pub fn machine(&self) -> &InputStateMachine {
        &self.machine
    }

    /// Shows the boot screen and puts the door output in its initial state.
    pub fn start(&mut self) -> GpioResult<()> {
        info!("Showing welcome screen.");
        self.machine.show_welcome(self.display, self.delay)?;
        self.sync_door()
    }

    /// Runs one scan and handles the key, if any. Blocks while a key is held and while messages
    /// are shown.
    ///
    /// If drawing fails half-way, the prompt is redrawn so the screen matches the session again.
    pub fn update(&mut self) -> GpioResult<Cycle> {
        let Some(key) = self.keypad.scan()? else {
            return Ok(Cycle::Idle);
        };

        let result = self.machine.handle_key(Some(key), self.display, self.delay);
        if let Err(e) = &result {
            warn!("Failed to handle {:?}: {}. Redrawing.", key, e);
            if let Err(e) = self.machine.redraw(self.display) {
                warn!("Failed to redraw: {}", e);
            }
        }

        let synced = self.sync_door();
        let event = result?;
        synced?;
        Ok(Cycle::Key { key, event })
    }

    /// Writes the door state to the door output if it changed since the last write.
    fn sync_door(&mut self) -> GpioResult<()> {
        let Some(pin) = self.door_pin else {
            return Ok(());
        };

        let door = self.machine.session().door();
        if self.door_written == Some(door) {
            return Ok(());
        }

        debug!("Setting door output to {:?}.", door);
        pin.write(door.is_open())?;
        self.door_written = Some(door);
        Ok(())
    }
}
