pub mod gpiod;
pub mod keypad;
pub mod lcd;
pub mod sim;

use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("line already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// A source of GPIO lines, handing out single pins and fixed-width buses.
pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO lines available.
    fn count(&self) -> GpioResult<usize>;

    /// Gets the GPIO pin at the given index.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the index is out of range.
    /// - `GpioError::AlreadyInUse` if the line was already handed out.
    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>>;

    /// Gets a bus made of the GPIO lines at the given indices, in order.
    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>>;
}

/// Specifies the active level of a GPIO line.
///
/// Reads and writes through [GpioInput] and [GpioOutput] are logical: `true` means "active",
/// whatever electrical level that is.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default] High,
    Low,
}

/// Specifies the bias of a GPIO line (pull-up/pull-down resistors).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

/// Specifies how an output line is driven.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioDriveMode {
    /// Driven high or low with low impedance.
    #[default] PushPull,
    /// Driven low, or left floating when high.
    ///
    /// Used for keypad rows, so that two pressed keys in the same column can't short two outputs.
    OpenDrain,
    /// Driven high, or left floating when low.
    OpenSource,
}

/// Electrical configuration shared by single pins and buses.
///
/// Backends that can't honour a setting return `GpioError::NotSupported` from the setter.
pub trait GpioConfigurable {
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    fn set_bias(&mut self, _bias: GpioBias) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    fn set_drive_mode(&mut self, _mode: GpioDriveMode) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

pub trait GpioPin: GpioConfigurable + Debug {
    /// Requests the line as an input.
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>>;
    /// Requests the line as an output.
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>>;
}

pub trait GpioInput: Debug {
    /// Reads the logical state of the line.
    fn read(&self) -> GpioResult<bool>;
}

pub trait GpioOutput: Debug {
    /// Writes the logical state of the line.
    fn write(&self, value: bool) -> GpioResult<()>;
}

pub trait GpioBus<const N: usize>: GpioConfigurable + Debug {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>>;
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>>;
}

pub trait GpioBusInput<const N: usize>: Debug {
    fn read(&self) -> GpioResult<[bool; N]>;
}

pub trait GpioBusOutput<const N: usize>: Debug {
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;
}

impl dyn GpioBusOutput<4> + '_ {
    /// Writes the low 4 bits of `value` to the bus, LSb first.
    pub fn write_nibble(&self, value: u8) -> GpioResult<()> {
        if value > 0b1111 {
            return Err(GpioError::InvalidArgument);
        }

        let values = std::array::from_fn(|i| (value & (1 << i)) != 0);
        self.write(&values)
    }
}

/// A blocking wait.
///
/// Every timing in the scanner and the LCD driver goes through this, so the whole device can run
/// against a simulated clock.
pub trait Delay: Debug {
    fn delay(&self, duration: Duration);
}

/// [Delay] that puts the current thread to sleep.
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&self, duration: Duration) {
        if !duration.is_zero() {
            sleep(duration);
        }
    }
}
