//! [GpioDriver] over the Linux GPIO character device (`/dev/gpiochipN`), using the gpiod crate.
//!
//! Single pins are line groups of one, so pins and buses share the same implementation.
use crate::{
    GpioActiveLevel, GpioBias, GpioBus, GpioBusInput, GpioBusOutput, GpioConfigurable,
    GpioDriveMode, GpioDriver, GpioError, GpioInput, GpioOutput, GpioPin, GpioResult,
};
use bitvec::vec::BitVec;
use log::debug;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::sync::atomic::AtomicU8;

/// GPIO driver for one GPIO chip of the Linux character device interface.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_lines: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        Self {
            chip,
            used_lines: BitVec::repeat(false, n),
        }
    }

    /// Opens a chip by name (`gpiochip0`) or by path (`/dev/gpiochip0`).
    pub fn open(chip: &str) -> GpioResult<Self> {
        let path = if chip.contains('/') {
            PathBuf::from(chip)
        } else {
            PathBuf::from("/dev").join(chip)
        };
        let chip = gpiod::Chip::new(&path)?;
        debug!("Opened {} ({} lines).", chip.name(), chip.num_lines());
        Ok(Self::new(chip))
    }

    fn claim<const N: usize>(&self, indices: [usize; N]) -> GpioResult<GpiodLines<'_, N>> {
        let n = self.count()?;

        if indices.iter().any(|&index| index >= n) {
            return Err(GpioError::InvalidArgument);
        }
        for (i, index) in indices.iter().enumerate() {
            if indices[..i].contains(index) {
                return Err(GpioError::InvalidArgument);
            }
        }
        if indices.iter().any(|&index| self.used_lines[index]) {
            return Err(GpioError::AlreadyInUse);
        }

        for index in indices {
            self.used_lines.set_aliased(index, true);
        }

        Ok(GpiodLines {
            driver: self,
            indices,
            settings: LineSettings::default(),
        })
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        Ok(Box::new(self.claim([index])?))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        Ok(Box::new(self.claim(indices)?))
    }
}

impl From<GpioActiveLevel> for gpiod::Active {
    fn from(level: GpioActiveLevel) -> Self {
        match level {
            GpioActiveLevel::High => gpiod::Active::High,
            GpioActiveLevel::Low => gpiod::Active::Low,
        }
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

impl From<GpioDriveMode> for gpiod::Drive {
    fn from(mode: GpioDriveMode) -> Self {
        match mode {
            GpioDriveMode::PushPull => gpiod::Drive::PushPull,
            GpioDriveMode::OpenDrain => gpiod::Drive::OpenDrain,
            GpioDriveMode::OpenSource => gpiod::Drive::OpenSource,
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct LineSettings {
    active_level: GpioActiveLevel,
    bias: GpioBias,
    drive_mode: GpioDriveMode,
}

/// A group of claimed, not yet requested lines.
struct GpiodLines<'a, const N: usize> {
    driver: &'a GpiodDriver,
    indices: [usize; N],
    settings: LineSettings,
}

impl<const N: usize> GpiodLines<'_, N> {
    fn offsets(&self) -> Vec<u32> {
        self.indices.iter().map(|&index| index as u32).collect()
    }

    fn request_input(&self) -> GpioResult<GpiodInput<'_, N>> {
        let lines = self.driver.chip.request_lines(
            gpiod::Options::input(self.offsets())
                .consumer(env!("CARGO_PKG_NAME"))
                .active(self.settings.active_level.into())
                .bias(self.settings.bias.into()),
        )?;
        Ok(GpiodInput { owner: self, lines })
    }

    fn request_output(&self) -> GpioResult<GpiodOutput<'_, N>> {
        let lines = self.driver.chip.request_lines(
            gpiod::Options::output(self.offsets())
                .consumer(env!("CARGO_PKG_NAME"))
                .active(self.settings.active_level.into())
                .bias(self.settings.bias.into())
                .drive(self.settings.drive_mode.into()),
        )?;
        Ok(GpiodOutput { owner: self, lines })
    }
}

impl<const N: usize> Debug for GpiodLines<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.indices)
    }
}

impl<const N: usize> GpioConfigurable for GpiodLines<'_, N> {
    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.settings.active_level = level;
        Ok(())
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.settings.bias = bias;
        Ok(())
    }

    fn set_drive_mode(&mut self, mode: GpioDriveMode) -> GpioResult<()> {
        self.settings.drive_mode = mode;
        Ok(())
    }
}

impl GpioPin for GpiodLines<'_, 1> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        Ok(Box::new(self.request_input()?))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        Ok(Box::new(self.request_output()?))
    }
}

impl<const N: usize> GpioBus<N> for GpiodLines<'_, N> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>> {
        Ok(Box::new(self.request_input()?))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        Ok(Box::new(self.request_output()?))
    }
}

impl<const N: usize> Drop for GpiodLines<'_, N> {
    fn drop(&mut self) {
        for &index in &self.indices {
            self.driver.used_lines.set_aliased(index, false);
        }
    }
}

struct GpiodInput<'a, const N: usize> {
    owner: &'a GpiodLines<'a, N>,
    lines: gpiod::Lines<gpiod::Input>,
}

impl<const N: usize> Debug for GpiodInput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.owner)
    }
}

impl<const N: usize> GpioBusInput<N> for GpiodInput<'_, N> {
    fn read(&self) -> GpioResult<[bool; N]> {
        Ok(self.lines.get_values([false; N])?)
    }
}

impl GpioInput for GpiodInput<'_, 1> {
    fn read(&self) -> GpioResult<bool> {
        let [value] = self.lines.get_values([false])?;
        Ok(value)
    }
}

struct GpiodOutput<'a, const N: usize> {
    owner: &'a GpiodLines<'a, N>,
    lines: gpiod::Lines<gpiod::Output>,
}

impl<const N: usize> Debug for GpiodOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.owner)
    }
}

impl<const N: usize> GpioBusOutput<N> for GpiodOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        self.lines.set_values(*values)?;
        Ok(())
    }
}

impl GpioOutput for GpiodOutput<'_, 1> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.lines.set_values([value])?;
        Ok(())
    }
}
