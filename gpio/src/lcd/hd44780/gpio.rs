use crate::lcd::hd44780::{CursorDirection, HD44780Driver};
use crate::{Delay, GpioBusOutput, GpioOutput, GpioResult};
use log::trace;
use std::time::Duration;

/// Time E is held high for a transfer.
const ENABLE_PULSE: Duration = Duration::from_micros(1);
/// Most instructions finish within 37 µs.
const COMMAND_DELAY: Duration = Duration::from_micros(50);
/// Clear display and return home take up to 1.52 ms.
const SLOW_COMMAND_DELAY: Duration = Duration::from_millis(2);
/// Wait after power-on before the controller accepts the wake-up sequence.
const POWER_ON_DELAY: Duration = Duration::from_millis(50);

/// HD44780 wired in 4-bit mode: RS, E and D4..D7, with R/W tied low.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a> {
    pin_e: &'a dyn GpioOutput,
    pin_rs: &'a dyn GpioOutput,
    data_bus: &'a dyn GpioBusOutput<4>,
    delay: &'a dyn Delay,
}

impl<'a> GpioHD44780Driver<'a> {
    /// Creates the driver. `data_bus` is D4..D7, LSb first.
    pub fn new_4bit(
        pin_e: &'a dyn GpioOutput,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a dyn GpioBusOutput<4>,
        delay: &'a dyn Delay,
    ) -> Self {
        GpioHD44780Driver {
            pin_e,
            pin_rs,
            data_bus,
            delay,
        }
    }

    fn pulse_e(&self) -> GpioResult<()> {
        self.pin_e.write(true)?;
        self.delay.delay(ENABLE_PULSE);
        self.pin_e.write(false)?;
        self.delay.delay(ENABLE_PULSE);
        Ok(())
    }

    fn write_nibble(&self, nibble: u8) -> GpioResult<()> {
        self.data_bus.write_nibble(nibble & 0x0F)?;
        self.pulse_e()
    }

    fn send(&self, byte: u8, rs: bool) -> GpioResult<()> {
        trace!("Sending {:08b}, RS: {}", byte, rs);

        self.pin_rs.write(rs)?;
        self.write_nibble(byte >> 4)?;
        self.write_nibble(byte)?;

        let is_slow = !rs && (byte == 0b0000_0001 || (byte & 0b1111_1110) == 0b0000_0010);
        self.delay.delay(if is_slow { SLOW_COMMAND_DELAY } else { COMMAND_DELAY });
        Ok(())
    }
}

impl HD44780Driver for GpioHD44780Driver<'_> {
    fn init(&mut self) -> GpioResult<()> {
        self.delay.delay(POWER_ON_DELAY);

        // The controller may be in either mode after reset, so force 8-bit first, then switch.
        self.pin_rs.write(false)?;
        self.write_nibble(0b0011)?;
        self.delay.delay(Duration::from_micros(4100));
        self.write_nibble(0b0011)?;
        self.delay.delay(Duration::from_micros(100));
        self.write_nibble(0b0011)?;
        self.delay.delay(COMMAND_DELAY);
        self.write_nibble(0b0010)?;
        self.delay.delay(COMMAND_DELAY);

        self.function_set(false, true, false)?;
        self.display_control(true, false, false)?;
        self.entry_mode(CursorDirection::Right, false)?;
        self.clear_display()
    }

    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, false)
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::InstantDelay;
    use std::cell::{Cell, RefCell};

    /// Latches the data bus on every falling edge of E, like the controller does.
    #[derive(Debug, Default)]
    struct Bench {
        e: Cell<bool>,
        rs: Cell<bool>,
        bus: Cell<u8>,
        latched: RefCell<Vec<(bool, u8)>>,
    }

    #[derive(Debug)]
    struct EPin<'a>(&'a Bench);
    #[derive(Debug)]
    struct RsPin<'a>(&'a Bench);
    #[derive(Debug)]
    struct DataBus<'a>(&'a Bench);

    impl GpioOutput for EPin<'_> {
        fn write(&self, value: bool) -> GpioResult<()> {
            if self.0.e.get() && !value {
                self.0.latched.borrow_mut().push((self.0.rs.get(), self.0.bus.get()));
            }
            self.0.e.set(value);
            Ok(())
        }
    }

    impl GpioOutput for RsPin<'_> {
        fn write(&self, value: bool) -> GpioResult<()> {
            self.0.rs.set(value);
            Ok(())
        }
    }

    impl GpioBusOutput<4> for DataBus<'_> {
        fn write(&self, values: &[bool; 4]) -> GpioResult<()> {
            let nibble = values.iter().rev().fold(0, |acc, &bit| (acc << 1) | bit as u8);
            self.0.bus.set(nibble);
            Ok(())
        }
    }

    #[test]
    fn bytes_are_sent_high_nibble_first() {
        let bench = Bench::default();
        let (e, rs, bus) = (EPin(&bench), RsPin(&bench), DataBus(&bench));
        let delay = InstantDelay::default();
        let mut lcd = GpioHD44780Driver::new_4bit(&e, &rs, &bus, &delay);

        lcd.send_data(b'W').unwrap();
        lcd.set_ddram_address(0x40).unwrap();

        assert_eq!(
            *bench.latched.borrow(),
            vec![(true, 0x5), (true, 0x7), (false, 0xC), (false, 0x0)],
        );
    }

    #[test]
    fn init_sequence() {
        let bench = Bench::default();
        let (e, rs, bus) = (EPin(&bench), RsPin(&bench), DataBus(&bench));
        let delay = InstantDelay::default();
        let mut lcd = GpioHD44780Driver::new_4bit(&e, &rs, &bus, &delay);

        lcd.init().unwrap();

        let nibbles: Vec<u8> = bench.latched.borrow().iter().map(|&(_, n)| n).collect();
        assert_eq!(
            nibbles,
            vec![0x3, 0x3, 0x3, 0x2, 0x2, 0x8, 0x0, 0xC, 0x0, 0x6, 0x0, 0x1],
        );
        assert!(bench.latched.borrow().iter().all(|&(rs, _)| !rs));
        assert!(delay.total() >= POWER_ON_DELAY + SLOW_COMMAND_DELAY);
    }
}
