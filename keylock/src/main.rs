mod app;
mod config;
mod display;
mod machine;
mod session;
mod utils;

use std::env::var;
use std::io::BufRead;
use dotenv::dotenv;
use eyre::WrapErr;
use log::{debug, info, warn};
use sysinfo::System;
use time::OffsetDateTime;
use keylock_gpio::{GpioDriver, GpioResult, ThreadDelay};
use keylock_gpio::GpioActiveLevel::Low;
use keylock_gpio::GpioBias::PullUp;
use keylock_gpio::GpioDriveMode::OpenDrain;
use keylock_gpio::gpiod::GpiodDriver;
use keylock_gpio::keypad::MatrixKeypad;
use keylock_gpio::lcd::hd44780::{GpioHD44780Driver, HD44780Driver};
use keylock_gpio::sim::SimMatrix;
use crate::app::{App, Cycle};
use crate::config::Config;
use crate::display::TerminalDisplay;
use crate::machine::AccessEvent;
use crate::utils::parse_pin_bus;

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    info!("KeyLock v{} starting...", env!("CARGO_PKG_VERSION"));
    log_system_info();

    debug!("Trying to load config from {}...", Config::path().display());
    let config = match Config::try_load()? {
        Some(config) => {
            info!("Config loaded.");
            config
        }
        None => {
            info!("Config not found. Using default.");
            let config = Config::default();
            match config.save() {
                Ok(()) => info!("Default config saved."),
                Err(e) => warn!("Couldn't save default config: {}", e),
            }
            config
        }
    };
    debug!("Password is {}.", config.password);

    let backend = var("KEYLOCK_BACKEND").unwrap_or_else(|_| "gpiod".to_string());
    match backend.as_str() {
        "gpiod" => run_gpiod(&config),
        "sim" => run_sim(&config),
        other => Err(eyre::eyre!("Unknown backend {:?}, expected \"gpiod\" or \"sim\"", other)),
    }
}

fn log_system_info() {
    const UNKNOWN_STR: &str = "???";

    info!(
        "Running on {} {} (kernel {})",
        System::name().as_deref().unwrap_or(UNKNOWN_STR),
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!(
        "Hostname {}, architecture {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::cpu_arch(),
    );
}

fn env_pin(name: &str) -> eyre::Result<usize> {
    let value = var(name).wrap_err_with(|| format!("{} is not set", name))?;
    value
        .trim()
        .parse()
        .wrap_err_with(|| format!("{} is not a pin number: {:?}", name, value))
}

fn env_pin_bus<const N: usize>(name: &str) -> eyre::Result<[usize; N]> {
    let value = var(name).wrap_err_with(|| format!("{} is not set", name))?;
    parse_pin_bus(&value).wrap_err_with(|| format!("{} is invalid", name))
}

fn run_gpiod(config: &Config) -> eyre::Result<()> {
    let chip = var("KEYLOCK_GPIO_CHIP").unwrap_or_else(|_| "gpiochip0".to_string());

    let lcd_e_pin_no = env_pin("KEYLOCK_LCD_PIN_E")?;
    let lcd_rs_pin_no = env_pin("KEYLOCK_LCD_PIN_RS")?;
    let lcd_data_pin_nos: [usize; 4] = env_pin_bus("KEYLOCK_LCD_PINS_DATA")?;
    let keypad_row_pin_nos: [usize; 4] = env_pin_bus("KEYLOCK_KEYPAD_PINS_ROWS")?;
    let keypad_col_pin_nos: [usize; 3] = env_pin_bus("KEYLOCK_KEYPAD_PINS_COLS")?;
    let door_pin_no = match var("KEYLOCK_DOOR_PIN") {
        Ok(_) => Some(env_pin("KEYLOCK_DOOR_PIN")?),
        Err(_) => None,
    };

    info!("LCD @ E: {}, RS: {}, Data: {:?}", lcd_e_pin_no, lcd_rs_pin_no, lcd_data_pin_nos);
    info!("Keypad @ Rows: {:?}, Cols: {:?}", keypad_row_pin_nos, keypad_col_pin_nos);
    match door_pin_no {
        Some(pin) => info!("Door @ {}", pin),
        None => info!("No door pin configured."),
    }

    debug!("Initializing GPIO driver...");
    let gpio = GpiodDriver::open(&chip)?;
    debug!("{:?} initialized.", gpio);

    let delay = ThreadDelay;

    debug!("Initializing LCD driver...");
    let mut lcd_e_pin = gpio.get_pin(lcd_e_pin_no)?;
    let lcd_e_out = lcd_e_pin.as_output()?;
    let mut lcd_rs_pin = gpio.get_pin(lcd_rs_pin_no)?;
    let lcd_rs_out = lcd_rs_pin.as_output()?;
    let mut lcd_data_bus = gpio.get_pin_bus(lcd_data_pin_nos)?;
    let lcd_data_out = lcd_data_bus.as_output()?;
    let mut lcd = GpioHD44780Driver::new_4bit(&*lcd_e_out, &*lcd_rs_out, &*lcd_data_out, &delay);
    lcd.init()?;
    debug!("{:?} initialized.", lcd);

    debug!("Initializing keypad driver...");
    let mut keypad_row_bus = gpio.get_pin_bus(keypad_row_pin_nos)?;
    let mut keypad_col_bus = gpio.get_pin_bus(keypad_col_pin_nos)?;
    keypad_row_bus.set_drive_mode(OpenDrain)?;
    keypad_row_bus.set_active_level(Low)?;
    keypad_col_bus.set_bias(PullUp)?;
    keypad_col_bus.set_active_level(Low)?;
    let keypad_row_out = keypad_row_bus.as_output()?;
    let keypad_col_in = keypad_col_bus.as_input()?;
    let keypad = MatrixKeypad::new(&*keypad_row_out, &*keypad_col_in, &delay)
        .with_timing(config.scan_timing());
    debug!("{:?} initialized.", keypad);

    let mut door_pin = door_pin_no.map(|pin| gpio.get_pin(pin)).transpose()?;
    let door_out = match door_pin.as_mut() {
        Some(pin) => Some(pin.as_output()?),
        None => None,
    };

    let mut app = App::new(config, &keypad, &mut lcd, &delay).with_door_pin(door_out.as_deref());

    info!("KeyLock initialized.");
    start(&mut app);

    info!("Starting main loop...");
    loop {
        report(app.update());
    }
}

fn run_sim(config: &Config) -> eyre::Result<()> {
    info!("Running on the simulated keypad. Type keys (0-9, * and #) and press enter.");

    let matrix = SimMatrix::new();
    let delay = ThreadDelay;
    let keypad = MatrixKeypad::new(matrix.rows(), matrix.cols(), &delay)
        .with_timing(config.scan_timing());
    let mut display = TerminalDisplay::new(std::io::stdout());

    let mut app = App::new(config, &keypad, &mut display, &delay);
    start(&mut app);

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let queued = matrix.type_str(&line);
        debug!("Queued {} key presses.", queued);
        while !matrix.is_idle() {
            report(app.update());
        }
    }

    info!("End of input, stopping. The door was left {:?}.", app.machine().session().door());
    Ok(())
}

fn start(app: &mut App) {
    if let Err(e) = app.start() {
        warn!("Failed to start up cleanly: {}", e);
    }
}

/// Logs the outcome of a loop step. Errors are only logged, the loop goes on.
fn report(result: GpioResult<Cycle>) {
    match result {
        Ok(Cycle::Key { event: Some(event), .. }) => log_event(event),
        Ok(_) => {}
        Err(e) => warn!("GPIO error: {}", e),
    }
}

fn log_event(event: AccessEvent) {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    match event {
        AccessEvent::WrongPassword => warn!("[{}] {}", now, event),
        _ => info!("[{}] {}", now, event),
    }
}
