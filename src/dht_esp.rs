//! `esp-hal` bindings for the driver's line and clock.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use esp_hal::gpio::{Flex, InputConfig, Level, Pull};
use esp_hal::time::Instant;

use crate::line::{Clock, DataLine, Direction};

/// A GPIO switched between open output and pulled-up input.
pub struct EspLine<'d> {
    pin: Flex<'d>,
}

impl<'d> EspLine<'d> {
    pub fn new(mut pin: Flex<'d>) -> Self {
        pin.apply_input_config(&InputConfig::default().with_pull(Pull::Up));
        pin.set_level(Level::High);
        EspLine { pin }
    }
}

impl ErrorType for EspLine<'_> {
    type Error = Infallible;
}

impl InputPin for EspLine<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.is_low())
    }
}

impl OutputPin for EspLine<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pin.set_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin.set_high();
        Ok(())
    }
}

impl DataLine for EspLine<'_> {
    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error> {
        match direction {
            Direction::Output => {
                self.pin.set_input_enable(false);
                self.pin.set_output_enable(true);
            }
            Direction::Input => {
                self.pin.set_output_enable(false);
                self.pin.set_input_enable(true);
            }
        }
        Ok(())
    }
}

/// Microsecond ticks from the esp-hal system timer.
#[derive(Clone, Copy, Default)]
pub struct EspClock;

impl Clock for EspClock {
    fn now(&self) -> u32 {
        // Truncation is fine, only wrapping deltas are used.
        Instant::now().duration_since_epoch().as_micros() as u32
    }

    fn ticks_to_micros(&self, ticks: u32) -> u32 {
        ticks
    }
}
