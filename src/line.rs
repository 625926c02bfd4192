use embedded_hal::digital::{InputPin, OutputPin};

/// Direction of the shared data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// MCU drives the line.
    Output,
    /// Line released to the pull-up; the sensor drives it.
    Input,
}

/// The single GPIO the sensor hangs off.
///
/// Level reads and writes come from `embedded-hal`; this adds what those
/// traits leave out: a readiness check and switching direction at runtime.
pub trait DataLine: InputPin + OutputPin {
    /// Whether the underlying peripheral is usable at all.
    fn is_ready(&self) -> bool {
        true
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error>;
}

/// Free-running tick counter used to time pulse widths.
///
/// The counter may wrap at any point during an acquisition; the driver only
/// ever looks at wrapping differences between two samples.
pub trait Clock {
    fn now(&self) -> u32;

    /// Converts a tick delta into microseconds, rounding up.
    fn ticks_to_micros(&self, ticks: u32) -> u32;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> u32 {
        (**self).now()
    }

    fn ticks_to_micros(&self, ticks: u32) -> u32 {
        (**self).ticks_to_micros(ticks)
    }
}
