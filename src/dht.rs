use core::sync::atomic::{AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;

use crate::frame::{BitStream, SensorReading};
use crate::line::{Clock, DataLine, Direction};
use crate::{
    Dht11Error, BIT_HIGH_TIMEOUT_US, BIT_LOW_TIMEOUT_US, HIGH_BIT_THRESHOLD_US, MAX_POLL_SPINS,
    PREAMBLE_HIGH_MIN_US, PREAMBLE_PHASE_TIMEOUT_US, RESPONSE_TIMEOUT_US, START_SIGNAL_MS,
};

/// Where the driver is in its acquisition cycle.
///
/// `Handshaking` and `Decoding` are only observable while an acquisition is
/// in flight; every call ends back in `Configured`, whatever its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DriverState {
    Idle = 0,
    Configured,
    Handshaking,
    Decoding,
}

impl DriverState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => DriverState::Configured,
            2 => DriverState::Handshaking,
            3 => DriverState::Decoding,
            _ => DriverState::Idle,
        }
    }
}

/// DHT11 driver owning its data line, tick clock and delay provider.
///
/// Acquisitions take `&self`: the hardware sits behind a mutex that is only
/// ever `try_lock`ed, so a second caller gets [`Dht11Error::Busy`] instead of
/// interleaving with the one in flight.
pub struct Dht11<L, C, D> {
    hw: Mutex<CriticalSectionRawMutex, Hardware<L, C, D>>,
    state: AtomicU8,
}

struct Hardware<L, C, D> {
    line: L,
    clock: C,
    delay: D,
}

/// Timestamps around one observed level change.
#[derive(Debug, Clone, Copy)]
struct Edge {
    /// Last sample still at the previous level.
    last_seen: u32,
    /// First sample at the awaited level.
    observed: u32,
}

/// Width of one bit's high phase. Never leaves the decode loop.
#[derive(Debug, Clone, Copy)]
struct PulseMeasurement {
    duration_us: u32,
}

impl<L, C, D> Dht11<L, C, D>
where
    L: DataLine,
    C: Clock,
    D: DelayNs,
{
    pub fn new(line: L, clock: C, delay: D) -> Self {
        Dht11 {
            hw: Mutex::new(Hardware { line, clock, delay }),
            state: AtomicU8::new(DriverState::Idle as u8),
        }
    }

    pub fn state(&self) -> DriverState {
        DriverState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: DriverState) {
        trace!("dht11 state -> {}", state);
        self.state.store(state as u8, Ordering::Release);
    }

    /// Checks the line is usable and releases it to the pull-up so the sensor
    /// idles high. Moves the driver from `Idle` to `Configured`.
    pub fn initialize(&self) -> Result<(), Dht11Error> {
        let mut hw = self.hw.try_lock().map_err(|_| Dht11Error::Busy)?;
        if !hw.line.is_ready() {
            warn!("dht11 data line not ready");
            return Err(Dht11Error::ConfigFailure);
        }
        hw.line
            .set_direction(Direction::Input)
            .map_err(|_| Dht11Error::ConfigFailure)?;
        self.set_state(DriverState::Configured);
        Ok(())
    }

    /// Runs one complete acquisition: start signal, preamble check, 40-bit
    /// decode and checksum validation.
    ///
    /// Blocks for roughly [`START_SIGNAL_MS`] plus up to
    /// [`MAX_DECODE_STALL_US`](crate::MAX_DECODE_STALL_US) with interrupts
    /// disabled. No retry happens here; back off and call again.
    pub fn acquire_reading(&self) -> Result<SensorReading, Dht11Error> {
        let mut hw = self.hw.try_lock().map_err(|_| Dht11Error::Busy)?;
        if self.state() == DriverState::Idle {
            return Err(Dht11Error::ConfigFailure);
        }

        self.set_state(DriverState::Handshaking);
        let result = self.run_acquisition(&mut hw);
        self.set_state(DriverState::Configured);
        result
    }

    fn run_acquisition(&self, hw: &mut Hardware<L, C, D>) -> Result<SensorReading, Dht11Error> {
        hw.start_conversion()?;
        hw.await_preamble()?;

        self.set_state(DriverState::Decoding);
        let bits = hw.decode_bits()?;
        SensorReading::from_bits(&bits)
    }

    /// Gives back the line, clock and delay.
    pub fn release(self) -> (L, C, D) {
        let hw = self.hw.into_inner();
        (hw.line, hw.clock, hw.delay)
    }
}

impl<L, C, D> Hardware<L, C, D>
where
    L: DataLine,
    C: Clock,
    D: DelayNs,
{
    /// Holds the line low for the start signal, then hands it to the sensor.
    fn start_conversion(&mut self) -> Result<(), Dht11Error> {
        self.line
            .set_direction(Direction::Output)
            .map_err(|_| Dht11Error::ConfigFailure)?;
        self.line.set_low().map_err(|_| Dht11Error::ConfigFailure)?;

        self.delay.delay_ms(START_SIGNAL_MS);

        // The pull-up takes the line high once it is released.
        self.line
            .set_direction(Direction::Input)
            .map_err(|_| Dht11Error::ConfigFailure)?;
        Ok(())
    }

    /// Waits out the sensor's response low and checks the high phase that
    /// follows is long enough to be a real preamble.
    fn await_preamble(&mut self) -> Result<(), Dht11Error> {
        self.wait_for(PinState::Low, RESPONSE_TIMEOUT_US)
            .map_err(silent_sensor)?;
        let rise = self
            .wait_for(PinState::High, PREAMBLE_PHASE_TIMEOUT_US)
            .map_err(silent_sensor)?;
        let fall = self
            .wait_for(PinState::Low, PREAMBLE_PHASE_TIMEOUT_US)
            .map_err(silent_sensor)?;

        // First high sample to first low sample: the 80 us floor is strict.
        let high_us = self
            .clock
            .ticks_to_micros(fall.observed.wrapping_sub(rise.observed));
        debug!("dht11 preamble high {=u32}us", high_us);

        if high_us < PREAMBLE_HIGH_MIN_US {
            warn!("dht11 preamble too short: {=u32}us", high_us);
            return Err(Dht11Error::SetupFailed);
        }
        Ok(())
    }

    /// Classifies all 40 bits with interrupts disabled.
    fn decode_bits(&mut self) -> Result<BitStream, Dht11Error> {
        let mut bits = BitStream::default();

        critical_section::with(|_cs| {
            for bit in bits.bits_mut().iter_mut() {
                let pulse = self.measure_high_pulse()?;
                *bit = pulse.duration_us > HIGH_BIT_THRESHOLD_US;
            }
            Ok::<(), Dht11Error>(())
        })?;

        Ok(bits)
    }

    fn measure_high_pulse(&mut self) -> Result<PulseMeasurement, Dht11Error> {
        // The low phase only marks the bit boundary.
        let rise = self
            .wait_for(PinState::High, BIT_LOW_TIMEOUT_US)
            .inspect_err(|_| warn!("dht11 timeout in bit low phase"))?;
        let fall = self
            .wait_for(PinState::Low, BIT_HIGH_TIMEOUT_US)
            .inspect_err(|_| warn!("dht11 timeout in bit high phase"))?;

        Ok(PulseMeasurement {
            duration_us: self
                .clock
                .ticks_to_micros(fall.observed.wrapping_sub(rise.last_seen)),
        })
    }

    /// Polls until the line reaches `level`, giving up after `timeout_us` of
    /// clock time or [`MAX_POLL_SPINS`] polls, whichever comes first.
    fn wait_for(&mut self, level: PinState, timeout_us: u32) -> Result<Edge, Dht11Error> {
        let start = self.clock.now();
        let mut last_seen = start;

        for _ in 0..MAX_POLL_SPINS {
            let now = self.clock.now();
            if self.read_level()? == level {
                return Ok(Edge {
                    last_seen,
                    observed: now,
                });
            }
            if self.clock.ticks_to_micros(now.wrapping_sub(start)) > timeout_us {
                return Err(Dht11Error::Timeout);
            }
            last_seen = now;
        }

        Err(Dht11Error::Timeout)
    }

    fn read_level(&mut self) -> Result<PinState, Dht11Error> {
        let high = self
            .line
            .is_high()
            .map_err(|_| Dht11Error::ConfigFailure)?;
        Ok(PinState::from(high))
    }
}

/// No edge during the handshake means the sensor never answered.
fn silent_sensor(err: Dht11Error) -> Dht11Error {
    match err {
        Dht11Error::Timeout => Dht11Error::SetupFailed,
        other => other,
    }
}
