//! Bit-width decoder for the DHT11 single-wire temperature/humidity sensor.
//!
//! The sensor answers an 18 ms low pulse with an 80 µs low / 80 µs high
//! preamble and then 40 data bits. Every bit starts with a ~50 µs low phase;
//! the width of the following high phase carries the value (~27 µs for 0,
//! ~70 µs for 1). The five received bytes are humidity integer/fraction,
//! temperature integer/fraction and a modulo-256 checksum.
//!
//! [`Dht11`] owns the line, the clock and the delay provider and runs one
//! synchronous acquisition per [`Dht11::acquire_reading`] call. The 40-bit
//! decode runs inside [`critical_section::with`], so the rest of the system
//! must tolerate a stall of up to [`MAX_DECODE_STALL_US`].
#![cfg_attr(not(test), no_std)]

// Must stay first so the macros are visible in the other modules.
#[macro_use]
mod fmt;

mod dht;
#[cfg(feature = "esp32c3")]
pub mod dht_esp;
mod frame;
mod line;
pub mod schedule;

pub use dht::{Dht11, DriverState};
pub use frame::{pack_bits, BitStream, SensorReading};
pub use line::{Clock, DataLine, Direction};

/// Every way an acquisition can fail. The kind is the whole diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dht11Error {
    /// The line could not be put into the requested mode, or the driver has
    /// not been initialized.
    ConfigFailure,
    /// The sensor did not answer the start signal with a valid preamble.
    SetupFailed,
    /// The received checksum does not match the four data bytes.
    ParityCheckFailed,
    /// A bounded wait for a line transition expired during bit decode.
    Timeout,
    /// Another acquisition is already in flight on this driver.
    Busy,
}

impl Dht11Error {
    /// Whether the caller may try again after its inter-attempt delay.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Dht11Error::SetupFailed | Dht11Error::ParityCheckFailed | Dht11Error::Timeout
        )
    }
}

impl core::fmt::Display for Dht11Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Dht11Error::ConfigFailure => write!(f, "data line could not be configured"),
            Dht11Error::SetupFailed => write!(f, "sensor preamble missing or too short"),
            Dht11Error::ParityCheckFailed => write!(f, "checksum byte does not match data"),
            Dht11Error::Timeout => write!(f, "timed out waiting for a line transition"),
            Dht11Error::Busy => write!(f, "acquisition already in progress"),
        }
    }
}

impl core::error::Error for Dht11Error {}

/// Time in ms the MCU holds the line low to request a conversion.
pub const START_SIGNAL_MS: u32 = 18;
/// Number of data bits in one transmission.
pub const NUM_DATA_BITS: usize = 40;
/// Minimum width of the preamble high phase.
pub const PREAMBLE_HIGH_MIN_US: u32 = 80;
/// High phases longer than this decode as a 1.
///
/// A 1 is ~70 µs and a 0 is 26-28 µs; the midpoint absorbs polling slop.
pub const HIGH_BIT_THRESHOLD_US: u32 = 50;

// Edge-wait bounds, from the worst-case protocol timing plus margin.
const RESPONSE_TIMEOUT_US: u32 = 200;
const PREAMBLE_PHASE_TIMEOUT_US: u32 = 200;
const BIT_LOW_TIMEOUT_US: u32 = 100;
const BIT_HIGH_TIMEOUT_US: u32 = 100;

/// Upper bound on polls per edge wait, in case the clock stops advancing.
pub const MAX_POLL_SPINS: u32 = 100_000;

/// Longest time the decode phase keeps interrupts disabled.
pub const MAX_DECODE_STALL_US: u32 =
    NUM_DATA_BITS as u32 * (BIT_LOW_TIMEOUT_US + BIT_HIGH_TIMEOUT_US);
