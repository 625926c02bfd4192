use crate::{Dht11Error, NUM_DATA_BITS};

/// The 40 bits of one transmission, in the order they arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitStream([bool; NUM_DATA_BITS]);

impl BitStream {
    pub const fn new(bits: [bool; NUM_DATA_BITS]) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> &[bool; NUM_DATA_BITS] {
        &self.0
    }

    pub(crate) fn bits_mut(&mut self) -> &mut [bool; NUM_DATA_BITS] {
        &mut self.0
    }

    /// Splits the stream into its five bytes, MSB first within each byte.
    pub fn to_frame(&self) -> [u8; 5] {
        let mut frame = [0u8; 5];
        for (i, byte) in frame.iter_mut().enumerate() {
            let mut group = [false; 8];
            group.copy_from_slice(&self.0[i * 8..i * 8 + 8]);
            *byte = pack_bits(&group);
        }
        frame
    }
}

impl Default for BitStream {
    fn default() -> Self {
        Self([false; NUM_DATA_BITS])
    }
}

impl From<[u8; 5]> for BitStream {
    fn from(frame: [u8; 5]) -> Self {
        let mut bits = [false; NUM_DATA_BITS];
        for (i, bit) in bits.iter_mut().enumerate() {
            *bit = frame[i / 8] & (0x80 >> (i % 8)) != 0;
        }
        Self(bits)
    }
}

/// Packs eight bits into a byte, first bit most significant.
pub fn pack_bits(bits: &[bool; 8]) -> u8 {
    bits.iter()
        .fold(0u8, |byte, &bit| (byte << 1) | u8::from(bit))
}

/// A checksum-validated reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorReading {
    pub humidity_integer: u8,
    pub humidity_fraction: u8,
    pub temperature_integer: u8,
    pub temperature_fraction: u8,
    pub checksum: u8,
}

impl SensorReading {
    /// Builds a reading from the five raw bytes, rejecting it when the
    /// checksum is not the modulo-256 sum of the four data bytes.
    pub fn from_frame(frame: [u8; 5]) -> Result<Self, Dht11Error> {
        let [humidity_integer, humidity_fraction, temperature_integer, temperature_fraction, checksum] =
            frame;
        let sum = humidity_integer
            .wrapping_add(humidity_fraction)
            .wrapping_add(temperature_integer)
            .wrapping_add(temperature_fraction);

        if sum != checksum {
            warn!("parity mismatch: expected {=u8}, received {=u8}", sum, checksum);
            return Err(Dht11Error::ParityCheckFailed);
        }

        Ok(Self {
            humidity_integer,
            humidity_fraction,
            temperature_integer,
            temperature_fraction,
            checksum,
        })
    }

    pub fn from_bits(bits: &BitStream) -> Result<Self, Dht11Error> {
        Self::from_frame(bits.to_frame())
    }

    pub fn frame(&self) -> [u8; 5] {
        [
            self.humidity_integer,
            self.humidity_fraction,
            self.temperature_integer,
            self.temperature_fraction,
            self.checksum,
        ]
    }

    /// Relative humidity in percent.
    pub fn humidity_percent(&self) -> f32 {
        f32::from(self.humidity_integer) + f32::from(self.humidity_fraction) / 10.0
    }

    /// Temperature in degrees Celsius. Bit 7 of the fraction byte flags a
    /// negative value on sensor revisions that can measure below zero.
    pub fn temperature_celsius(&self) -> f32 {
        let magnitude = f32::from(self.temperature_integer)
            + f32::from(self.temperature_fraction & 0x7F) / 10.0;
        if self.temperature_fraction & 0x80 != 0 {
            -magnitude
        } else {
            magnitude
        }
    }
}
