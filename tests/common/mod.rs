//! Simulated DHT11 on a virtual microsecond timeline.
//!
//! The clock advances 1 µs every time the driver samples it and the delay
//! advances it by the requested amount. Once the driver releases the line,
//! its level follows a [`Waveform`] measured from the moment of release.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use dht11_pulse::{Clock, DataLine, Direction};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

/// Width of the sensor's pull-up gap, response low and preamble high.
pub const PULL_UP_US: u32 = 30;
pub const RESPONSE_LOW_US: u32 = 80;
pub const PREAMBLE_HIGH_US: u32 = 80;

const BIT_LOW_US: u32 = 50;
const ZERO_HIGH_US: u32 = 27;
const ONE_HIGH_US: u32 = 70;

/// Line levels the sensor drives after release, then the level it rests at.
#[derive(Debug, Clone)]
pub struct Waveform {
    segments: Vec<(bool, u32)>,
    tail_high: bool,
}

impl Waveform {
    fn preamble(preamble_high_us: u32) -> Self {
        Waveform {
            segments: vec![
                (true, PULL_UP_US),
                (false, RESPONSE_LOW_US),
                (true, preamble_high_us),
            ],
            tail_high: true,
        }
    }

    /// A full, well-formed transmission of `frame`.
    pub fn from_frame(frame: [u8; 5]) -> Self {
        Self::with_preamble(frame, PREAMBLE_HIGH_US)
    }

    pub fn with_preamble(frame: [u8; 5], preamble_high_us: u32) -> Self {
        let mut waveform = Self::preamble(preamble_high_us);
        for byte in frame {
            for shift in (0..8).rev() {
                let high_us = if (byte >> shift) & 1 == 1 {
                    ONE_HIGH_US
                } else {
                    ZERO_HIGH_US
                };
                waveform.segments.push((false, BIT_LOW_US));
                waveform.segments.push((true, high_us));
            }
        }
        waveform.segments.push((false, BIT_LOW_US));
        waveform
    }

    /// A valid preamble after which the sensor holds the line at one level.
    pub fn stuck_after_preamble(high: bool) -> Self {
        let mut waveform = Self::preamble(PREAMBLE_HIGH_US);
        if high {
            // First bit boundary, then a high phase that never ends.
            waveform.segments.push((false, BIT_LOW_US));
        }
        waveform.tail_high = high;
        waveform
    }

    /// No response at all: the pull-up keeps the line high.
    pub fn silent() -> Self {
        Waveform {
            segments: Vec::new(),
            tail_high: true,
        }
    }

    /// Combined length of the pull-up gap and preamble.
    pub fn preamble_len_us(&self) -> u32 {
        self.segments.iter().take(3).map(|(_, us)| us).sum()
    }

    fn level_at(&self, since_release_us: u32) -> bool {
        let mut end = 0;
        for &(high, us) in &self.segments {
            end += us;
            if since_release_us < end {
                return high;
            }
        }
        self.tail_high
    }
}

struct Shared {
    now_us: AtomicU32,
    now_calls: AtomicUsize,
    reads: AtomicUsize,
    released: AtomicBool,
    released_at: AtomicU32,
    released_at_calls: AtomicUsize,
    driven_high: AtomicBool,
    ready: AtomicBool,
    reject_direction: AtomicBool,
    waveform: Mutex<Waveform>,
    start_signal_hook: Mutex<Option<Arc<Barrier>>>,
}

/// Handle to one simulated sensor; hands out the driver's line, clock and
/// delay, all sharing the same timeline.
#[derive(Clone)]
pub struct SimSensor {
    shared: Arc<Shared>,
}

impl SimSensor {
    pub fn new(waveform: Waveform) -> Self {
        SimSensor {
            shared: Arc::new(Shared {
                now_us: AtomicU32::new(0),
                now_calls: AtomicUsize::new(0),
                reads: AtomicUsize::new(0),
                released: AtomicBool::new(false),
                released_at: AtomicU32::new(0),
                released_at_calls: AtomicUsize::new(0),
                driven_high: AtomicBool::new(true),
                ready: AtomicBool::new(true),
                reject_direction: AtomicBool::new(false),
                waveform: Mutex::new(waveform),
                start_signal_hook: Mutex::new(None),
            }),
        }
    }

    pub fn line(&self) -> SimLine {
        SimLine {
            shared: self.shared.clone(),
        }
    }

    pub fn clock(&self) -> SimClock {
        SimClock {
            shared: self.shared.clone(),
        }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay {
            shared: self.shared.clone(),
        }
    }

    pub fn set_waveform(&self, waveform: Waveform) {
        *self.shared.waveform.lock().unwrap() = waveform;
    }

    pub fn set_ready(&self, ready: bool) {
        self.shared.ready.store(ready, Ordering::SeqCst);
    }

    pub fn reject_direction_changes(&self, reject: bool) {
        self.shared.reject_direction.store(reject, Ordering::SeqCst);
    }

    /// The next start signal waits on `barrier` twice: once to announce the
    /// acquisition is in flight, once to be let go.
    pub fn park_next_start_signal(&self, barrier: Arc<Barrier>) {
        *self.shared.start_signal_hook.lock().unwrap() = Some(barrier);
    }

    /// Clock samples taken since the line was last released to the sensor.
    pub fn clock_calls_since_release(&self) -> usize {
        self.shared.now_calls.load(Ordering::SeqCst)
            - self.shared.released_at_calls.load(Ordering::SeqCst)
    }

    pub fn line_reads(&self) -> usize {
        self.shared.reads.load(Ordering::SeqCst)
    }
}

pub struct SimLine {
    shared: Arc<Shared>,
}

impl ErrorType for SimLine {
    type Error = Rejected;
}

impl InputPin for SimLine {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let s = &self.shared;
        s.reads.fetch_add(1, Ordering::SeqCst);
        if !s.released.load(Ordering::SeqCst) {
            return Ok(s.driven_high.load(Ordering::SeqCst));
        }
        let since = s
            .now_us
            .load(Ordering::SeqCst)
            .wrapping_sub(s.released_at.load(Ordering::SeqCst));
        Ok(s.waveform.lock().unwrap().level_at(since))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

impl OutputPin for SimLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.shared.driven_high.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.shared.driven_high.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Error returned for a refused direction change.
#[derive(Debug)]
pub struct Rejected;

impl embedded_hal::digital::Error for Rejected {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl DataLine for SimLine {
    fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error> {
        let s = &self.shared;
        if s.reject_direction.load(Ordering::SeqCst) {
            return Err(Rejected);
        }
        match direction {
            Direction::Output => s.released.store(false, Ordering::SeqCst),
            Direction::Input => {
                s.released_at
                    .store(s.now_us.load(Ordering::SeqCst), Ordering::SeqCst);
                s.released_at_calls
                    .store(s.now_calls.load(Ordering::SeqCst), Ordering::SeqCst);
                s.released.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

pub struct SimClock {
    shared: Arc<Shared>,
}

impl Clock for SimClock {
    fn now(&self) -> u32 {
        self.shared.now_calls.fetch_add(1, Ordering::SeqCst);
        self.shared
            .now_us
            .fetch_add(1, Ordering::SeqCst)
            .wrapping_add(1)
    }

    fn ticks_to_micros(&self, ticks: u32) -> u32 {
        ticks
    }
}

pub struct SimDelay {
    shared: Arc<Shared>,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.shared
            .now_us
            .fetch_add(ns.div_ceil(1_000), Ordering::SeqCst);
    }

    fn delay_ms(&mut self, ms: u32) {
        let hook = self.shared.start_signal_hook.lock().unwrap().take();
        if let Some(barrier) = hook {
            barrier.wait();
            barrier.wait();
        }
        self.shared
            .now_us
            .fetch_add(ms.saturating_mul(1_000), Ordering::SeqCst);
    }
}
