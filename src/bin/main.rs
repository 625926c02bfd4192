#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use defmt::{error, info, warn};
use dht11_pulse::dht_esp::{EspClock, EspLine};
use dht11_pulse::schedule::PollSchedule;
use dht11_pulse::{Dht11, Dht11Error, SensorReading, MAX_DECODE_STALL_US};
use embassy_executor::Spawner;
use embassy_sync::{blocking_mutex::raw::NoopRawMutex, channel::Channel};
use embassy_time::{Duration, Timer};
use esp_hal::{
    clock::CpuClock,
    delay::Delay,
    gpio::{AnyPin, Flex, Level, Output, OutputConfig, Pin},
    timer::systimer::SystemTimer,
};
use {esp_backtrace as _, esp_println as _};

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

type ReadingChannel = Channel<NoopRawMutex, Result<SensorReading, Dht11Error>, 1>;

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timer0 = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(timer0.alarm0);

    info!("Embassy initialized!");

    let schedule = PollSchedule::from_env_values(
        option_env!("DHT11_WARMUP_MS"),
        option_env!("DHT11_POLL_INTERVAL_MS"),
        option_env!("DHT11_RETRY_DELAY_MS"),
    );
    info!("Poll schedule: {}", schedule);
    info!("DHT11 decode may hold interrupts off for up to {}us", MAX_DECODE_STALL_US);

    let reading_channel = &*mk_static!(ReadingChannel, Channel::new());

    // Heartbeat LED every 500ms
    let led = Output::new(peripherals.GPIO8, Level::High, OutputConfig::default());
    spawner.spawn(toggle(led)).ok();

    let dht_pin = peripherals.GPIO10.degrade();
    spawner.spawn(dht_task(dht_pin, schedule, reading_channel)).ok();

    spawner.spawn(report_task(reading_channel)).ok();
}

#[embassy_executor::task]
async fn toggle(mut led: Output<'static>) {
    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}

#[embassy_executor::task]
async fn dht_task(
    pin: AnyPin<'static>,
    schedule: PollSchedule,
    reading_channel: &'static ReadingChannel,
) {
    info!("Starting DHT11 task");
    let dht = Dht11::new(EspLine::new(Flex::new(pin)), EspClock, Delay::new());

    if let Err(e) = dht.initialize() {
        error!("DHT11 initialization failed: {}", e);
        return;
    }

    Timer::after(Duration::from_millis(schedule.warmup_ms)).await;

    loop {
        let result = dht.acquire_reading();
        let wait_ms = schedule.next_delay_ms(&result);
        reading_channel.send(result).await;
        Timer::after(Duration::from_millis(wait_ms)).await;
    }
}

#[embassy_executor::task]
async fn report_task(reading_channel: &'static ReadingChannel) {
    loop {
        match reading_channel.receive().await {
            Ok(reading) => info!(
                "RH={}.{}% T={}.{}C parity={}",
                reading.humidity_integer,
                reading.humidity_fraction,
                reading.temperature_integer,
                reading.temperature_fraction,
                reading.checksum
            ),
            Err(e) if e.is_retryable() => warn!("DHT11 read failed, retrying: {}", e),
            Err(e) => error!("DHT11 read failed: {}", e),
        }
    }
}
