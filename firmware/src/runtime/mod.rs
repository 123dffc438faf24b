use portable_atomic::{AtomicBool, Ordering};

use bridge_core::audio::{AudioConfig, AudioPipeline};
use bridge_core::bus::Bus;
use bridge_core::gain::GainTarget;
use bridge_core::power::{FatalCause, FatalLatch};
use bridge_core::settings::{MemorySettings, Settings};
use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_time::Instant;

use crate::hw::power::Supervisor;
use crate::hw::{Es8388, GpioLine, SpiAudioPort};
use crate::radio::RadioQueue;
use crate::status;
use crate::telemetry::{FirmwareInstant, FirmwareTelemetry};

mod audio_task;
mod call_task;
mod cell_task;
mod pots_task;
mod power_task;
mod voice_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

type TaskMutex = ThreadModeRawMutex;

pub(super) static BUS: Bus<TaskMutex> = Bus::new();
pub(super) static PIPELINE: AudioPipeline<TaskMutex> = AudioPipeline::new();
pub(super) static TELEMETRY: FirmwareTelemetry<TaskMutex> = FirmwareTelemetry::new();
pub(super) static RADIO_QUEUE: RadioQueue = RadioQueue::new();
pub(super) static FATAL: FatalLatch = FatalLatch::new();
/// Set once the codec is up; the audio task idles until then.
pub(super) static CODEC_READY: AtomicBool = AtomicBool::new(false);

const CODEC_I2C_HZ: u32 = 100_000;
const CODEC_SPI_HZ: u32 = 4_000_000;

pub(super) fn now() -> FirmwareInstant {
    FirmwareInstant::from(Instant::now())
}

pub(super) fn fail(cause: FatalCause) {
    if FATAL.latch(cause, &BUS) {
        TELEMETRY.fatal(cause, now());
    }
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let hal::Peripherals {
        PA0,
        PA1,
        PA2,
        PA3,
        PA4,
        PA5,
        PA6,
        PA9,
        PA10,
        PA11,
        PA12,
        PB0,
        PB1,
        PB8,
        PB9,
        I2C1,
        I2C2,
        SPI1,
        USART1,
        USART5,
        ..
    } = hal::init(hal::Config::default());

    // No storage backend yet; every boot starts from defaults.
    let settings = Settings::load(&MemorySettings::new());
    for target in [GainTarget::Mic, GainTarget::Speaker] {
        BUS.set_gain(target, settings.gain(target));
    }
    status::record_bonded(settings.paired.is_some());

    let line = GpioLine::new(
        Input::new(PA4, Pull::Up),
        Output::new(PA3, Level::Low, Speed::Low),
        Output::new(PA5, Level::High, Speed::Low),
    );

    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = Hertz(CODEC_I2C_HZ);
    let mut codec = Es8388::new(I2c::new_blocking(I2C1, PB8, PB9, i2c_config));
    if codec.init().is_ok() {
        CODEC_READY.store(true, Ordering::Release);
    } else {
        fail(FatalCause::AudioInit);
    }

    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(CODEC_SPI_HZ);
    let port = SpiAudioPort::new(Spi::new_blocking(SPI1, PA1, PA2, PA6, spi_config));

    let mut supervisor = Supervisor::new(I2c::new_blocking(I2C2, PA11, PA12, i2c::Config::default()));
    if !supervisor.identify() {
        fail(FatalCause::PowerInit);
    }

    spawner
        .spawn(pots_task::run(line, settings.country))
        .expect("failed to spawn POTS task");
    spawner
        .spawn(cell_task::run(USART5, PB0, PB1, settings.paired.is_some()))
        .expect("failed to spawn cellular task");
    spawner
        .spawn(voice_task::run(USART1, PA9, PA10))
        .expect("failed to spawn voice task");
    spawner
        .spawn(call_task::run(codec))
        .expect("failed to spawn call task");
    spawner
        .spawn(audio_task::run(port, AudioConfig::new()))
        .expect("failed to spawn audio task");
    spawner
        .spawn(power_task::run(supervisor, Input::new(PA0, Pull::Up)))
        .expect("failed to spawn power task");

    core::future::pending::<()>().await;
}
