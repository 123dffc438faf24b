use bridge_core::power::{PowerAction, PowerSupervisor};
use embassy_stm32::gpio::Input;
use embassy_time::{Duration, Ticker, Timer};

use super::{BUS, FATAL, TELEMETRY};
use crate::hw::power::Supervisor;

const POLL_INTERVAL_MS: u64 = 250;
/// Status dump period, in polls.
const DUMP_INTERVAL_POLLS: u32 = 120;
/// Time for the cellular task to disconnect before power is cut.
const POWER_DOWN_GRACE_MS: u64 = 500;

#[embassy_executor::task]
pub async fn run(mut supervisor: Supervisor<'static>, off_button: Input<'static>) -> ! {
    let policy = PowerSupervisor::new();
    let mut polls = 0u32;
    let mut ticker = Ticker::every(Duration::from_millis(POLL_INTERVAL_MS));
    loop {
        ticker.next().await;
        let (action, check) = policy.poll(supervisor.status(), off_button.is_low(), &FATAL, &BUS);
        if let Err(err) = check {
            defmt::debug!("power: {}", defmt::Display2Format(&err));
        }
        if let PowerAction::PowerOff { wake_on_charge } = action {
            defmt::info!("power: shutting down, wake on charge {}", wake_on_charge);
            TELEMETRY.dump();
            Timer::after(Duration::from_millis(POWER_DOWN_GRACE_MS)).await;
            supervisor.apply(action);
        }

        polls = polls.wrapping_add(1);
        if polls % DUMP_INTERVAL_POLLS == 0 {
            TELEMETRY.dump();
        }
    }
}
