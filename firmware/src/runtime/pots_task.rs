use bridge_core::dsp::GoertzelDetector;
use bridge_core::pots::{HookState, PotsLine, PotsTiming};
use bridge_core::ticks::POTS_TICK_MS;
use embassy_time::{Duration, Ticker};

use super::{BUS, FATAL, PIPELINE, TELEMETRY, now};
use crate::hw::GpioLine;

#[embassy_executor::task]
pub async fn run(line: GpioLine<'static>, country: u8) -> ! {
    let (mut pots, clamped) = PotsLine::new(line, GoertzelDetector::new(), country, PotsTiming::new());
    if let Some(diagnostic) = clamped {
        TELEMETRY.pots(&[diagnostic]);
    }

    let mut off_hook = false;
    let mut ticker = Ticker::every(Duration::from_millis(u64::from(POTS_TICK_MS)));
    loop {
        ticker.next().await;
        if FATAL.is_latched() {
            continue;
        }
        let diagnostics = pots.poll(&BUS, &PIPELINE);
        TELEMETRY.pots(&diagnostics);
        TELEMETRY.dropped("pots", diagnostics.dropped(), now());

        let hook_off = pots.hook_state() != HookState::OnHook;
        if hook_off != off_hook {
            off_hook = hook_off;
            TELEMETRY.hook(off_hook, now());
        }
    }
}
