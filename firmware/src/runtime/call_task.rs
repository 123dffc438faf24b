use bridge_core::orchestrator::{CallOrchestrator, CallTiming};
use bridge_core::ticks::CALL_TICK_MS;
use embassy_time::{Duration, Ticker};

use super::{BUS, FATAL, TELEMETRY, now};
use crate::hw::Es8388;

#[embassy_executor::task]
pub async fn run(mut codec: Es8388<'static>) -> ! {
    let mut call = CallOrchestrator::new(CallTiming::new());
    TELEMETRY.call(&call.restore_gains(&BUS, &mut codec), now());

    let mut ticker = Ticker::every(Duration::from_millis(u64::from(CALL_TICK_MS)));
    loop {
        ticker.next().await;
        if FATAL.is_latched() {
            continue;
        }
        let diagnostics = call.poll(&BUS, &mut codec);
        TELEMETRY.call(&diagnostics, now());
        TELEMETRY.dropped("call", diagnostics.dropped(), now());
    }
}
