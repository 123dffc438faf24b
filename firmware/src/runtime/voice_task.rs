//! Call audio to and from the radio on its own UART, 16-bit little-endian.

use bridge_core::audio::FRAME_SAMPLES;
use bridge_core::ticks::POTS_TICK_MS;
use embassy_futures::join::join;
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig};
use embassy_time::{Duration, Ticker, Timer};
use embedded_io_async::{Read, Write};
use static_cell::StaticCell;

use super::PIPELINE;

const VOICE_UART_BAUD: u32 = 921_600;
const VOICE_UART_BUFFER_SIZE: usize = 1024;
/// One 10 ms wideband frame.
const MAX_FRAME_BYTES: usize = FRAME_SAMPLES * 2 * 2;

static UART_TX_BUFFER: StaticCell<[u8; VOICE_UART_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; VOICE_UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct VoiceIrqs {
    USART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART1>;
});

#[embassy_executor::task]
pub async fn run(
    usart: Peri<'static, hal::peripherals::USART1>,
    tx_pin: Peri<'static, hal::peripherals::PA9>,
    rx_pin: Peri<'static, hal::peripherals::PA10>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = VOICE_UART_BAUD;

    let Ok(uart) = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        UART_TX_BUFFER.init([0; VOICE_UART_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; VOICE_UART_BUFFER_SIZE]),
        VoiceIrqs,
        config,
    ) else {
        super::fail(bridge_core::power::FatalCause::RadioInit);
        loop {
            core::future::pending::<()>().await;
        }
    };
    let (mut uart_tx, mut uart_rx) = uart.split();

    let uplink = async move {
        let mut ticker = Ticker::every(Duration::from_millis(u64::from(POTS_TICK_MS)));
        let mut frame = [0u8; MAX_FRAME_BYTES];
        loop {
            ticker.next().await;
            let source = PIPELINE.source();
            if !source.is_voice() {
                continue;
            }
            let frame = &mut frame[..FRAME_SAMPLES * 2 * source.rate_factor()];
            PIPELINE.get_rx_voice_bytes(frame);
            if uart_tx.write_all(frame).await.is_err() {
                defmt::warn!("voice: UART write error");
            }
        }
    };

    let downlink = async move {
        let mut ingress = [0u8; MAX_FRAME_BYTES + 1];
        // A sample split across two reads keeps its first byte here.
        let mut carried = 0usize;
        loop {
            match uart_rx.read(&mut ingress[carried..]).await {
                Ok(count) => {
                    let available = carried + count;
                    let whole = available & !1;
                    PIPELINE.put_tx_voice_bytes(&ingress[..whole]);
                    carried = available - whole;
                    if carried == 1 {
                        ingress[0] = ingress[whole];
                    }
                }
                Err(_) => {
                    defmt::warn!("voice: UART read error");
                    carried = 0;
                    Timer::after(Duration::from_millis(5)).await;
                }
            }
        }
    };

    join(uplink, downlink).await;
    loop {
        core::future::pending::<()>().await;
    }
}
