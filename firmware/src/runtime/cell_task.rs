use bridge_core::cellular::{
    AtDecoder, CellularLink, CellularTiming, HfpIndication, dispatch_indication, format_command,
};
use bridge_core::ticks::CELL_TICK_MS;
use embassy_futures::join::join3;
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Ticker, Timer};
use embedded_io_async::{Read, Write};
use static_cell::StaticCell;

use super::{BUS, RADIO_QUEUE, TELEMETRY, now};
use crate::radio::{LineAssembler, LineError, QueuedRadio};
use crate::status;

const RADIO_UART_BAUD: u32 = 115_200;
const RADIO_UART_BUFFER_SIZE: usize = 256;

static UART_TX_BUFFER: StaticCell<[u8; RADIO_UART_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; RADIO_UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

#[embassy_executor::task]
pub async fn run(
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
    paired: bool,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = RADIO_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let Ok(uart) = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        UART_TX_BUFFER.init([0; RADIO_UART_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; RADIO_UART_BUFFER_SIZE]),
        UartIrqs,
        config,
    ) else {
        super::fail(bridge_core::power::FatalCause::RadioInit);
        loop {
            core::future::pending::<()>().await;
        }
    };
    let (mut uart_tx, mut uart_rx) = uart.split();

    let commands = RADIO_QUEUE.receiver();
    let writer = async move {
        loop {
            let command = commands.receive().await;
            match format_command(&command) {
                Ok(line) => {
                    if uart_tx.write_all(line.as_bytes()).await.is_err() {
                        log_uart_error("write");
                        Timer::after(Duration::from_millis(5)).await;
                    }
                }
                Err(_) => log_unencodable(),
            }
        }
    };

    let reader = async move {
        let mut assembler = LineAssembler::new();
        let mut decoder = AtDecoder::new();
        let mut ingress = [0u8; 64];
        loop {
            match uart_rx.read(&mut ingress).await {
                Ok(count) => {
                    for &byte in &ingress[..count] {
                        match assembler.push(byte) {
                            Some(Ok(line)) => handle_line(&mut decoder, &line),
                            Some(Err(LineError::TooLong)) => log_line_too_long(),
                            None => {}
                        }
                    }
                }
                Err(_) => {
                    log_uart_error("read");
                    Timer::after(Duration::from_millis(5)).await;
                }
            }
        }
    };

    let poller = async move {
        let mut link = CellularLink::new(CellularTiming::new(), paired);
        let mut radio = QueuedRadio::new(RADIO_QUEUE.sender());
        let mut ticker = Ticker::every(Duration::from_millis(u64::from(CELL_TICK_MS)));
        loop {
            ticker.next().await;
            // Keeps running after a fatal error so power-down reaches the handset.
            let diagnostics = link.poll(&BUS, &mut radio);
            TELEMETRY.cell(&diagnostics, now());
            TELEMETRY.dropped("cell", diagnostics.dropped(), now());
        }
    };

    join3(writer, reader, poller).await;
    loop {
        core::future::pending::<()>().await;
    }
}

fn handle_line(decoder: &mut AtDecoder, line: &str) {
    match decoder.decode(line) {
        Ok(indication) => {
            match indication {
                HfpIndication::AuthSucceeded => status::record_bonded(true),
                HfpIndication::AuthFailed => status::record_bonded(false),
                HfpIndication::IndicatorsMapped(map) => log_indicators(map.call, map.call_setup),
                _ => {}
            }
            dispatch_indication(&BUS, indication);
        }
        Err(_) => log_unrecognized(line),
    }
}

fn log_uart_error(direction: &'static str) {
    defmt::warn!("radio: UART {} error", direction);
}

fn log_unencodable() {
    defmt::warn!("radio: command does not fit one line");
}

fn log_line_too_long() {
    defmt::warn!("radio: dropped overlong line");
}

fn log_indicators(call: u8, call_setup: u8) {
    defmt::info!("radio: call indicator {}, call setup indicator {}", call, call_setup);
}

fn log_unrecognized(line: &str) {
    defmt::debug!("radio: ignored {=str}", line);
}
