//! Plumbing between the cellular task and the radio co-processor UART.
//!
//! [`CellularLink`](bridge_core::cellular::CellularLink) issues commands
//! synchronously; they wait in [`RadioQueue`] until the UART writer formats
//! them as AT lines. Incoming bytes are framed into lines by
//! [`LineAssembler`] before the core parser sees them.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use bridge_core::cellular::{HfpCommand, HfpControl};
use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::String;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

use crate::status;

#[cfg(target_os = "none")]
type RadioMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type RadioMutex = NoopRawMutex;

/// Commands the writer may fall behind by.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// Longest line accepted from the radio; fits a full `+CIND` indicator list.
pub const MAX_LINE_LEN: usize = 192;

pub type RadioLine = String<MAX_LINE_LEN>;

pub type CommandChannel = Channel<RadioMutex, HfpCommand, COMMAND_QUEUE_DEPTH>;
pub type CommandSender<'a> = Sender<'a, RadioMutex, HfpCommand, COMMAND_QUEUE_DEPTH>;
pub type CommandReceiver<'a> = Receiver<'a, RadioMutex, HfpCommand, COMMAND_QUEUE_DEPTH>;

/// Commands on their way to the radio.
pub struct RadioQueue {
    commands: CommandChannel,
}

impl RadioQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
        }
    }

    #[must_use]
    pub fn sender(&self) -> CommandSender<'_> {
        self.commands.sender()
    }

    #[must_use]
    pub fn receiver(&self) -> CommandReceiver<'_> {
        self.commands.receiver()
    }
}

impl Default for RadioQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// [`HfpControl`] backed by the command queue and the bond flag in
/// [`status`].
pub struct QueuedRadio<'a> {
    commands: CommandSender<'a>,
    dropped: u32,
}

impl<'a> QueuedRadio<'a> {
    #[must_use]
    pub fn new(commands: CommandSender<'a>) -> Self {
        Self {
            commands,
            dropped: 0,
        }
    }

    /// Commands lost to a full queue.
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl HfpControl for QueuedRadio<'_> {
    fn send(&mut self, command: HfpCommand) {
        if self.commands.try_send(command).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            log_command_dropped(self.dropped);
        }
    }

    fn has_bond(&mut self) -> bool {
        status::is_bonded()
    }
}

/// Why an incoming line was discarded.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineError {
    TooLong,
}

/// Splits the radio byte stream into lines.
///
/// Either CR or LF ends a line; empty lines are skipped. A line longer than
/// [`MAX_LINE_LEN`] is dropped up to its terminator and reported once.
#[derive(Default)]
pub struct LineAssembler {
    line: RadioLine,
    overflowed: bool,
}

impl LineAssembler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            line: String::new(),
            overflowed: false,
        }
    }

    /// Consumes one byte, returning a line when it completes.
    pub fn push(&mut self, byte: u8) -> Option<Result<RadioLine, LineError>> {
        match byte {
            b'\r' | b'\n' => {
                let line = core::mem::take(&mut self.line);
                if core::mem::take(&mut self.overflowed) {
                    Some(Err(LineError::TooLong))
                } else if line.is_empty() {
                    None
                } else {
                    Some(Ok(line))
                }
            }
            _ if self.overflowed => None,
            _ => {
                // Non-ASCII bytes cannot belong to an AT line.
                let ch = if byte.is_ascii() { char::from(byte) } else { '?' };
                if self.line.push(ch).is_err() {
                    self.overflowed = true;
                    self.line.clear();
                }
                None
            }
        }
    }
}

#[cfg(target_os = "none")]
fn log_command_dropped(total: u32) {
    defmt::warn!("radio: command queue full, {} dropped", total);
}

#[cfg(not(target_os = "none"))]
fn log_command_dropped(total: u32) {
    println!("radio: command queue full, {total} dropped");
}
