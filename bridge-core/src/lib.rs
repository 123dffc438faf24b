#![no_std]

// Shared logic for the POTS to Bluetooth hands-free bridge.
//
// Every state machine, the audio path and the protocol codecs live here so the
// firmware and the host emulator drive exactly the same code. The crate avoids
// the Rust standard library and never logs; conditions worth reporting come
// back to the caller as diagnostic values.

pub mod audio;
pub mod bus;
pub mod callerid;
pub mod cellular;
pub mod console;
pub mod country;
pub mod dial_buffer;
pub mod dsp;
pub mod events;
pub mod gain;
pub mod orchestrator;
pub mod pots;
pub mod power;
pub mod report;
pub mod settings;
pub mod telemetry;
pub mod ticks;
