//! Board peripherals behind the core traits.
//!
//! The SLIC line card sits on GPIO, the ES8388 codec takes volume writes over
//! I2C and exchanges PCM frames over SPI, and the power supervisor lives in
//! [`power`].

#![cfg(target_os = "none")]

pub mod power;

use bridge_core::audio::{AudioError, AudioPort};
use bridge_core::gain::{CodecControl, GainTarget};
use bridge_core::pots::LineInterface;
use embassy_stm32::gpio::{Input, Output};
use embassy_stm32::i2c::I2c;
use embassy_stm32::mode::Blocking;
use embassy_stm32::spi::Spi;

/// SLIC control pins.
pub struct GpioLine<'d> {
    /// Switch-hook detect, low while the loop is closed.
    shd: Input<'d>,
    /// Ring mode enable.
    ring: Output<'d>,
    /// Forward/reverse polarity, high for forward.
    forward: Output<'d>,
}

impl<'d> GpioLine<'d> {
    #[must_use]
    pub fn new(shd: Input<'d>, ring: Output<'d>, forward: Output<'d>) -> Self {
        Self { shd, ring, forward }
    }
}

impl LineInterface for GpioLine<'_> {
    fn hook_is_off(&mut self) -> bool {
        self.shd.is_low()
    }

    fn set_ring_mode(&mut self, enabled: bool) {
        if enabled {
            self.ring.set_high();
        } else {
            self.ring.set_low();
        }
    }

    fn set_forward(&mut self, forward: bool) {
        if forward {
            self.forward.set_high();
        } else {
            self.forward.set_low();
        }
    }
}

const ES8388_ADDR: u8 = 0x10;
const ES8388_CHIP_POWER: u8 = 0x02;
const ES8388_ADC_VOLUME_L: u8 = 0x10;
const ES8388_ADC_VOLUME_R: u8 = 0x11;
const ES8388_DAC_VOLUME_L: u8 = 0x1A;
const ES8388_DAC_VOLUME_R: u8 = 0x1B;
/// Both volume registers attenuate in 0.5 dB steps down to -96 dB.
const ES8388_MAX_ATTENUATION: u8 = 0xC0;

/// ES8388 control port.
pub struct Es8388<'d> {
    i2c: I2c<'d, Blocking>,
}

impl<'d> Es8388<'d> {
    #[must_use]
    pub fn new(i2c: I2c<'d, Blocking>) -> Self {
        Self { i2c }
    }

    /// Powers up the analog and digital paths.
    ///
    /// # Errors
    ///
    /// [`AudioError::CodecInit`] when the codec does not acknowledge.
    pub fn init(&mut self) -> Result<(), AudioError> {
        if self.write(ES8388_CHIP_POWER, 0x00) {
            Ok(())
        } else {
            Err(AudioError::CodecInit)
        }
    }

    fn write(&mut self, register: u8, value: u8) -> bool {
        self.i2c.blocking_write(ES8388_ADDR, &[register, value]).is_ok()
    }
}

/// Codec level (4..=100, one dB per step at the top) to attenuation.
fn attenuation(level: u8) -> u8 {
    let steps = 100u8.saturating_sub(level).saturating_mul(2);
    steps.min(ES8388_MAX_ATTENUATION)
}

impl CodecControl for Es8388<'_> {
    fn set_level(&mut self, target: GainTarget, level: u8) -> bool {
        let value = attenuation(level);
        let (left, right) = match target {
            GainTarget::Mic => (ES8388_ADC_VOLUME_L, ES8388_ADC_VOLUME_R),
            GainTarget::Speaker => (ES8388_DAC_VOLUME_L, ES8388_DAC_VOLUME_R),
        };
        self.write(left, value) && self.write(right, value)
    }
}

/// PCM frames to and from the codec's serial audio FIFO.
pub struct SpiAudioPort<'d> {
    spi: Spi<'d, Blocking>,
}

impl<'d> SpiAudioPort<'d> {
    #[must_use]
    pub fn new(spi: Spi<'d, Blocking>) -> Self {
        Self { spi }
    }
}

impl AudioPort for SpiAudioPort<'_> {
    async fn exchange(&mut self, tx: &[i16], rx: &mut [i16]) -> Result<(), AudioError> {
        let mut bytes = [0u8; bridge_core::audio::FRAME_SAMPLES * 4];
        for (chunk, sample) in bytes.chunks_exact_mut(2).zip(tx.iter()) {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }
        self.spi
            .blocking_transfer_in_place(&mut bytes)
            .map_err(|_| AudioError::Transport)?;
        for (sample, chunk) in rx.iter_mut().zip(bytes.chunks_exact(2)) {
            *sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        }
        Ok(())
    }
}
