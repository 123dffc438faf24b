//! gCore power supervisor over I2C.

use bridge_core::power::PowerAction;
use embassy_stm32::i2c::I2c;
use embassy_stm32::mode::Blocking;

const GCORE_ADDR: u8 = 0x12;
const GCORE_REG_BASE: u16 = 0x1000;
const GCORE_REG_ID: u16 = 0x00;
const GCORE_REG_STATUS: u16 = 0x02;
const GCORE_REG_WAKE_CTRL: u16 = 0x0F;
const GCORE_REG_SHUTDOWN: u16 = 0x10;
const GCORE_FW_ID: u8 = 0x01;
const GCORE_WAKE_CHARGE_START: u8 = 0x02;
const GCORE_SHUTDOWN_TRIGGER: u8 = 0x0F;

pub struct Supervisor<'d> {
    i2c: I2c<'d, Blocking>,
}

impl<'d> Supervisor<'d> {
    #[must_use]
    pub fn new(i2c: I2c<'d, Blocking>) -> Self {
        Self { i2c }
    }

    /// Checks that the supervisor answers with the expected firmware id.
    pub fn identify(&mut self) -> bool {
        self.read(GCORE_REG_ID) == Some(GCORE_FW_ID)
    }

    /// Raw status register, `None` when the read failed.
    pub fn status(&mut self) -> Option<u8> {
        self.read(GCORE_REG_STATUS)
    }

    /// Carries out a power-off decision. Returns only if the write failed.
    pub fn apply(&mut self, action: PowerAction) {
        if let PowerAction::PowerOff { wake_on_charge } = action {
            let wake = if wake_on_charge { GCORE_WAKE_CHARGE_START } else { 0 };
            let _ = self.write(GCORE_REG_WAKE_CTRL, wake);
            let _ = self.write(GCORE_REG_SHUTDOWN, GCORE_SHUTDOWN_TRIGGER);
        }
    }

    fn read(&mut self, offset: u16) -> Option<u8> {
        let address = (GCORE_REG_BASE + offset).to_be_bytes();
        let mut value = [0u8];
        self.i2c
            .blocking_write_read(GCORE_ADDR, &address, &mut value)
            .ok()?;
        Some(value[0])
    }

    fn write(&mut self, offset: u16, value: u8) -> bool {
        let [high, low] = (GCORE_REG_BASE + offset).to_be_bytes();
        self.i2c.blocking_write(GCORE_ADDR, &[high, low, value]).is_ok()
    }
}
