//! Gain conversions between the display (dB), the codec volume registers
//! and the Bluetooth volume scale.

/// Which gain a volume update refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GainTarget {
    Mic,
    Speaker,
}

pub const NOMINAL_DB: f32 = 0.0;
pub const MIC_MIN_DB: f32 = -39.0;
pub const MIC_MAX_DB: f32 = 9.0;
pub const SPEAKER_MIN_DB: f32 = -43.5;
pub const SPEAKER_MAX_DB: f32 = 4.5;

/// Bluetooth volume levels are 0..=15.
pub const BT_MAX_LEVEL: u8 = 15;

const CODEC_MIN_LEVEL: u8 = 4;
const CODEC_MAX_LEVEL: u8 = 100;
const CODEC_ADC_DB: (f32, f32) = (-84.0, 12.0);
const CODEC_DAC_DB: (f32, f32) = (-91.5, 4.5);

/// Applies codec volume levels.
pub trait CodecControl {
    /// Sets a codec volume level (4..=100). Returns `false` if the codec
    /// rejected the write.
    fn set_level(&mut self, target: GainTarget, level: u8) -> bool;
}

impl GainTarget {
    /// Range the user may select, in dB.
    #[must_use]
    pub const fn range_db(self) -> (f32, f32) {
        match self {
            Self::Mic => (MIC_MIN_DB, MIC_MAX_DB),
            Self::Speaker => (SPEAKER_MIN_DB, SPEAKER_MAX_DB),
        }
    }

    const fn codec_range_db(self) -> (f32, f32) {
        match self {
            Self::Mic => CODEC_ADC_DB,
            Self::Speaker => CODEC_DAC_DB,
        }
    }
}

/// Clamps a requested gain to what the user may select.
#[must_use]
pub fn clamp_db(target: GainTarget, db: f32) -> f32 {
    let (min, max) = target.range_db();
    db.clamp(min, max)
}

/// Bluetooth level to dB.
#[must_use]
pub fn bt_to_db(target: GainTarget, level: u8) -> f32 {
    let (min, max) = target.range_db();
    map_range(
        f32::from(level.min(BT_MAX_LEVEL)),
        (0.0, f32::from(BT_MAX_LEVEL)),
        (min, max),
    )
}

/// dB to the nearest Bluetooth level.
#[must_use]
pub fn db_to_bt(target: GainTarget, db: f32) -> u8 {
    let level = map_range(db, target.range_db(), (0.0, f32::from(BT_MAX_LEVEL)));
    clamp_level(round(level), 0, BT_MAX_LEVEL)
}

/// dB to the nearest codec volume level.
#[must_use]
pub fn db_to_codec(target: GainTarget, db: f32) -> u8 {
    let level = map_range(
        db,
        target.codec_range_db(),
        (f32::from(CODEC_MIN_LEVEL), f32::from(CODEC_MAX_LEVEL)),
    );
    clamp_level(round(level), CODEC_MIN_LEVEL, CODEC_MAX_LEVEL)
}

/// Converts and writes a gain to the codec.
pub fn apply_codec_gain(codec: &mut impl CodecControl, target: GainTarget, db: f32) -> bool {
    codec.set_level(target, db_to_codec(target, db))
}

fn map_range(value: f32, from: (f32, f32), to: (f32, f32)) -> f32 {
    to.0 + (value - from.0) / (from.1 - from.0) * (to.1 - to.0)
}

/// Rounds half away from zero.
#[allow(clippy::cast_possible_truncation)]
fn round(value: f32) -> i32 {
    if value >= 0.0 {
        (value + 0.5) as i32
    } else {
        (value - 0.5) as i32
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_level(level: i32, min: u8, max: u8) -> u8 {
    level.clamp(i32::from(min), i32::from(max)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bluetooth_scale_end_points() {
        assert_eq!(bt_to_db(GainTarget::Mic, 0), MIC_MIN_DB);
        assert_eq!(bt_to_db(GainTarget::Mic, 15), MIC_MAX_DB);
        assert_eq!(bt_to_db(GainTarget::Speaker, 15), SPEAKER_MAX_DB);
        assert_eq!(db_to_bt(GainTarget::Speaker, -100.0), 0);
        assert_eq!(db_to_bt(GainTarget::Speaker, 100.0), 15);
    }

    #[test]
    fn bluetooth_levels_survive_a_round_trip() {
        for target in [GainTarget::Mic, GainTarget::Speaker] {
            for level in 0..=BT_MAX_LEVEL {
                assert_eq!(db_to_bt(target, bt_to_db(target, level)), level);
            }
        }
    }

    #[test]
    fn codec_levels_follow_register_ranges() {
        assert_eq!(db_to_codec(GainTarget::Mic, -84.0), 4);
        assert_eq!(db_to_codec(GainTarget::Mic, 12.0), 100);
        // 0 dB sits 84/96 of the way up the ADC range.
        assert_eq!(db_to_codec(GainTarget::Mic, 0.0), 88);
        assert_eq!(db_to_codec(GainTarget::Speaker, 0.0), 96);
        assert_eq!(db_to_codec(GainTarget::Speaker, -200.0), 4);
    }
}
