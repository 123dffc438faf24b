//! Caller-ID message assembly for the supported national standards.
//!
//! A [`CallerIdMessage`] is built fresh for each ring sequence from the
//! caller number (or an absence reason) and handed to a
//! [`CallerIdTransmitter`], which produces the line audio.

use heapless::{String, Vec};

use crate::dsp::{
    DtmfSender, DtmfTiming, FskModem, FskModulator, FskProfile, SampleSource,
};

/// Longest caller number kept from the handset.
pub const MAX_CALLER_DIGITS: usize = 32;

pub type CallerNumber = String<MAX_CALLER_DIGITS>;

/// Bellcore mark preamble length in bits.
pub const BELLCORE_MARK_BITS: u16 = 156;
/// ETSI mark preamble length in bits.
pub const ETSI_MARK_BITS: u16 = 180;
/// ETSI mark preamble length with the short-preamble flag.
pub const ETSI_SHORT_MARK_BITS: u16 = 80;
pub const CHANNEL_SEIZURE_BITS: u16 = 300;
pub const SIN227_SEIZURE_BITS: u16 = 96;
pub const JCLIP_MARK_BITS: u16 = 72;

const FSK_LEVEL: i8 = -13;
const MDMF_CALL_SETUP: u8 = 0x80;
const SDMF_CALL_SETUP: u8 = 0x04;
const PARAM_TIME: u8 = 0x01;
const PARAM_NUMBER: u8 = 0x02;
const PARAM_ABSENCE: u8 = 0x04;
const PARAM_CALL_TYPE: u8 = 0x11;
const CALL_TYPE_VOICE: u8 = 0x01;
const JCLIP_MESSAGE_TYPE: u8 = 0x40;
const DLE: u8 = 0x10;
const SOH: u8 = 0x01;
const STX: u8 = 0x02;
const ETX: u8 = 0x03;
const JCLIP_HEADER: u8 = 0x07;

/// Caller-ID signalling family.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CallerIdStandard {
    None,
    /// Bell 202 multiple data message format.
    Bellcore,
    /// Bell 202 single data message format.
    BellcoreSdmf,
    Etsi,
    Sin227,
    /// `A<number>C`, absence as `B<code>C`.
    Dtmf1,
    /// `D<number>C`, absence as `B<code>C`.
    Dtmf2,
    /// `A<number>#`, no absence encoding.
    Dtmf3,
    /// `D<number>#`, no absence encoding.
    Dtmf4,
    Jclip,
    Aclip,
}

impl CallerIdStandard {
    #[must_use]
    pub const fn is_dtmf(self) -> bool {
        matches!(self, Self::Dtmf1 | Self::Dtmf2 | Self::Dtmf3 | Self::Dtmf4)
    }

    /// Whether the standard can tell the called party why no number is shown.
    #[must_use]
    pub const fn has_absence_encoding(self) -> bool {
        !matches!(self, Self::None | Self::Dtmf3 | Self::Dtmf4)
    }

    /// FSK modem and preamble, or `None` for DTMF and disabled caller ID.
    #[must_use]
    pub const fn fsk_profile(self, flags: CallerIdFlags) -> Option<FskProfile> {
        let (modem, seizure_bits, mark_bits) = match self {
            Self::Bellcore | Self::BellcoreSdmf => {
                (FskModem::Bell202, CHANNEL_SEIZURE_BITS, BELLCORE_MARK_BITS)
            }
            Self::Etsi => (FskModem::V23, CHANNEL_SEIZURE_BITS, etsi_mark_bits(flags)),
            Self::Sin227 => (FskModem::V23, SIN227_SEIZURE_BITS, etsi_mark_bits(flags)),
            Self::Jclip => (FskModem::V23, 0, JCLIP_MARK_BITS),
            Self::Aclip => (FskModem::Bell202, 0, etsi_mark_bits(flags)),
            _ => return None,
        };
        Some(FskProfile {
            modem,
            seizure_bits,
            mark_bits,
            level: FSK_LEVEL,
        })
    }
}

const fn etsi_mark_bits(flags: CallerIdFlags) -> u16 {
    if flags.contains(CallerIdFlags::SHORT_PREAMBLE) {
        ETSI_SHORT_MARK_BITS
    } else {
        ETSI_MARK_BITS
    }
}

/// Caller-ID sequencing options.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CallerIdFlags(u8);

impl CallerIdFlags {
    pub const NONE: Self = Self(0);
    /// Send the message before the first ring instead of after it.
    pub const BEFORE_RING: Self = Self(0x01);
    /// Reverse line polarity as the alert.
    pub const LINE_REVERSAL: Self = Self(0x02);
    /// Short ring pulse (RP-AS) as the alert.
    pub const ALERT_RING: Self = Self(0x04);
    /// Dual-tone alert (DT-AS) before the message.
    pub const DUAL_TONE_ALERT: Self = Self(0x08);
    pub const SHORT_PREAMBLE: Self = Self(0x10);

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// Caller-ID settings of one country.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CallerIdSpec {
    pub standard: CallerIdStandard,
    pub flags: CallerIdFlags,
    /// Silence between the alert and the message.
    pub pre_ms: u16,
    /// Silence between the message and the first permitted ring.
    pub post_ms: u16,
    /// Duration of the alert ring pulse.
    pub alert_ms: u16,
}

impl CallerIdSpec {
    pub const DISABLED: Self = Self::new(CallerIdStandard::None, CallerIdFlags::NONE, 0, 0, 0);

    #[must_use]
    pub const fn new(
        standard: CallerIdStandard,
        flags: CallerIdFlags,
        pre_ms: u16,
        post_ms: u16,
        alert_ms: u16,
    ) -> Self {
        Self {
            standard,
            flags,
            pre_ms,
            post_ms,
            alert_ms,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self.standard, CallerIdStandard::None)
    }

    #[must_use]
    pub const fn before_ring(&self) -> bool {
        self.flags.contains(CallerIdFlags::BEFORE_RING)
    }
}

/// Why no caller number is presented.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Absence {
    Unavailable,
    Private,
}

impl Absence {
    /// One-byte code used by the FSK standards.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Unavailable => b'O',
            Self::Private => b'P',
        }
    }

    const fn dtmf_code(self) -> &'static str {
        match self {
            Self::Unavailable => "00",
            Self::Private => "10",
        }
    }
}

/// Local date and time of the call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CallerIdTime {
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
}

impl CallerIdTime {
    /// `MMDDHHMM` as ASCII digits.
    #[must_use]
    pub fn digits(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        for (pair, value) in out
            .chunks_exact_mut(2)
            .zip([self.month, self.day, self.hour, self.minute])
        {
            let value = value % 100;
            pair[0] = b'0' + value / 10;
            pair[1] = b'0' + value % 10;
        }
        out
    }
}

/// One typed field of a caller-ID message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CallerIdField {
    CallType(u8),
    Timestamp(CallerIdTime),
    Number(CallerNumber),
    Absence(Absence),
}

/// Encoder-ready message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EncodedCallerId {
    Fsk {
        profile: FskProfile,
        bytes: Vec<u8, 80>,
    },
    Dtmf(String<48>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallerIdMessage {
    pub standard: CallerIdStandard,
    pub fields: Vec<CallerIdField, 4>,
    pub encoded: EncodedCallerId,
}

impl CallerIdMessage {
    /// Builds the message for `number`, or an absence message when it is
    /// `None`. Returns `None` when the standard cannot express the message.
    #[must_use]
    pub fn build(
        spec: &CallerIdSpec,
        number: Option<&str>,
        absence: Absence,
        time: Option<CallerIdTime>,
    ) -> Option<Self> {
        let number = number
            .map(sanitize_number)
            .filter(|digits| !digits.is_empty());
        if number.is_none() && !spec.standard.has_absence_encoding() {
            return None;
        }

        let mut fields = Vec::new();
        let subject = match number {
            Some(digits) => CallerIdField::Number(digits),
            None => CallerIdField::Absence(absence),
        };
        match spec.standard {
            CallerIdStandard::None => return None,
            CallerIdStandard::Etsi => {
                let _ = fields.push(CallerIdField::CallType(CALL_TYPE_VOICE));
                if let Some(time) = time {
                    let _ = fields.push(CallerIdField::Timestamp(time));
                }
            }
            CallerIdStandard::Bellcore
            | CallerIdStandard::BellcoreSdmf
            | CallerIdStandard::Sin227
            | CallerIdStandard::Aclip => {
                if let Some(time) = time {
                    let _ = fields.push(CallerIdField::Timestamp(time));
                }
            }
            _ => {}
        }
        let _ = fields.push(subject);

        let encoded = encode(spec, &fields)?;
        Some(Self {
            standard: spec.standard,
            fields,
            encoded,
        })
    }

    /// Audio source for this message.
    #[must_use]
    pub fn transmitter(&self) -> CallerIdTransmitter {
        match &self.encoded {
            EncodedCallerId::Fsk { profile, bytes } => {
                CallerIdTransmitter::Fsk(FskModulator::new(*profile, bytes))
            }
            EncodedCallerId::Dtmf(symbols) => {
                let mut sender = DtmfSender::new(DtmfTiming::STRING);
                for symbol in symbols.chars() {
                    sender.push(symbol);
                }
                CallerIdTransmitter::Dtmf(sender)
            }
        }
    }
}

fn sanitize_number(raw: &str) -> CallerNumber {
    let mut digits = CallerNumber::new();
    for c in raw.chars().filter(char::is_ascii_digit) {
        if digits.push(c).is_err() {
            break;
        }
    }
    digits
}

fn encode(spec: &CallerIdSpec, fields: &[CallerIdField]) -> Option<EncodedCallerId> {
    if spec.standard.is_dtmf() {
        return encode_dtmf(spec.standard, fields).map(EncodedCallerId::Dtmf);
    }
    let profile = spec.standard.fsk_profile(spec.flags)?;
    let bytes = match spec.standard {
        CallerIdStandard::BellcoreSdmf => encode_sdmf(fields),
        CallerIdStandard::Jclip => encode_jclip(fields),
        _ => encode_mdmf(fields),
    }?;
    Some(EncodedCallerId::Fsk { profile, bytes })
}

fn push_parameter(body: &mut Vec<u8, 80>, kind: u8, value: &[u8]) -> Option<()> {
    body.push(kind).ok()?;
    body.push(u8::try_from(value.len()).ok()?).ok()?;
    body.extend_from_slice(value).ok()
}

fn parameters(fields: &[CallerIdField]) -> Option<Vec<u8, 80>> {
    let mut body = Vec::new();
    for field in fields {
        match field {
            CallerIdField::CallType(kind) => push_parameter(&mut body, PARAM_CALL_TYPE, &[*kind])?,
            CallerIdField::Timestamp(time) => push_parameter(&mut body, PARAM_TIME, &time.digits())?,
            CallerIdField::Number(number) => {
                push_parameter(&mut body, PARAM_NUMBER, number.as_bytes())?;
            }
            CallerIdField::Absence(reason) => {
                push_parameter(&mut body, PARAM_ABSENCE, &[reason.code()])?;
            }
        }
    }
    Some(body)
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
        .wrapping_neg()
}

fn frame_with_checksum(kind: u8, body: &[u8]) -> Option<Vec<u8, 80>> {
    let mut frame = Vec::new();
    frame.push(kind).ok()?;
    frame.push(u8::try_from(body.len()).ok()?).ok()?;
    frame.extend_from_slice(body).ok()?;
    let sum = checksum(&frame);
    frame.push(sum).ok()?;
    Some(frame)
}

fn encode_mdmf(fields: &[CallerIdField]) -> Option<Vec<u8, 80>> {
    let body = parameters(fields)?;
    frame_with_checksum(MDMF_CALL_SETUP, &body)
}

fn encode_sdmf(fields: &[CallerIdField]) -> Option<Vec<u8, 80>> {
    let mut body: Vec<u8, 80> = Vec::new();
    let time = fields.iter().find_map(|field| match field {
        CallerIdField::Timestamp(time) => Some(time.digits()),
        _ => None,
    });
    body.extend_from_slice(&time.unwrap_or([b'0'; 8])).ok()?;
    for field in fields {
        match field {
            CallerIdField::Number(number) => body.extend_from_slice(number.as_bytes()).ok()?,
            CallerIdField::Absence(reason) => body.push(reason.code()).ok()?,
            _ => {}
        }
    }
    frame_with_checksum(SDMF_CALL_SETUP, &body)
}

/// CRC-16 with the reflected CCITT polynomial, zero initial value.
fn crc16_kermit(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |crc, &byte| {
        let mut crc = crc ^ u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ 0x8408 } else { crc >> 1 };
        }
        crc
    })
}

fn encode_jclip(fields: &[CallerIdField]) -> Option<Vec<u8, 80>> {
    let body = parameters(fields)?;
    let mut covered: Vec<u8, 80> = Vec::new();
    covered
        .extend_from_slice(&[JCLIP_HEADER, DLE, STX, JCLIP_MESSAGE_TYPE])
        .ok()?;
    covered.push(u8::try_from(body.len()).ok()?).ok()?;
    covered.extend_from_slice(&body).ok()?;
    covered.extend_from_slice(&[DLE, ETX]).ok()?;
    let crc = crc16_kermit(&covered);

    let mut frame = Vec::new();
    frame.extend_from_slice(&[DLE, SOH]).ok()?;
    frame.extend_from_slice(&covered).ok()?;
    frame.extend_from_slice(&crc.to_le_bytes()).ok()?;
    Some(frame)
}

fn encode_dtmf(standard: CallerIdStandard, fields: &[CallerIdField]) -> Option<String<48>> {
    let (start, end) = match standard {
        CallerIdStandard::Dtmf1 => ('A', 'C'),
        CallerIdStandard::Dtmf2 => ('D', 'C'),
        CallerIdStandard::Dtmf3 => ('A', '#'),
        CallerIdStandard::Dtmf4 => ('D', '#'),
        _ => return None,
    };
    let mut symbols = String::new();
    for field in fields {
        match field {
            CallerIdField::Number(number) => {
                symbols.push(start).ok()?;
                symbols.push_str(number).ok()?;
                symbols.push(end).ok()?;
            }
            CallerIdField::Absence(reason) if standard.has_absence_encoding() => {
                symbols.push('B').ok()?;
                symbols.push_str(reason.dtmf_code()).ok()?;
                symbols.push(end).ok()?;
            }
            _ => {}
        }
    }
    (!symbols.is_empty()).then_some(symbols)
}

/// Audio generator for an encoded caller-ID message.
#[derive(Clone, Debug)]
pub enum CallerIdTransmitter {
    Fsk(FskModulator),
    Dtmf(DtmfSender),
}

impl SampleSource for CallerIdTransmitter {
    fn fill(&mut self, out: &mut [i16]) -> usize {
        match self {
            Self::Fsk(modulator) => modulator.fill(out),
            Self::Dtmf(sender) => sender.fill(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BELLCORE: CallerIdSpec =
        CallerIdSpec::new(CallerIdStandard::Bellcore, CallerIdFlags::NONE, 0, 200, 0);
    const ETSI: CallerIdSpec = CallerIdSpec::new(
        CallerIdStandard::Etsi,
        CallerIdFlags::BEFORE_RING.union(CallerIdFlags::DUAL_TONE_ALERT),
        0,
        200,
        0,
    );

    fn fsk_bytes(message: &CallerIdMessage) -> &[u8] {
        match &message.encoded {
            EncodedCallerId::Fsk { bytes, .. } => bytes,
            EncodedCallerId::Dtmf(other) => panic!("unexpected DTMF message: {other:?}"),
        }
    }

    #[test]
    fn bellcore_mdmf_layout_and_checksum() {
        let message = CallerIdMessage::build(&BELLCORE, Some("5551234"), Absence::Private, None)
            .expect("message");
        let bytes = fsk_bytes(&message);
        assert_eq!(&bytes[..4], &[0x80, 9, 0x02, 7]);
        assert_eq!(&bytes[4..11], b"5551234");
        let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        assert_eq!(sum, 0, "checksum makes the frame sum to zero");
    }

    #[test]
    fn absence_changes_only_the_subject_field() {
        let time = Some(CallerIdTime {
            month: 3,
            day: 14,
            hour: 9,
            minute: 26,
        });
        let with_number =
            CallerIdMessage::build(&ETSI, Some("+44 20 7946"), Absence::Unavailable, time)
                .expect("number message");
        let withheld =
            CallerIdMessage::build(&ETSI, None, Absence::Private, time).expect("absence message");

        assert_eq!(with_number.fields[..2], withheld.fields[..2]);
        assert_eq!(
            with_number.fields[2],
            CallerIdField::Number(CallerNumber::try_from("44207946").expect("fits"))
        );
        assert_eq!(withheld.fields[2], CallerIdField::Absence(Absence::Private));

        let bytes = fsk_bytes(&withheld);
        assert_eq!(&bytes[2..5], &[PARAM_CALL_TYPE, 1, CALL_TYPE_VOICE]);
        assert_eq!(&bytes[5..7], &[PARAM_TIME, 8]);
        assert_eq!(&bytes[7..15], b"03140926");
        assert_eq!(&bytes[15..18], &[PARAM_ABSENCE, 1, b'P']);
    }

    #[test]
    fn preamble_lengths_follow_the_standard() {
        let bell = CallerIdStandard::Bellcore
            .fsk_profile(CallerIdFlags::NONE)
            .expect("fsk");
        assert_eq!(bell.mark_bits, 156);
        assert_eq!(bell.seizure_bits, 300);
        assert_eq!(bell.modem, FskModem::Bell202);

        let etsi = CallerIdStandard::Etsi
            .fsk_profile(CallerIdFlags::NONE)
            .expect("fsk");
        assert_eq!(etsi.mark_bits, 180);
        assert_eq!(etsi.modem, FskModem::V23);

        let short = CallerIdStandard::Etsi
            .fsk_profile(CallerIdFlags::SHORT_PREAMBLE)
            .expect("fsk");
        assert_eq!(short.mark_bits, 80);
        assert!(CallerIdStandard::Dtmf1.fsk_profile(CallerIdFlags::NONE).is_none());
    }

    #[test]
    fn sdmf_carries_time_then_number() {
        let spec = CallerIdSpec::new(CallerIdStandard::BellcoreSdmf, CallerIdFlags::NONE, 0, 0, 0);
        let message = CallerIdMessage::build(&spec, Some("12"), Absence::Unavailable, None)
            .expect("message");
        let bytes = fsk_bytes(&message);
        assert_eq!(bytes[0], 0x04);
        assert_eq!(bytes[1], 10);
        assert_eq!(&bytes[2..12], b"0000000012");
    }

    #[test]
    fn dtmf_variants_frame_the_number() {
        let spec = CallerIdSpec::new(CallerIdStandard::Dtmf1, CallerIdFlags::BEFORE_RING, 100, 200, 0);
        let message =
            CallerIdMessage::build(&spec, Some("9876"), Absence::Private, None).expect("message");
        assert_eq!(message.encoded, EncodedCallerId::Dtmf(String::try_from("A9876C").expect("fits")));

        let absent = CallerIdMessage::build(&spec, None, Absence::Private, None).expect("absence");
        assert_eq!(absent.encoded, EncodedCallerId::Dtmf(String::try_from("B10C").expect("fits")));
    }

    #[test]
    fn dtmf_without_absence_encoding_is_skipped() {
        let spec = CallerIdSpec::new(CallerIdStandard::Dtmf3, CallerIdFlags::BEFORE_RING, 0, 0, 0);
        assert!(CallerIdMessage::build(&spec, None, Absence::Unavailable, None).is_none());
        let message =
            CallerIdMessage::build(&spec, Some("12"), Absence::Unavailable, None).expect("number");
        assert_eq!(message.encoded, EncodedCallerId::Dtmf(String::try_from("A12#").expect("fits")));
    }

    #[test]
    fn jclip_frame_is_dle_delimited_with_crc() {
        let spec = CallerIdSpec::new(CallerIdStandard::Jclip, CallerIdFlags::NONE, 0, 0, 0);
        let message =
            CallerIdMessage::build(&spec, Some("0312"), Absence::Unavailable, None).expect("jclip");
        let bytes = fsk_bytes(&message);
        assert_eq!(&bytes[..6], &[DLE, SOH, JCLIP_HEADER, DLE, STX, JCLIP_MESSAGE_TYPE]);
        let crc_at = bytes.len() - 2;
        assert_eq!(&bytes[crc_at - 2..crc_at], &[DLE, ETX]);
        let crc = u16::from_le_bytes([bytes[crc_at], bytes[crc_at + 1]]);
        assert_eq!(crc, crc16_kermit(&bytes[2..crc_at]));
    }

    #[test]
    fn kermit_crc_check_value() {
        assert_eq!(crc16_kermit(b"123456789"), 0x2189);
    }

    #[test]
    fn disabled_standard_builds_nothing() {
        assert!(CallerIdMessage::build(&CallerIdSpec::DISABLED, Some("1"), Absence::Private, None).is_none());
    }
}
