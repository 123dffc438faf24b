//! AT line codec for the link to the Bluetooth radio co-processor.
//!
//! The co-processor runs the hands-free stack and speaks a small AT dialect:
//! standard HFP result codes upward plus `+HF…` lines for link state, and
//! standard HFP commands downward plus `AT+HF…` link control.

use core::fmt::{self, Write};

use heapless::String;
use winnow::ascii::{dec_uint, space0};
use winnow::combinator::{alt, delimited, opt, preceded, repeat, separated_pair, terminated};
use winnow::prelude::*;
use winnow::token::{rest, take_till};

use super::{CallSetup, HfpCommand, HfpIndication};
use crate::callerid::CallerNumber;
use crate::dial_buffer::MAX_DIGITS;
use crate::gain::GainTarget;

/// One encoded command line, terminated by `\r`.
pub type AtLine = String<{ MAX_DIGITS + 8 }>;

/// 1-based `+CIEV` positions of the indicators the bridge acts on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorMap {
    pub call: u8,
    pub call_setup: u8,
}

impl IndicatorMap {
    /// Order most handsets use, assumed until the handset lists its own.
    pub const DEFAULT: Self = Self {
        call: 2,
        call_setup: 3,
    };
}

impl Default for IndicatorMap {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Decodes lines from the co-processor.
///
/// `+CIEV` only carries an indicator position, so the decoder remembers the
/// positions announced by the handset's `+CIND` test response during
/// service level setup and forgets them when the connection drops.
#[derive(Debug, Default)]
pub struct AtDecoder {
    indicators: IndicatorMap,
}

impl AtDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            indicators: IndicatorMap::DEFAULT,
        }
    }

    #[must_use]
    pub const fn indicators(&self) -> IndicatorMap {
        self.indicators
    }

    /// Parses one line received from the co-processor.
    ///
    /// # Errors
    ///
    /// [`AtError::Empty`] for a blank line, [`AtError::Unrecognized`] otherwise.
    pub fn decode(&mut self, line: &str) -> Result<HfpIndication, AtError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(AtError::Empty);
        }
        let parsed = alt((
            indicator_list.map(Line::Indicators),
            ciev.map(|(index, value)| Line::Indicator { index, value }),
            indication.map(Line::Indication),
        ))
        .parse(line)
        .map_err(|_| AtError::Unrecognized)?;

        Ok(match parsed {
            Line::Indicators(map) => {
                self.indicators = map;
                HfpIndication::IndicatorsMapped(map)
            }
            Line::Indicator { index, value } => self.resolve(index, value),
            Line::Indication(indication) => {
                if indication == HfpIndication::SlcDisconnected {
                    self.indicators = IndicatorMap::DEFAULT;
                }
                indication
            }
        })
    }

    fn resolve(&self, index: u8, value: u8) -> HfpIndication {
        if index == self.indicators.call {
            HfpIndication::Call(value != 0)
        } else if index == self.indicators.call_setup {
            CallSetup::from_raw(value).map_or(HfpIndication::Indicator { index, value }, HfpIndication::CallSetup)
        } else {
            HfpIndication::Indicator { index, value }
        }
    }
}

enum Line {
    Indicators(IndicatorMap),
    Indicator { index: u8, value: u8 },
    Indication(HfpIndication),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AtError {
    /// Blank line.
    Empty,
    /// The line is not a result code this bridge understands.
    Unrecognized,
    /// The command does not fit in an [`AtLine`].
    Overflow,
}

impl fmt::Display for AtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtError::Empty => write!(f, "empty line"),
            AtError::Unrecognized => write!(f, "unrecognized result code"),
            AtError::Overflow => write!(f, "command too long"),
        }
    }
}


/// Encodes a command for the co-processor.
///
/// # Errors
///
/// [`AtError::Overflow`] when the line does not fit.
pub fn format_command(command: &HfpCommand) -> Result<AtLine, AtError> {
    let mut line = AtLine::new();
    match command {
        HfpCommand::Dial(number) => write!(line, "ATD{number};"),
        HfpCommand::Answer => line.write_str("ATA"),
        HfpCommand::Hangup => line.write_str("AT+CHUP"),
        HfpCommand::Dtmf(digit) => write!(line, "AT+VTS={digit}"),
        HfpCommand::DisableRemoteEchoCancel => line.write_str("AT+NREC=0"),
        HfpCommand::VoiceRecognition(on) => write!(line, "AT+BVRA={}", u8::from(*on)),
        HfpCommand::Volume {
            target: GainTarget::Speaker,
            level,
        } => write!(line, "AT+VGS={level}"),
        HfpCommand::Volume {
            target: GainTarget::Mic,
            level,
        } => write!(line, "AT+VGM={level}"),
        HfpCommand::Connect => line.write_str("AT+HFCONN"),
        HfpCommand::Disconnect => line.write_str("AT+HFDISC"),
        HfpCommand::Discoverable(on) => write!(line, "AT+HFPAIR={}", u8::from(*on)),
        HfpCommand::ForgetPairing => line.write_str("AT+HFFORGET"),
    }
    .and_then(|()| line.write_char('\r'))
    .map_err(|_| AtError::Overflow)?;
    Ok(line)
}

fn indication(input: &mut &str) -> ModalResult<HfpIndication> {
    alt((ring, clip, speaker_volume, mic_volume, slc, audio, auth, ok, error)).parse_next(input)
}

fn ring(input: &mut &str) -> ModalResult<HfpIndication> {
    "RING".value(HfpIndication::Ring).parse_next(input)
}

fn clip(input: &mut &str) -> ModalResult<HfpIndication> {
    preceded(
        ("+CLIP:", space0),
        (delimited('"', take_till(0.., '"'), '"'), opt(preceded(',', rest))),
    )
    .map(|(number, _): (&str, _)| {
        let mut digits = CallerNumber::new();
        for c in number.chars().filter(|c| c.is_ascii_digit() || *c == '+') {
            if digits.push(c).is_err() {
                break;
            }
        }
        HfpIndication::CallerNumber(digits)
    })
    .parse_next(input)
}

fn ciev(input: &mut &str) -> ModalResult<(u8, u8)> {
    preceded(
        ("+CIEV:", space0),
        separated_pair(
            dec_uint::<_, u8, _>,
            (space0, ',', space0),
            dec_uint::<_, u8, _>,
        ),
    )
    .parse_next(input)
}

/// Positions found so far while walking a `+CIND` test response.
#[derive(Copy, Clone, Default)]
struct IndicatorScan {
    seen: u8,
    call: Option<u8>,
    call_setup: Option<u8>,
}

impl IndicatorScan {
    fn add(mut self, name: &str) -> Self {
        self.seen = self.seen.saturating_add(1);
        match name {
            "call" => self.call = Some(self.seen),
            "callsetup" | "call_setup" => self.call_setup = Some(self.seen),
            _ => {}
        }
        self
    }

    fn finish(self) -> Option<IndicatorMap> {
        Some(IndicatorMap {
            call: self.call?,
            call_setup: self.call_setup?,
        })
    }
}

/// `+CIND: ("service",(0,1)),("call",(0,1)),("callsetup",(0-3)),...`
fn indicator_list(input: &mut &str) -> ModalResult<IndicatorMap> {
    let entry = delimited(
        ('(', space0),
        separated_pair(
            delimited('"', take_till(0.., '"'), '"'),
            (space0, ',', space0),
            delimited('(', take_till(0.., ')'), ')'),
        ),
        (space0, ')'),
    )
    .map(|(name, _): (&str, &str)| name);

    preceded(
        ("+CIND:", space0),
        repeat(1.., terminated(entry, opt((space0, ',', space0))))
            .fold(IndicatorScan::default, |scan: IndicatorScan, name| scan.add(name)),
    )
    .verify_map(IndicatorScan::finish)
    .parse_next(input)
}

fn speaker_volume(input: &mut &str) -> ModalResult<HfpIndication> {
    preceded(("+VGS:", space0), dec_uint::<_, u8, _>)
        .map(|level| HfpIndication::Volume {
            target: GainTarget::Speaker,
            level,
        })
        .parse_next(input)
}

fn mic_volume(input: &mut &str) -> ModalResult<HfpIndication> {
    preceded(("+VGM:", space0), dec_uint::<_, u8, _>)
        .map(|level| HfpIndication::Volume {
            target: GainTarget::Mic,
            level,
        })
        .parse_next(input)
}

fn slc(input: &mut &str) -> ModalResult<HfpIndication> {
    preceded(
        ("+HFSLC:", space0),
        alt((
            '1'.value(HfpIndication::SlcConnected),
            '0'.value(HfpIndication::SlcDisconnected),
        )),
    )
    .parse_next(input)
}

fn audio(input: &mut &str) -> ModalResult<HfpIndication> {
    preceded(
        ("+HFAUDIO:", space0),
        alt((
            '0'.value(HfpIndication::AudioClosed),
            '1'.value(HfpIndication::AudioOpened { wideband: false }),
            '2'.value(HfpIndication::AudioOpened { wideband: true }),
        )),
    )
    .parse_next(input)
}

fn auth(input: &mut &str) -> ModalResult<HfpIndication> {
    preceded(
        ("+HFAUTH:", space0),
        alt((
            '1'.value(HfpIndication::AuthSucceeded),
            '0'.value(HfpIndication::AuthFailed),
        )),
    )
    .parse_next(input)
}

fn ok(input: &mut &str) -> ModalResult<HfpIndication> {
    "OK".value(HfpIndication::Ok).parse_next(input)
}

fn error(input: &mut &str) -> ModalResult<HfpIndication> {
    alt(("ERROR".void(), preceded("+CME ERROR:", rest).void()))
        .value(HfpIndication::Error)
        .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_indication(line: &str) -> Result<HfpIndication, AtError> {
        AtDecoder::new().decode(line)
    }

    #[test]
    fn parses_result_codes() {
        assert_eq!(parse_indication("RING\r\n"), Ok(HfpIndication::Ring));
        assert_eq!(parse_indication("OK"), Ok(HfpIndication::Ok));
        assert_eq!(parse_indication("+CME ERROR: 30"), Ok(HfpIndication::Error));
        assert_eq!(
            parse_indication("+VGS: 11"),
            Ok(HfpIndication::Volume {
                target: GainTarget::Speaker,
                level: 11
            })
        );
        assert_eq!(parse_indication("+CIEV: 2,0"), Ok(HfpIndication::Call(false)));
        assert_eq!(
            parse_indication("+CIEV: 5,4"),
            Ok(HfpIndication::Indicator { index: 5, value: 4 })
        );
    }

    #[test]
    fn call_setup_values_are_kept_apart() {
        assert_eq!(
            parse_indication("+CIEV: 3,0"),
            Ok(HfpIndication::CallSetup(CallSetup::Idle))
        );
        assert_eq!(
            parse_indication("+CIEV: 3,1"),
            Ok(HfpIndication::CallSetup(CallSetup::Incoming))
        );
        assert_eq!(
            parse_indication("+CIEV: 3,2"),
            Ok(HfpIndication::CallSetup(CallSetup::Dialing))
        );
        assert_eq!(
            parse_indication("+CIEV: 3,3"),
            Ok(HfpIndication::CallSetup(CallSetup::Alerting))
        );
        assert_eq!(
            parse_indication("+CIEV: 3,7"),
            Ok(HfpIndication::Indicator { index: 3, value: 7 })
        );
    }

    #[test]
    fn indicator_positions_follow_the_handset() {
        let mut decoder = AtDecoder::new();
        let listed = decoder.decode(
            "+CIND: (\"service\",(0,1)),(\"signal\",(0-5)),(\"callsetup\",(0-3)),(\"call\",(0,1)),(\"battchg\",(0-5))",
        );
        let map = IndicatorMap {
            call: 4,
            call_setup: 3,
        };
        assert_eq!(listed, Ok(HfpIndication::IndicatorsMapped(map)));
        assert_eq!(decoder.indicators(), map);

        assert_eq!(decoder.decode("+CIEV: 4,1"), Ok(HfpIndication::Call(true)));
        assert_eq!(
            decoder.decode("+CIEV: 3,1"),
            Ok(HfpIndication::CallSetup(CallSetup::Incoming))
        );
        assert_eq!(
            decoder.decode("+CIEV: 2,1"),
            Ok(HfpIndication::Indicator { index: 2, value: 1 })
        );

        assert_eq!(decoder.decode("+HFSLC: 0"), Ok(HfpIndication::SlcDisconnected));
        assert_eq!(decoder.indicators(), IndicatorMap::DEFAULT);
        assert_eq!(decoder.decode("+CIEV: 2,1"), Ok(HfpIndication::Call(true)));
    }

    #[test]
    fn indicator_list_without_call_entries_is_rejected() {
        let mut decoder = AtDecoder::new();
        assert_eq!(
            decoder.decode("+CIND: (\"service\",(0,1)),(\"signal\",(0-5))"),
            Err(AtError::Unrecognized)
        );
        assert_eq!(decoder.indicators(), IndicatorMap::DEFAULT);
    }

    #[test]
    fn clip_keeps_only_number_characters() {
        let parsed = parse_indication("+CLIP: \"+1 (555) 010-2000\",145").expect("clip");
        let HfpIndication::CallerNumber(number) = parsed else {
            panic!("unexpected {parsed:?}");
        };
        assert_eq!(number.as_str(), "+15550102000");

        assert_eq!(
            parse_indication("+CLIP: \"\",128"),
            Ok(HfpIndication::CallerNumber(CallerNumber::new()))
        );
    }

    #[test]
    fn parses_link_lines() {
        assert_eq!(parse_indication("+HFSLC: 1"), Ok(HfpIndication::SlcConnected));
        assert_eq!(
            parse_indication("+HFAUDIO: 2"),
            Ok(HfpIndication::AudioOpened { wideband: true })
        );
        assert_eq!(parse_indication("+HFAUDIO:0"), Ok(HfpIndication::AudioClosed));
        assert_eq!(parse_indication("+HFAUTH: 0"), Ok(HfpIndication::AuthFailed));
    }

    #[test]
    fn rejects_unknown_lines() {
        assert_eq!(parse_indication("   "), Err(AtError::Empty));
        assert_eq!(parse_indication("+BSIR: 1"), Err(AtError::Unrecognized));
        assert_eq!(parse_indication("RINGING"), Err(AtError::Unrecognized));
    }

    #[test]
    fn formats_commands() {
        let number = crate::bus::OutgoingNumber::try_from("5512").expect("fits");
        let line = format_command(&HfpCommand::Dial(number)).expect("dial");
        assert_eq!(line.as_str(), "ATD5512;\r");
        let line = format_command(&HfpCommand::Volume {
            target: GainTarget::Mic,
            level: 8,
        })
        .expect("volume");
        assert_eq!(line.as_str(), "AT+VGM=8\r");
        let line = format_command(&HfpCommand::VoiceRecognition(false)).expect("bvra");
        assert_eq!(line.as_str(), "AT+BVRA=0\r");
    }
}
