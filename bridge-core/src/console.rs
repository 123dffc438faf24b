//! Line grammar for the bridge console.
//!
//! The emulator reads one command per line and feeds it here; each command
//! stands in for a stimulus the real hardware would deliver (a hook switch, a
//! rotary pulse train, a line from the radio co-processor, a UI action).

use core::fmt;

use winnow::ascii::{dec_uint, float, space1};
use winnow::combinator::{alt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use crate::callerid::{CallerNumber, MAX_CALLER_DIGITS};
use crate::cellular::CallSetup;
use crate::gain::GainTarget;

pub const HELP: &str = "\
help                      this text
status                    show state machines
tick <n>                  advance time by n milliseconds
hook on|off               hang up or lift the handset
rotary <digit>            dial a digit by pulses
dtmf <digit>              dial a digit by tone
ui digit <d>              enter a digit from the UI
ui dial                   dial the entered number
ui delete                 remove the last digit
ring                      radio reports RING
clip <number>|none        radio reports caller number
slc up|down               service level connection
callsetup incoming|dialing|alerting|idle
                          call setup indicator (active = dialing)
audio 8k|16k|off          audio link state
gain mic|speaker <db>     UI gain change
remote mic|speaker <lvl>  handset volume change (0..15)
country <index>           select country profile
mute ring | unmute ring   do-not-disturb
exit                      quit";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UiCommand {
    Digit(char),
    Dial,
    Delete,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AudioLink {
    Narrowband,
    Wideband,
    Closed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConsoleCommand {
    Help,
    Status,
    Tick(u32),
    Hook { off_hook: bool },
    Rotary(char),
    Dtmf(char),
    Ui(UiCommand),
    Ring,
    /// `None` when the network withheld the number.
    Clip(Option<CallerNumber>),
    Slc(bool),
    CallSetup(CallSetup),
    Audio(AudioLink),
    Gain { target: GainTarget, db: f32 },
    Remote { target: GainTarget, level: u8 },
    Country(u8),
    MuteRing(bool),
    Exit,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleError {
    Empty,
    /// Parsing stopped at this byte offset.
    Syntax { offset: usize },
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Empty => f.write_str("empty command"),
            ConsoleError::Syntax { offset } => write!(f, "syntax error at column {}", offset + 1),
        }
    }
}

/// Parses one console line.
///
/// # Errors
///
/// [`ConsoleError::Empty`] for a blank line and [`ConsoleError::Syntax`] for
/// anything the grammar rejects.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ConsoleError::Empty);
    }
    alt((
        "help".value(ConsoleCommand::Help),
        "status".value(ConsoleCommand::Status),
        "exit".value(ConsoleCommand::Exit),
        "ring".value(ConsoleCommand::Ring),
        tick,
        hook,
        rotary,
        dtmf,
        ui,
        clip,
        slc,
        call_setup,
        audio,
        gain,
        remote,
        country,
        mute,
    ))
    .parse(line)
    .map_err(|err| ConsoleError::Syntax {
        offset: err.offset(),
    })
}

fn keyword<'i>(word: &'static str) -> impl Parser<&'i str, (), ErrMode<ContextError>> {
    (word, space1).void()
}

fn target(input: &mut &str) -> ModalResult<GainTarget> {
    alt((
        "mic".value(GainTarget::Mic),
        "speaker".value(GainTarget::Speaker),
    ))
    .parse_next(input)
}

fn dial_digit(input: &mut &str) -> ModalResult<char> {
    one_of(('0'..='9', '*', '#', 'A'..='D')).parse_next(input)
}

fn tick(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(keyword("tick"), dec_uint)
        .map(ConsoleCommand::Tick)
        .parse_next(input)
}

fn hook(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(
        keyword("hook"),
        alt(("on".value(false), "off".value(true))),
    )
    .map(|off_hook| ConsoleCommand::Hook { off_hook })
    .parse_next(input)
}

fn rotary(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(keyword("rotary"), one_of('0'..='9'))
        .map(ConsoleCommand::Rotary)
        .parse_next(input)
}

fn dtmf(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(keyword("dtmf"), dial_digit)
        .map(ConsoleCommand::Dtmf)
        .parse_next(input)
}

fn ui(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(
        keyword("ui"),
        alt((
            preceded(keyword("digit"), dial_digit).map(UiCommand::Digit),
            "dial".value(UiCommand::Dial),
            "delete".value(UiCommand::Delete),
        )),
    )
    .map(ConsoleCommand::Ui)
    .parse_next(input)
}

fn clip(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(
        keyword("clip"),
        alt((
            "none".value(None),
            take_while(1..=MAX_CALLER_DIGITS, |c: char| c.is_ascii_digit() || c == '+')
                .verify_map(|digits: &str| CallerNumber::try_from(digits).ok())
                .map(Some),
        )),
    )
    .map(ConsoleCommand::Clip)
    .parse_next(input)
}

fn slc(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(keyword("slc"), alt(("up".value(true), "down".value(false))))
        .map(ConsoleCommand::Slc)
        .parse_next(input)
}

fn call_setup(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(
        keyword("callsetup"),
        alt((
            "incoming".value(CallSetup::Incoming),
            "dialing".value(CallSetup::Dialing),
            "active".value(CallSetup::Dialing),
            "alerting".value(CallSetup::Alerting),
            "idle".value(CallSetup::Idle),
        )),
    )
    .map(ConsoleCommand::CallSetup)
    .parse_next(input)
}

fn audio(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(
        keyword("audio"),
        alt((
            "8k".value(AudioLink::Narrowband),
            "16k".value(AudioLink::Wideband),
            "off".value(AudioLink::Closed),
        )),
    )
    .map(ConsoleCommand::Audio)
    .parse_next(input)
}

fn gain(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(keyword("gain"), (target, preceded(space1, float)))
        .map(|(target, db)| ConsoleCommand::Gain { target, db })
        .parse_next(input)
}

fn remote(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(keyword("remote"), (target, preceded(space1, dec_uint)))
        .map(|(target, level)| ConsoleCommand::Remote { target, level })
        .parse_next(input)
}

fn country(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(keyword("country"), dec_uint)
        .map(ConsoleCommand::Country)
        .parse_next(input)
}

fn mute(input: &mut &str) -> ModalResult<ConsoleCommand> {
    alt((
        (keyword("mute"), "ring").value(ConsoleCommand::MuteRing(true)),
        (keyword("unmute"), "ring").value(ConsoleCommand::MuteRing(false)),
    ))
    .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_line_stimuli() {
        assert_eq!(parse_command("hook off"), Ok(ConsoleCommand::Hook { off_hook: true }));
        assert_eq!(parse_command("  rotary 7 "), Ok(ConsoleCommand::Rotary('7')));
        assert_eq!(parse_command("dtmf #"), Ok(ConsoleCommand::Dtmf('#')));
        assert_eq!(parse_command("tick 2500"), Ok(ConsoleCommand::Tick(2500)));
    }

    #[test]
    fn parses_radio_stimuli() {
        assert_eq!(
            parse_command("clip +15551234"),
            Ok(ConsoleCommand::Clip(Some(CallerNumber::try_from("+15551234").expect("fits"))))
        );
        assert_eq!(parse_command("clip none"), Ok(ConsoleCommand::Clip(None)));
        assert_eq!(
            parse_command("callsetup incoming"),
            Ok(ConsoleCommand::CallSetup(CallSetup::Incoming))
        );
        assert_eq!(
            parse_command("callsetup active"),
            Ok(ConsoleCommand::CallSetup(CallSetup::Dialing))
        );
        assert_eq!(parse_command("audio 16k"), Ok(ConsoleCommand::Audio(AudioLink::Wideband)));
        assert_eq!(
            parse_command("remote speaker 12"),
            Ok(ConsoleCommand::Remote {
                target: GainTarget::Speaker,
                level: 12
            })
        );
    }

    #[test]
    fn parses_ui_commands() {
        assert_eq!(parse_command("ui digit 0"), Ok(ConsoleCommand::Ui(UiCommand::Digit('0'))));
        assert_eq!(parse_command("ui delete"), Ok(ConsoleCommand::Ui(UiCommand::Delete)));
        assert_eq!(
            parse_command("gain mic -7.5"),
            Ok(ConsoleCommand::Gain {
                target: GainTarget::Mic,
                db: -7.5
            })
        );
        assert_eq!(parse_command("unmute ring"), Ok(ConsoleCommand::MuteRing(false)));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse_command("   "), Err(ConsoleError::Empty));
        assert!(matches!(parse_command("rotary *"), Err(ConsoleError::Syntax { .. })));
        assert!(matches!(parse_command("hook sideways"), Err(ConsoleError::Syntax { .. })));
        assert!(matches!(parse_command("ringing"), Err(ConsoleError::Syntax { .. })));
        assert!(matches!(parse_command("country 300"), Err(ConsoleError::Syntax { .. })));
    }
}
