//! Event flags and payload slots connecting the bridge tasks.
//!
//! A payload slot holds the latest value that accompanies an event; like
//! the flags themselves, a newer value replaces an unread older one.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::String;

use crate::callerid::{CallerIdTime, CallerNumber};
use crate::dial_buffer::{DialedDigit, MAX_DIGITS, SharedDialBuffer};
use crate::events::{CallEvent, CellEvent, DisplayEvent, EventFlags, PotsEvent};
use crate::gain::NOMINAL_DB;

/// Outgoing number handed to the cellular side.
pub type OutgoingNumber = String<MAX_DIGITS>;

pub use crate::gain::GainTarget;

#[derive(Clone, Debug, Default)]
struct Slots {
    pots_digit: Option<DialedDigit>,
    ui_digit: Option<char>,
    app_digit: Option<char>,
    dtmf_digit: Option<char>,
    caller_number: Option<CallerNumber>,
    caller_id_time: Option<CallerIdTime>,
    outgoing_number: OutgoingNumber,
    remote_mic_level: u8,
    remote_speaker_level: u8,
    mic_db: f32,
    speaker_db: f32,
    country: u8,
}

/// Everything the bridge tasks exchange.
pub struct Bus<M: RawMutex> {
    pub pots: EventFlags<PotsEvent>,
    pub cell: EventFlags<CellEvent>,
    pub call: EventFlags<CallEvent>,
    pub display: EventFlags<DisplayEvent>,
    pub dial: SharedDialBuffer<M>,
    slots: Mutex<M, RefCell<Slots>>,
}

impl<M: RawMutex> Bus<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pots: EventFlags::new(),
            cell: EventFlags::new(),
            call: EventFlags::new(),
            display: EventFlags::new(),
            dial: SharedDialBuffer::new(),
            slots: Mutex::new(RefCell::new(Slots {
                pots_digit: None,
                ui_digit: None,
                app_digit: None,
                dtmf_digit: None,
                caller_number: None,
                caller_id_time: None,
                outgoing_number: String::new(),
                remote_mic_level: 0,
                remote_speaker_level: 0,
                mic_db: NOMINAL_DB,
                speaker_db: NOMINAL_DB,
                country: crate::country::DEFAULT_COUNTRY,
            })),
        }
    }

    fn with_slots<R>(&self, f: impl FnOnce(&mut Slots) -> R) -> R {
        self.slots.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// A digit decoded on the line, for the orchestrator.
    pub fn post_pots_digit(&self, digit: DialedDigit) {
        self.with_slots(|slots| slots.pots_digit = Some(digit));
        self.call.raise(CallEvent::PotsDigit);
    }

    #[must_use]
    pub fn take_pots_digit(&self) -> Option<DialedDigit> {
        self.with_slots(|slots| slots.pots_digit.take())
    }

    /// A digit entered on the display keypad, for the orchestrator.
    pub fn post_ui_digit(&self, digit: char) {
        self.with_slots(|slots| slots.ui_digit = Some(digit));
        self.call.raise(CallEvent::UiDigit);
    }

    #[must_use]
    pub fn take_ui_digit(&self) -> Option<char> {
        self.with_slots(|slots| slots.ui_digit.take())
    }

    /// A digit the POTS side should play as DTMF.
    pub fn post_app_digit(&self, digit: char) {
        self.with_slots(|slots| slots.app_digit = Some(digit));
        self.pots.raise(PotsEvent::AppDigit);
    }

    #[must_use]
    pub fn take_app_digit(&self) -> Option<char> {
        self.with_slots(|slots| slots.app_digit.take())
    }

    /// A digit to send to the handset as in-call DTMF.
    pub fn post_dtmf_digit(&self, digit: char) {
        self.with_slots(|slots| slots.dtmf_digit = Some(digit));
        self.cell.raise(CellEvent::DialDtmf);
    }

    #[must_use]
    pub fn take_dtmf_digit(&self) -> Option<char> {
        self.with_slots(|slots| slots.dtmf_digit.take())
    }

    /// Stores the caller number reported by the handset.
    pub fn post_caller_number(&self, number: Option<CallerNumber>) {
        self.with_slots(|slots| slots.caller_number = number);
        self.call.raise(CallEvent::CallerIdAvailable);
    }

    #[must_use]
    pub fn caller_number(&self) -> Option<CallerNumber> {
        self.with_slots(|slots| slots.caller_number.clone())
    }

    pub fn clear_caller_number(&self) {
        self.with_slots(|slots| slots.caller_number = None);
    }

    pub fn set_caller_id_time(&self, time: Option<CallerIdTime>) {
        self.with_slots(|slots| slots.caller_id_time = time);
    }

    #[must_use]
    pub fn caller_id_time(&self) -> Option<CallerIdTime> {
        self.with_slots(|slots| slots.caller_id_time)
    }

    /// Asks the cellular side to dial `number`.
    pub fn post_dial_number(&self, number: &str) {
        self.with_slots(|slots| {
            slots.outgoing_number.clear();
            // Both strings share the dial buffer capacity.
            let _ = slots.outgoing_number.push_str(number);
        });
        self.cell.raise(CellEvent::DialNumber);
    }

    #[must_use]
    pub fn outgoing_number(&self) -> OutgoingNumber {
        self.with_slots(|slots| slots.outgoing_number.clone())
    }

    /// Volume level (0..=15) reported by the handset.
    pub fn post_remote_gain(&self, target: GainTarget, level: u8) {
        self.with_slots(|slots| match target {
            GainTarget::Mic => slots.remote_mic_level = level,
            GainTarget::Speaker => slots.remote_speaker_level = level,
        });
        self.call.raise(match target {
            GainTarget::Mic => CallEvent::RemoteMicGain,
            GainTarget::Speaker => CallEvent::RemoteSpeakerGain,
        });
    }

    #[must_use]
    pub fn remote_gain(&self, target: GainTarget) -> u8 {
        self.with_slots(|slots| match target {
            GainTarget::Mic => slots.remote_mic_level,
            GainTarget::Speaker => slots.remote_speaker_level,
        })
    }

    /// Gain chosen on the display, for the orchestrator.
    pub fn post_ui_gain(&self, target: GainTarget, db: f32) {
        self.set_gain(target, db);
        self.call.raise(match target {
            GainTarget::Mic => CallEvent::UiMicGain,
            GainTarget::Speaker => CallEvent::UiSpeakerGain,
        });
    }

    /// Records the gain in effect without notifying anyone.
    pub fn set_gain(&self, target: GainTarget, db: f32) {
        self.with_slots(|slots| match target {
            GainTarget::Mic => slots.mic_db = db,
            GainTarget::Speaker => slots.speaker_db = db,
        });
    }

    /// Gain in effect, in dB.
    #[must_use]
    pub fn gain(&self, target: GainTarget) -> f32 {
        self.with_slots(|slots| match target {
            GainTarget::Mic => slots.mic_db,
            GainTarget::Speaker => slots.speaker_db,
        })
    }

    /// Selects a new country profile index for the POTS side.
    pub fn post_country(&self, index: u8) {
        self.with_slots(|slots| slots.country = index);
        self.pots.raise(PotsEvent::CountryChanged);
    }

    #[must_use]
    pub fn country(&self) -> u8 {
        self.with_slots(|slots| slots.country)
    }
}

impl<M: RawMutex> Default for Bus<M> {
    fn default() -> Self {
        Self::new()
    }
}
