//! Coalescing event flags shared between the bridge tasks.
//!
//! Each consumer owns one [`EventFlags`] word. Producers raise bits at any
//! time; the consumer takes the whole word once per poll. Raising the same
//! event twice before the consumer polls is observed as a single event.

use core::fmt;
use core::marker::PhantomData;

use portable_atomic::{AtomicU32, Ordering};

/// A set of discrete events that fits in one flag word.
pub trait EventKind: Copy + Eq + fmt::Debug + 'static {
    /// Every variant, in bit order.
    const ALL: &'static [Self];

    /// Bit assigned to this event.
    fn bit(self) -> u32;
}

macro_rules! event_kinds {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $crate::events::EventKind for $name {
            const ALL: &'static [Self] = &[$(Self::$variant,)+];

            fn bit(self) -> u32 {
                1 << (self as u8)
            }
        }
    };
}

event_kinds! {
    /// Requests handled by the POTS signaling task.
    pub enum PotsEvent {
        InService,
        OutOfService,
        Audio8k,
        Audio16k,
        AudioClosed,
        MuteRing,
        UnmuteRing,
        Ring,
        DoneRinging,
        AppDigit,
        CountryChanged,
    }
}

event_kinds! {
    /// Radio indications and orchestrator commands handled by the cellular task.
    pub enum CellEvent {
        SlcConnected,
        SlcDisconnected,
        CallActive,
        CallIdle,
        CallSetupIncoming,
        CallSetupOutgoing,
        CallSetupIdle,
        AudioOpened,
        AudioClosed,
        AuthSucceeded,
        PowerDown,
        AnswerCall,
        HangupCall,
        DialNumber,
        DialAssistant,
        DialDtmf,
        MicGainChanged,
        SpeakerGainChanged,
        EnablePairing,
        DisablePairing,
        ForgetPairing,
    }
}

event_kinds! {
    /// Line, radio and UI events handled by the call orchestrator.
    pub enum CallEvent {
        OnHook,
        OffHook,
        PotsDigit,
        UiDigit,
        UiDelete,
        UiDial,
        InService,
        OutOfService,
        Ring,
        CallStarted,
        CallEnded,
        CallerIdAvailable,
        AudioStarted,
        AudioEnded,
        UiMicGain,
        UiSpeakerGain,
        RemoteMicGain,
        RemoteSpeakerGain,
        RingMute,
        RingUnmute,
    }
}

event_kinds! {
    /// Notifications for the display layer.
    pub enum DisplayEvent {
        StatusChanged,
        NumberChanged,
        CallerIdChanged,
        CallerIdBlocked,
        MicGainChanged,
        SpeakerGainChanged,
        Activity,
        ForgetPairing,
        FatalError,
    }
}

/// One consumer's flag word.
pub struct EventFlags<K> {
    bits: AtomicU32,
    _kind: PhantomData<fn() -> K>,
}

impl<K: EventKind> EventFlags<K> {
    /// Creates an empty flag word.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
            _kind: PhantomData,
        }
    }

    /// Marks `kind` as pending. Safe to call from any context.
    pub fn raise(&self, kind: K) {
        self.bits.fetch_or(kind.bit(), Ordering::AcqRel);
    }

    /// Returns every pending event and clears the word.
    #[must_use]
    pub fn take(&self) -> EventSet<K> {
        EventSet::from_bits(self.bits.swap(0, Ordering::AcqRel))
    }

    /// Returns the pending events without clearing them.
    #[must_use]
    pub fn peek(&self) -> EventSet<K> {
        EventSet::from_bits(self.bits.load(Ordering::Acquire))
    }
}

impl<K: EventKind> Default for EventFlags<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the events observed by one poll.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct EventSet<K> {
    bits: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K: EventKind> EventSet<K> {
    /// An empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self::from_bits(0)
    }

    const fn from_bits(bits: u32) -> Self {
        Self {
            bits,
            _kind: PhantomData,
        }
    }

    /// Returns `true` when `kind` was raised.
    #[must_use]
    pub fn contains(&self, kind: K) -> bool {
        self.bits & kind.bit() != 0
    }

    /// Adds `kind` to the set.
    pub fn insert(&mut self, kind: K) {
        self.bits |= kind.bit();
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Iterates the raised events in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = K> {
        let set = *self;
        K::ALL.iter().copied().filter(move |kind| set.contains(*kind))
    }
}

impl<K: EventKind> Default for EventSet<K> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K: EventKind> fmt::Debug for EventSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: EventKind> FromIterator<K> for EventSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_raises_coalesce_into_one_observation() {
        let flags = EventFlags::<CallEvent>::new();
        flags.raise(CallEvent::PotsDigit);
        flags.raise(CallEvent::PotsDigit);
        flags.raise(CallEvent::OffHook);

        let seen = flags.take();
        assert!(seen.contains(CallEvent::PotsDigit));
        assert!(seen.contains(CallEvent::OffHook));
        assert_eq!(seen.iter().count(), 2);
        assert!(flags.take().is_empty(), "take must clear the word");
    }

    #[test]
    fn peek_leaves_events_pending() {
        let flags = EventFlags::<PotsEvent>::new();
        flags.raise(PotsEvent::Ring);
        assert!(flags.peek().contains(PotsEvent::Ring));
        assert!(flags.take().contains(PotsEvent::Ring));
    }

    #[test]
    fn every_kind_fits_in_one_word() {
        assert!(PotsEvent::ALL.len() <= 32);
        assert!(CellEvent::ALL.len() <= 32);
        assert!(CallEvent::ALL.len() <= 32);
        assert!(DisplayEvent::ALL.len() <= 32);
    }

    #[test]
    fn iteration_follows_declaration_order() {
        let set: EventSet<DisplayEvent> = [DisplayEvent::FatalError, DisplayEvent::StatusChanged]
            .into_iter()
            .collect();
        let order: heapless::Vec<DisplayEvent, 4> = set.iter().collect();
        assert_eq!(
            order.as_slice(),
            &[DisplayEvent::StatusChanged, DisplayEvent::FatalError]
        );
    }
}
