//! Switch-hook debounce and the on-hook hold that separates hang-ups from
//! rotary pulses.

use crate::ticks::Elapsed;

/// Line state as seen by the rest of the POTS side.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HookState {
    OnHook,
    OffHook,
    /// Back on-hook, but not for long enough to count as a hang-up.
    OnHookProvisional,
}

/// Accepts a level only after two consecutive agreeing samples.
#[derive(Copy, Clone, Debug, Default)]
pub struct HookDebounce {
    previous: bool,
    accepted: bool,
}

impl HookDebounce {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            previous: false,
            accepted: false,
        }
    }

    /// Feeds one raw sample. Returns the new level when it changes.
    pub fn sample(&mut self, off_hook: bool) -> Option<bool> {
        let changed = off_hook == self.previous && off_hook != self.accepted;
        self.previous = off_hook;
        if changed {
            self.accepted = off_hook;
            Some(off_hook)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn is_off_hook(&self) -> bool {
        self.accepted
    }
}

/// Final hook transitions reported to the orchestrator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HookTransition {
    WentOffHook,
    WentOnHook,
}

#[derive(Copy, Clone, Debug)]
pub struct HookMachine {
    state: HookState,
    held: Elapsed,
    hold_ticks: u32,
}

impl HookMachine {
    /// `hold_ticks` is how long the line must stay on-hook to end a call.
    #[must_use]
    pub const fn new(hold_ticks: u32) -> Self {
        Self {
            state: HookState::OnHook,
            held: Elapsed::new(),
            hold_ticks,
        }
    }

    #[must_use]
    pub const fn state(&self) -> HookState {
        self.state
    }

    /// Advances one tick given the debounced change, if any.
    pub fn update(&mut self, change: Option<bool>) -> Option<HookTransition> {
        match self.state {
            HookState::OnHook => {
                if change == Some(true) {
                    self.state = HookState::OffHook;
                    return Some(HookTransition::WentOffHook);
                }
            }
            HookState::OffHook => {
                if change == Some(false) {
                    self.state = HookState::OnHookProvisional;
                    self.held.reset();
                }
            }
            HookState::OnHookProvisional => {
                let held = self.held.tick();
                if change == Some(true) {
                    self.state = HookState::OffHook;
                } else if held >= self.hold_ticks {
                    self.state = HookState::OnHook;
                    return Some(HookTransition::WentOnHook);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sample_glitch_is_ignored() {
        let mut debounce = HookDebounce::new();
        assert_eq!(debounce.sample(true), None);
        assert_eq!(debounce.sample(false), None);
        assert_eq!(debounce.sample(true), None);
        assert_eq!(debounce.sample(true), Some(true));
        assert_eq!(debounce.sample(true), None);
        assert!(debounce.is_off_hook());
    }

    #[test]
    fn short_on_hook_is_provisional() {
        let mut hook = HookMachine::new(50);
        assert_eq!(hook.update(Some(true)), Some(HookTransition::WentOffHook));
        assert_eq!(hook.update(Some(false)), None);
        assert_eq!(hook.state(), HookState::OnHookProvisional);
        for _ in 0..10 {
            assert_eq!(hook.update(None), None);
        }
        assert_eq!(hook.update(Some(true)), None);
        assert_eq!(hook.state(), HookState::OffHook);
    }

    #[test]
    fn hang_up_needs_the_full_hold() {
        let mut hook = HookMachine::new(50);
        hook.update(Some(true));
        hook.update(Some(false));
        for _ in 0..49 {
            assert_eq!(hook.update(None), None);
        }
        assert_eq!(hook.update(None), Some(HookTransition::WentOnHook));
        assert_eq!(hook.state(), HookState::OnHook);
    }
}
