//! Dialed-number buffer shared between the line side and the display.

use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::{String, Vec};

/// Longest number the bridge will collect.
pub const MAX_DIGITS: usize = 256;

/// Where a dialed digit came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DigitSource {
    Rotary,
    Dtmf,
    App,
}

impl DigitSource {
    /// Digits decoded from the telephone itself.
    #[must_use]
    pub const fn is_line(self) -> bool {
        matches!(self, Self::Rotary | Self::Dtmf)
    }
}

/// A digit together with its origin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DialedDigit {
    pub digit: char,
    pub source: DigitSource,
}

impl DialedDigit {
    #[must_use]
    pub const fn new(digit: char, source: DigitSource) -> Self {
        Self { digit, source }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DialBufferError {
    Full,
    InvalidDigit(char),
}

impl fmt::Display for DialBufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "dial buffer holds {MAX_DIGITS} digits already"),
            Self::InvalidDigit(c) => write!(f, "`{c}` is not a dialable digit"),
        }
    }
}

/// Returns `true` for characters that can be dialed or sent as DTMF.
#[must_use]
pub const fn is_dial_char(c: char) -> bool {
    matches!(c, '0'..='9' | '*' | '#' | 'A'..='D')
}

/// Ordered, bounded digit sequence with per-digit source tags.
#[derive(Clone, Debug, Default)]
pub struct DialBuffer {
    digits: Vec<DialedDigit, MAX_DIGITS>,
}

impl DialBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self { digits: Vec::new() }
    }

    /// Appends a digit.
    ///
    /// # Errors
    ///
    /// Fails when the buffer is full or `digit` is not dialable.
    pub fn push(&mut self, digit: DialedDigit) -> Result<(), DialBufferError> {
        if !is_dial_char(digit.digit) {
            return Err(DialBufferError::InvalidDigit(digit.digit));
        }
        self.digits.push(digit).map_err(|_| DialBufferError::Full)
    }

    /// Removes the most recent digit.
    pub fn pop(&mut self) -> Option<DialedDigit> {
        self.digits.pop()
    }

    pub fn clear(&mut self) {
        self.digits.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.digits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.digits.is_full()
    }

    #[must_use]
    pub fn last(&self) -> Option<DialedDigit> {
        self.digits.last().copied()
    }

    /// Copies the digits into a string without source tags.
    #[must_use]
    pub fn number(&self) -> String<MAX_DIGITS> {
        let mut number = String::new();
        for entry in &self.digits {
            // Capacity matches the digit vector, so this cannot fail.
            let _ = number.push(entry.digit);
        }
        number
    }

    pub fn iter(&self) -> impl Iterator<Item = &DialedDigit> {
        self.digits.iter()
    }
}

/// A [`DialBuffer`] behind a short-held lock for cross-task access.
pub struct SharedDialBuffer<M: RawMutex> {
    inner: Mutex<M, RefCell<DialBuffer>>,
}

impl<M: RawMutex> SharedDialBuffer<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(DialBuffer::new())),
        }
    }

    /// Runs `f` with exclusive access to the buffer.
    pub fn with<R>(&self, f: impl FnOnce(&mut DialBuffer) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    #[must_use]
    pub fn number(&self) -> String<MAX_DIGITS> {
        self.with(|buffer| buffer.number())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.with(|buffer| buffer.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<M: RawMutex> Default for SharedDialBuffer<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_order_and_sources() {
        let mut buffer = DialBuffer::new();
        buffer
            .push(DialedDigit::new('5', DigitSource::Rotary))
            .expect("push rotary");
        buffer
            .push(DialedDigit::new('#', DigitSource::App))
            .expect("push app");

        assert_eq!(buffer.number().as_str(), "5#");
        assert_eq!(buffer.last().map(|d| d.source), Some(DigitSource::App));
        assert_eq!(buffer.pop().map(|d| d.digit), Some('#'));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn rejects_digits_past_capacity() {
        let mut buffer = DialBuffer::new();
        for _ in 0..MAX_DIGITS {
            buffer
                .push(DialedDigit::new('1', DigitSource::Dtmf))
                .expect("room left");
        }
        assert_eq!(
            buffer.push(DialedDigit::new('2', DigitSource::Dtmf)),
            Err(DialBufferError::Full)
        );
        assert!(buffer.is_full());
    }

    #[test]
    fn rejects_non_dial_characters() {
        let mut buffer = DialBuffer::new();
        assert_eq!(
            buffer.push(DialedDigit::new('x', DigitSource::App)),
            Err(DialBufferError::InvalidDigit('x'))
        );
    }
}
