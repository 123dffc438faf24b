//! Fixed-capacity collection for values returned from a single poll.
//!
//! A poll that has more to say than fits keeps the first entries and counts
//! the rest in [`Report::dropped`], in the same way [`SampleBuffer`] counts
//! its overflows.
//!
//! [`SampleBuffer`]: crate::audio::SampleBuffer

use core::ops::Deref;

use heapless::Vec;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Report<T, const N: usize> {
    items: Vec<T, N>,
    dropped: u32,
}

impl<T, const N: usize> Report<T, N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            dropped: 0,
        }
    }

    /// Appends `item`, or counts it as dropped when the report is full.
    pub fn record(&mut self, item: T) {
        if self.items.push(item).is_err() {
            self.dropped = self.dropped.saturating_add(1);
        }
    }

    /// Entries that did not fit.
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Entries kept plus entries dropped.
    #[must_use]
    pub fn total(&self) -> usize {
        self.items.len().saturating_add(self.dropped as usize)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T, const N: usize> Default for Report<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Deref for Report<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T, const N: usize> IntoIterator for Report<T, N> {
    type Item = T;
    type IntoIter = heapless::vec::IntoIter<T, N, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a Report<T, N> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_keeps_first_entries_and_counts_the_rest() {
        let mut report = Report::<u8, 2>::new();
        report.record(1);
        report.record(2);
        report.record(3);
        report.record(4);
        assert_eq!(report.as_slice(), &[1, 2]);
        assert_eq!(report.dropped(), 2);
        assert_eq!(report.total(), 4);
    }

    #[test]
    fn iterates_in_order() {
        let mut report = Report::<char, 4>::new();
        report.record('a');
        report.record('b');
        assert_eq!(report.iter().copied().collect::<Vec<char, 4>>().as_slice(), &['a', 'b']);
        assert_eq!(report.into_iter().last(), Some('b'));
        assert_eq!(Report::<char, 4>::default().dropped(), 0);
    }
}
