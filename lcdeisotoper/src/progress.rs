use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Running counts of the work done over a run
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub spectra_processed: usize,
    /// Spectra passed over because of their MS level, time, or signal continuity
    pub spectra_skipped: usize,
    pub mono_peaks: usize,
    pub elution_peaks: usize,
}

impl ProgressRecord {
    pub fn sum(self, other: Self) -> Self {
        self + other
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.spectra_processed += rhs.spectra_processed;
        self.spectra_skipped += rhs.spectra_skipped;
        self.mono_peaks += rhs.mono_peaks;
        self.elution_peaks += rhs.elution_peaks;
    }
}

impl Sum for ProgressRecord {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Self::sum)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_accumulate() {
        let a = ProgressRecord {
            spectra_processed: 2,
            mono_peaks: 10,
            ..Default::default()
        };
        let b = ProgressRecord {
            spectra_processed: 1,
            spectra_skipped: 4,
            mono_peaks: 3,
            ..Default::default()
        };
        let total: ProgressRecord = [a, b].into_iter().sum();
        assert_eq!(total.spectra_processed, 3);
        assert_eq!(total.spectra_skipped, 4);
        assert_eq!(total.mono_peaks, 13);
        assert_eq!(total.elution_peaks, 0);
    }
}
