use std::cmp;

use crate::error::DeisotopeError;

/// The minimum and maximum charge state to consider, inclusive
pub type ChargeRange = (i32, i32);

pub fn validate_charge_range(charge_range: ChargeRange) -> Result<(), DeisotopeError> {
    let (min, max) = charge_range;
    if min < 1 || min > max {
        Err(DeisotopeError::InvalidChargeRange { min, max })
    } else {
        Ok(())
    }
}

/// Iterates over a [`ChargeRange`] from the highest charge to the lowest.
///
/// Higher charge states pack their isotopic peaks more tightly, so they are tried
/// before a lower charge state can claim a subset of the same peaks.
#[derive(Debug, Clone)]
pub struct ChargeRangeIter {
    pub min: i32,
    pub max: i32,
    current: i32,
}

impl ChargeRangeIter {
    pub fn new(min: i32, max: i32) -> ChargeRangeIter {
        let low = cmp::min(min.abs(), max.abs());
        let high = cmp::max(min.abs(), max.abs());
        ChargeRangeIter {
            min: low,
            max: high,
            current: high,
        }
    }

    pub fn next_charge(&mut self) -> Option<i32> {
        if self.current < self.min || self.current < 1 {
            None
        } else {
            let z = self.current;
            self.current -= 1;
            Some(z)
        }
    }

    pub fn len(&self) -> usize {
        if self.current < self.min {
            0
        } else {
            (self.current - cmp::max(self.min, 1) + 1).max(0) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for ChargeRangeIter {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        self.next_charge()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.len();
        (n, Some(n))
    }
}

impl ExactSizeIterator for ChargeRangeIter {}

impl From<ChargeRange> for ChargeRangeIter {
    fn from(pair: ChargeRange) -> ChargeRangeIter {
        ChargeRangeIter::new(pair.0, pair.1)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_descending() {
        let charges: Vec<_> = ChargeRangeIter::new(1, 3).collect();
        assert_eq!(charges, vec![3, 2, 1]);

        let charges: Vec<_> = ChargeRangeIter::from((2, 2)).collect();
        assert_eq!(charges, vec![2]);

        let it = ChargeRangeIter::new(1, 8);
        assert_eq!(it.len(), 8);
    }

    #[test]
    fn test_validate() {
        assert!(validate_charge_range((1, 4)).is_ok());
        assert!(validate_charge_range((3, 2)).is_err());
        assert!(validate_charge_range((0, 2)).is_err());
    }
}
