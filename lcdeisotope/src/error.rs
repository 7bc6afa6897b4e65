//! Error conditions raised when the inputs to deisotoping or elution aggregation
//! violate a precondition.
//!
//! Failing to find an isotopic pattern is not an error, it is reported with [`Option::None`].
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeisotopeError {
    #[error("Peaks must be sorted by ascending m/z, but peak {index} is lower than its predecessor")]
    UnsortedPeaks { index: usize },
    #[error("Peak {index} has a non-finite m/z")]
    NonFiniteMass { index: usize },
    #[error("The charge range {min} to {max} is invalid, charges must be positive and min <= max")]
    InvalidChargeRange { min: i32, max: i32 },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Invalid isotope table: {0}")]
    InvalidIsotopeTable(String),
    #[error("An elution peak already exists at m/z {mz:0.5} with apex scan {scan}")]
    DuplicateElutionPeak { mz: f64, scan: u32 },
    #[error("Scan {current} was added after scan {previous}, scans must be added in order")]
    ScanOutOfOrder { previous: u32, current: u32 },
}
