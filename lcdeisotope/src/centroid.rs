//! A single spectrum's centroid peaks prepared for deisotoping
use std::ops::Range;

use mzpeaks::prelude::*;
use tracing::trace;

use crate::error::DeisotopeError;
use crate::peaks::CentroidPeak;

/// The centroid peaks of one spectrum, sorted by ascending m/z, with a forward-only
/// cursor over peak groups.
///
/// A peak group is a maximal run of peaks where each neighboring pair is no more
/// than `peak_group_distance` apart.
#[derive(Debug, Clone, Default)]
pub struct CentroidData {
    peaks: Vec<CentroidPeak>,
    peak_group_distance: f64,
    cursor: usize,
    noise: f64,
    pub scan: Option<u32>,
    pub retention_time: Option<f64>,
}

fn check_sorted(peaks: &[CentroidPeak]) -> Result<(), DeisotopeError> {
    for (i, p) in peaks.iter().enumerate() {
        if !p.mass.is_finite() {
            return Err(DeisotopeError::NonFiniteMass { index: i });
        }
        if i > 0 && peaks[i - 1].mass > p.mass {
            return Err(DeisotopeError::UnsortedPeaks { index: i });
        }
    }
    Ok(())
}

impl CentroidData {
    /// Wrap an m/z-sorted peak list
    pub fn new(peaks: Vec<CentroidPeak>, peak_group_distance: f64) -> Result<Self, DeisotopeError> {
        check_sorted(&peaks)?;
        if !(peak_group_distance > 0.0) {
            return Err(DeisotopeError::InvalidParameter(format!(
                "peak_group_distance must be positive, got {peak_group_distance}"
            )));
        }
        Ok(Self {
            peaks,
            peak_group_distance,
            ..Default::default()
        })
    }

    /// Sort the peak list by m/z before wrapping it
    pub fn from_unsorted(
        mut peaks: Vec<CentroidPeak>,
        peak_group_distance: f64,
    ) -> Result<Self, DeisotopeError> {
        if let Some(index) = peaks.iter().position(|p| !p.mass.is_finite()) {
            return Err(DeisotopeError::NonFiniteMass { index });
        }
        peaks.sort_by(|a, b| a.mass.total_cmp(&b.mass));
        Self::new(peaks, peak_group_distance)
    }

    pub fn from_peak_set<C: CentroidLike>(
        peaks: &[C],
        peak_group_distance: f64,
    ) -> Result<Self, DeisotopeError> {
        let peaks = peaks
            .iter()
            .map(|p| CentroidPeak::new(p.mz(), p.intensity() as f64))
            .collect();
        Self::from_unsorted(peaks, peak_group_distance)
    }

    /// Annotate the spectrum, and every peak in it, with its scan number and retention time
    pub fn with_scan(mut self, scan: u32, retention_time: Option<f64>) -> Self {
        self.scan = Some(scan);
        self.retention_time = retention_time;
        for p in self.peaks.iter_mut() {
            p.retention_time = retention_time;
        }
        self
    }

    pub fn get(&self) -> &[CentroidPeak] {
        &self.peaks
    }

    pub fn get_mut(&mut self) -> &mut [CentroidPeak] {
        &mut self.peaks
    }

    pub fn into_peaks(self) -> Vec<CentroidPeak> {
        self.peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn peak_group_distance(&self) -> f64 {
        self.peak_group_distance
    }

    pub fn reset_peak_group_iter(&mut self) {
        self.cursor = 0;
    }

    /// Advance the cursor past the next peak group and return its index range
    pub fn next_peak_group(&mut self) -> Option<Range<usize>> {
        let group = next_group(&self.peaks, self.cursor, self.peak_group_distance)?;
        self.cursor = group.end;
        Some(group)
    }

    /// Iterate over all peak groups without disturbing the cursor
    pub fn peak_groups(&self) -> PeakGroupIter<'_> {
        PeakGroupIter {
            peaks: &self.peaks,
            distance: self.peak_group_distance,
            position: 0,
        }
    }

    /// Estimate the noise level as the intensity at `percentile` of all current
    /// peak intensities and store it.
    pub fn set_noise(&mut self, percentile: f64) -> Result<f64, DeisotopeError> {
        if !(0.0..=100.0).contains(&percentile) {
            return Err(DeisotopeError::InvalidParameter(format!(
                "noise percentile must be in [0, 100], got {percentile}"
            )));
        }
        self.noise = if self.peaks.is_empty() {
            0.0
        } else {
            let mut intensities: Vec<f64> = self.peaks.iter().map(|p| p.intensity).collect();
            intensities.sort_by(|a, b| a.total_cmp(b));
            let n = intensities.len();
            let index = ((percentile / 100.0 * n as f64).floor() as usize).min(n - 1);
            intensities[index]
        };
        trace!("Noise at the {percentile} percentile is {}", self.noise);
        Ok(self.noise)
    }

    pub fn noise(&self) -> f64 {
        self.noise
    }
}

fn next_group(peaks: &[CentroidPeak], start: usize, distance: f64) -> Option<Range<usize>> {
    if start >= peaks.len() {
        return None;
    }
    let mut end = start + 1;
    while end < peaks.len() && peaks[end].mass - peaks[end - 1].mass <= distance {
        end += 1;
    }
    Some(start..end)
}

/// An iterator over the peak groups of a [`CentroidData`]
#[derive(Debug, Clone)]
pub struct PeakGroupIter<'a> {
    peaks: &'a [CentroidPeak],
    distance: f64,
    position: usize,
}

impl Iterator for PeakGroupIter<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let group = next_group(self.peaks, self.position, self.distance)?;
        self.position = group.end;
        Some(group)
    }
}
