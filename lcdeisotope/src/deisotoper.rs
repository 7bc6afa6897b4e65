//! Greedy charge state deconvolution of a single spectrum
use std::mem;
use std::ops::Range;

use tracing::{debug, trace};

use crate::centroid::CentroidData;
use crate::charge::ChargeRangeIter;
use crate::error::DeisotopeError;
use crate::isotopic_dist::IsotopicDist;
use crate::isotopic_model::{isotopic_shift, IsotopeTable};
use crate::params::DeisotoperParams;
use crate::peaks::{CentroidPeak, DeconvPeak};

/// The fewest peaks that can form an isotopic series
pub const MIN_PEAK_GROUP_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedOutcome {
    Accepted,
    Deferred,
    Unmatched,
}

/// Assigns charge states to monoisotopic peaks by greedily fitting and subtracting
/// isotopic patterns.
///
/// Within each peak group, peaks are visited from high to low m/z, and for each peak
/// the charge states are tried from highest to lowest. The first charge state that
/// yields a consistent isotopic series is accepted and its fitted signal subtracted
/// before moving on.
#[derive(Debug, Clone)]
pub struct Deisotoper {
    params: DeisotoperParams,
    isotopic_dist: IsotopicDist,
    deconv_peaks: Vec<DeconvPeak>,
}

impl Deisotoper {
    pub fn new(params: DeisotoperParams, table: IsotopeTable) -> Result<Self, DeisotopeError> {
        params.validate()?;
        Ok(Self {
            isotopic_dist: IsotopicDist::new(params.isotopic, table),
            params,
            deconv_peaks: Vec::new(),
        })
    }

    pub fn params(&self) -> &DeisotoperParams {
        &self.params
    }

    pub fn isotopic_dist(&self) -> &IsotopicDist {
        &self.isotopic_dist
    }

    /// Wrap `peaks` in a [`CentroidData`] using this deisotoper's peak grouping distance
    pub fn centroid_data(&self, peaks: Vec<CentroidPeak>) -> Result<CentroidData, DeisotopeError> {
        CentroidData::from_unsorted(peaks, self.params.peak_group_distance)
    }

    pub fn deconv_peaks(&self) -> &[DeconvPeak] {
        &self.deconv_peaks
    }

    pub fn take_deconv_peaks(&mut self) -> Vec<DeconvPeak> {
        mem::take(&mut self.deconv_peaks)
    }

    /// The minimum intensity a peak must have to seed or join an isotopic series.
    ///
    /// The noise level is always estimated so that signal-to-noise can be reported.
    fn threshold(&self, data: &mut CentroidData) -> Result<f64, DeisotopeError> {
        let noise = data.set_noise(self.params.noise_percentile)?;
        Ok(self.params.intensity_floor.unwrap_or(noise))
    }

    /// Whether `peaks[index]` would be the first isotopic peak of a series with the same charge
    /// starting one isotopic spacing below it.
    fn is_isotope_of_lower_peak(
        &self,
        peaks: &[CentroidPeak],
        group: &Range<usize>,
        index: usize,
        charge: i32,
        theta: f64,
    ) -> bool {
        let target = peaks[index].mass - isotopic_shift(charge);
        self.isotopic_dist
            .find_isotope(peaks, group.start, index, target, theta)
            .and_then(|lower| {
                self.isotopic_dist
                    .get_matching_peaks(peaks, lower, group.end, charge, theta)
            })
            .is_some_and(|m| m.indices.get(1) == Some(&index))
    }

    /// Try each charge state for the seed at `peaks[index]`, from highest to lowest, and
    /// accept the first consistent isotopic series.
    ///
    /// When `allow_defer` is set and the seed would be the first isotope of a series one
    /// spacing lower, it is left for that lower peak and [`SeedOutcome::Deferred`] is returned.
    #[allow(clippy::too_many_arguments)]
    fn fit_seed(
        &mut self,
        peaks: &mut [CentroidPeak],
        group: &Range<usize>,
        index: usize,
        theta: f64,
        noise: f64,
        scan: Option<u32>,
        allow_defer: bool,
    ) -> SeedOutcome {
        for charge in ChargeRangeIter::new(self.params.min_charge, self.params.max_charge) {
            let Some(isotope_match) =
                self.isotopic_dist
                    .get_matching_peaks(peaks, index, group.end, charge, theta)
            else {
                continue;
            };
            if allow_defer && self.is_isotope_of_lower_peak(peaks, group, index, charge, theta) {
                trace!(
                    "Deferring {:0.4} with charge {charge} to a lower monoisotopic peak",
                    peaks[index].mass
                );
                return SeedOutcome::Deferred;
            }
            let mut mono = DeconvPeak::new(peaks[index].clone(), charge);
            mono.scan = scan;
            self.isotopic_dist
                .subtract_matching_peaks(peaks, &isotope_match, &mut mono);
            if noise > 0.0 {
                let signal_to_noise = mono.intensity / noise;
                mono.signal_to_noise = signal_to_noise;
            }
            trace!(
                "Accepted {:0.4} with charge {charge}, {} isotopes, score {:0.3}",
                mono.mass,
                mono.num_isotopes,
                mono.isotope_fit_score
            );
            self.deconv_peaks.push(mono);
            return SeedOutcome::Accepted;
        }
        SeedOutcome::Unmatched
    }

    fn deisotope_group(
        &mut self,
        peaks: &mut [CentroidPeak],
        group: Range<usize>,
        theta: f64,
        noise: f64,
        scan: Option<u32>,
    ) {
        let mut deferred = Vec::new();
        for i in group.clone().rev() {
            if group.end - i < MIN_PEAK_GROUP_SIZE || peaks[i].intensity < theta {
                continue;
            }
            if self.fit_seed(peaks, &group, i, theta, noise, scan, true) == SeedOutcome::Deferred {
                deferred.push(i);
            }
        }
        // The lower peak may have settled on another charge state and left a deferred
        // seed's series in place. Lowest first, so a seed deferred to another deferred
        // seed is only retried after it.
        for i in deferred.into_iter().rev() {
            if peaks[i].intensity < theta {
                continue;
            }
            trace!("Retrying deferred seed {:0.4}", peaks[i].mass);
            self.fit_seed(peaks, &group, i, theta, noise, scan, false);
        }
    }

    /// Deconvolve `data`, subtracting the fitted isotopic signal from its peaks in place.
    pub fn go(&mut self, data: &mut CentroidData) -> Result<&[DeconvPeak], DeisotopeError> {
        self.deconv_peaks.clear();
        let theta = self.threshold(data)?;
        let noise = data.noise();
        let scan = data.scan;

        let mut n_groups = 0usize;
        data.reset_peak_group_iter();
        while let Some(group) = data.next_peak_group() {
            n_groups += 1;
            if group.len() < MIN_PEAK_GROUP_SIZE {
                continue;
            }
            self.deisotope_group(data.get_mut(), group, theta, noise, scan);
        }
        debug!(
            "Found {} monoisotopic peaks among {} peaks in {n_groups} groups with theta {theta:0.3}",
            self.deconv_peaks.len(),
            data.len()
        );
        Ok(&self.deconv_peaks)
    }

    /// Collapse near-duplicate monoisotopic peaks, removing any peak less than half as
    /// intense as the most intense peak within twice the cleanup tolerance above a
    /// surviving peak. Returns the number of peaks removed.
    pub fn clean_deconv_peaks(&mut self) -> usize {
        let n = self.deconv_peaks.len();
        if n < 2 {
            return 0;
        }
        self.deconv_peaks
            .sort_by(|a, b| a.mass.total_cmp(&b.mass));

        let tolerance = self.params.cleanup_tolerance;
        let peaks = &self.deconv_peaks;
        let mut keep = vec![true; n];
        for i in 0..n {
            if !keep[i] {
                continue;
            }
            let upper = peaks[i].mass + 2.0 * tolerance.width(peaks[i].mass);
            let end = i + peaks[i..].partition_point(|p| p.mass <= upper);
            let apex = (i..end)
                .filter(|j| keep[*j])
                .map(|j| peaks[j].intensity)
                .fold(0.0, f64::max);
            for j in i..end {
                if keep[j] && peaks[j].intensity < apex / 2.0 {
                    keep[j] = false;
                }
            }
        }

        let mut flags = keep.into_iter();
        self.deconv_peaks
            .retain(|_| flags.next().unwrap_or(true));
        let removed = n - self.deconv_peaks.len();
        if removed > 0 {
            debug!("Removed {removed} duplicate monoisotopic peaks");
        }
        removed
    }

    /// Deconvolve `data`, clean up the result, and hand back the monoisotopic peaks
    pub fn process(&mut self, data: &mut CentroidData) -> Result<Vec<DeconvPeak>, DeisotopeError> {
        self.go(data)?;
        self.clean_deconv_peaks();
        Ok(self.take_deconv_peaks())
    }
}
