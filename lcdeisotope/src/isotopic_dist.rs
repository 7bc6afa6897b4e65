/*! Matching observed isotopic series against theoretical abundances */
use tracing::trace;

use crate::isotopic_model::{isotopic_shift, neutral_mass, IsotopeTable};
use crate::params::IsotopicDistParams;
use crate::peaks::{CentroidPeak, DeconvPeak};

/// Describes an isotopic series matched in a spectrum. This is only meaningful
/// for the peak slice it was matched against, and only until that slice is modified.
#[derive(Debug, Clone, PartialEq)]
pub struct IsotopeMatch {
    /// The positions of the matched peaks, starting with the monoisotopic peak
    pub indices: Vec<usize>,
    /// The least squares scaling factor for the theoretical abundances
    pub alpha: f64,
    /// The mean absolute deviation in Da of the isotopic peaks from their expected positions
    pub mass_error: f64,
    pub charge: i32,
}

impl IsotopeMatch {
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn monoisotopic_index(&self) -> Option<usize> {
        self.indices.first().copied()
    }
}

fn least_squares_alpha(observed: &[f64], theoretical: &[f64]) -> f64 {
    let (num, den) = observed
        .iter()
        .zip(theoretical.iter())
        .fold((0.0, 0.0), |(num, den), (o, t)| (num + o * t, den + t * t));
    if den > 0.0 {
        num / den
    } else {
        f64::NAN
    }
}

/// Fits theoretical isotopic abundances to runs of observed peaks and subtracts
/// the fitted signal from them.
#[derive(Debug, Clone)]
pub struct IsotopicDist {
    params: IsotopicDistParams,
    table: IsotopeTable,
}

impl IsotopicDist {
    pub fn new(params: IsotopicDistParams, table: IsotopeTable) -> Self {
        Self { params, table }
    }

    pub fn params(&self) -> &IsotopicDistParams {
        &self.params
    }

    pub fn table(&self) -> &IsotopeTable {
        &self.table
    }

    /// The theoretical relative abundances for a monoisotopic peak at `mz` with `charge`
    pub fn expected_abundances(&self, mz: f64, charge: i32) -> &[f64] {
        self.table.abundances(neutral_mass(mz, charge))
    }

    /// Find the peak in `start..end` closest to `target` within tolerance that is at least
    /// `intensity_threshold` intense.
    pub(crate) fn find_isotope(
        &self,
        peaks: &[CentroidPeak],
        start: usize,
        end: usize,
        target: f64,
        intensity_threshold: f64,
    ) -> Option<usize> {
        let width = self.params.tolerance.width(target);
        let lo = target - width;
        let hi = target + width;
        let first = start + peaks[start..end].partition_point(|p| p.mass < lo);
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in peaks[first..end].iter().enumerate() {
            if p.mass > hi {
                break;
            }
            if p.intensity <= 0.0 || p.intensity < intensity_threshold {
                continue;
            }
            let err = (p.mass - target).abs();
            match best {
                Some((_, best_err)) if best_err <= err => {}
                _ => best = Some((first + i, err)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Try to match an isotopic series of `charge` starting at `peaks[start]`, searching
    /// for isotopic peaks in `start + 1..end`.
    ///
    /// Returns [`None`] when no isotopic peak follows the monoisotopic peak, when the fit
    /// is degenerate, or when the monoisotopic peak is less intense than the fitted
    /// pattern predicts. The series is truncated at the first isotope whose intensity
    /// falls short of the fitted pattern by more than the coefficient of variation.
    pub fn get_matching_peaks(
        &self,
        peaks: &[CentroidPeak],
        start: usize,
        end: usize,
        charge: i32,
        intensity_threshold: f64,
    ) -> Option<IsotopeMatch> {
        if charge < 1 || start >= end || end > peaks.len() {
            return None;
        }
        let mono = &peaks[start];
        if !(mono.intensity > 0.0) {
            return None;
        }
        let abundances = self.expected_abundances(mono.mass, charge);
        let spacing = isotopic_shift(charge);

        let mut indices = vec![start];
        let mut offsets = vec![0.0];
        for i in 1..abundances.len() {
            let target = mono.mass + i as f64 * spacing;
            match self.find_isotope(peaks, start + 1, end, target, intensity_threshold) {
                Some(j) => {
                    offsets.push((peaks[j].mass - target).abs());
                    indices.push(j);
                }
                None => break,
            }
        }
        if indices.len() < 2 {
            return None;
        }

        let observed: Vec<f64> = indices.iter().map(|i| peaks[*i].intensity).collect();
        let floor = 1.0 - self.params.intensity_cv;
        let mut n = indices.len();
        let alpha = loop {
            let alpha = least_squares_alpha(&observed[..n], &abundances[..n]);
            if !(alpha.is_finite() && alpha > 0.0) {
                return None;
            }
            match observed[..n]
                .iter()
                .zip(abundances.iter())
                .position(|(o, t)| *o < floor * alpha * t)
            {
                None => break alpha,
                Some(0) | Some(1) => return None,
                Some(k) => {
                    n = k;
                }
            }
        };
        indices.truncate(n);
        offsets.truncate(n);

        let mass_error = offsets[1..].iter().sum::<f64>() / (n - 1) as f64;
        trace!(
            "Matched {n} isotopic peaks at {:0.4} with charge {charge}, alpha {alpha:0.3}",
            mono.mass
        );
        Some(IsotopeMatch {
            indices,
            alpha,
            mass_error,
            charge,
        })
    }

    /// Subtract the fitted isotopic pattern in `isotope_match` from `peaks`, describing the
    /// fit on `mono`.
    ///
    /// A peak whose residual would be no more than `intensity_cv` of its current intensity
    /// is set to zero instead of keeping the residual.
    pub fn subtract_matching_peaks(
        &self,
        peaks: &mut [CentroidPeak],
        isotope_match: &IsotopeMatch,
        mono: &mut DeconvPeak,
    ) {
        let Some(mono_index) = isotope_match.monoisotopic_index() else {
            return;
        };
        let abundances = self.expected_abundances(peaks[mono_index].mass, isotope_match.charge);
        let alpha = isotope_match.alpha;

        let mut score = 0.0;
        let mut envelope = 0.0;
        let mut isotopic_peaks = Vec::with_capacity(isotope_match.len());
        for (k, (i, t)) in isotope_match
            .indices
            .iter()
            .zip(abundances.iter())
            .enumerate()
        {
            let model = alpha * t;
            envelope += model;
            let peak = &mut peaks[*i];
            let observed = peak.intensity;
            if observed > 0.0 && model > 0.0 {
                score += observed.min(model) / observed.max(model);
            }

            peak.isotope_index = k as i32;
            isotopic_peaks.push(peak.clone());

            peak.fitted_intensity = model;
            if observed <= 0.0 {
                peak.intensity = 0.0;
                continue;
            }
            let frac = (observed - model) / observed;
            if frac > self.params.intensity_cv {
                peak.intensity = observed - model;
            } else {
                peak.intensity = 0.0;
            }
        }

        mono.charge = isotope_match.charge;
        mono.num_isotopes = isotopic_peaks.len();
        mono.alpha = alpha;
        mono.c13_mass_error = isotope_match.mass_error;
        mono.isotope_fit_score = score;
        mono.peak.intensity = envelope;
        mono.peak.fitted_intensity = alpha * abundances.first().copied().unwrap_or_default();
        mono.peak.isotope_index = 0;
        mono.isotopic_peaks = isotopic_peaks;
    }
}
