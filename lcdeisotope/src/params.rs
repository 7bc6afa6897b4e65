//! Parameter bundles for each stage of the pipeline.
//!
//! Every component receives its parameters by value at construction time, so
//! different parameter sets can be used side by side.
use crate::error::DeisotopeError;

/// A mass accuracy constraint combining a relative and an absolute term.
///
/// The width of the window around `mz` is `ppm * mz / 1e6 + da`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MassTolerance {
    pub ppm: f64,
    pub da: f64,
}

impl Default for MassTolerance {
    fn default() -> Self {
        Self { ppm: 10.0, da: 0.0 }
    }
}

impl MassTolerance {
    pub const fn new(ppm: f64, da: f64) -> Self {
        Self { ppm, da }
    }

    pub const fn ppm(ppm: f64) -> Self {
        Self { ppm, da: 0.0 }
    }

    pub const fn da(da: f64) -> Self {
        Self { ppm: 0.0, da }
    }

    /// The half-width of the tolerance window at `mz`
    #[inline]
    pub fn width(&self, mz: f64) -> f64 {
        self.ppm * mz / 1e6 + self.da
    }

    #[inline]
    pub fn test(&self, query: f64, reference: f64) -> bool {
        (query - reference).abs() <= self.width(reference)
    }

    pub(crate) fn validate(&self, label: &str) -> Result<(), DeisotopeError> {
        if !(self.ppm >= 0.0 && self.da >= 0.0) {
            return Err(DeisotopeError::InvalidParameter(format!(
                "{label} must have non-negative terms, got {} ppm + {} Da",
                self.ppm, self.da
            )));
        }
        Ok(())
    }
}

/// Parameters for matching an isotopic series against the theoretical table
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IsotopicDistParams {
    /// How far an observed isotopic peak may be from its expected m/z
    pub tolerance: MassTolerance,
    /// The coefficient of variation of peak intensities. A residual smaller than this
    /// fraction of a peak's intensity is considered noise and the peak is consumed entirely,
    /// and an isotope falling short of its modelled intensity by more than this fraction
    /// ends the isotopic series.
    pub intensity_cv: f64,
}

impl Default for IsotopicDistParams {
    fn default() -> Self {
        Self {
            tolerance: MassTolerance::default(),
            intensity_cv: 0.2,
        }
    }
}

impl IsotopicDistParams {
    pub fn validate(&self) -> Result<(), DeisotopeError> {
        self.tolerance.validate("isotopic tolerance")?;
        if !(0.0..1.0).contains(&self.intensity_cv) {
            return Err(DeisotopeError::InvalidParameter(format!(
                "intensity_cv must be in [0, 1), got {}",
                self.intensity_cv
            )));
        }
        Ok(())
    }
}

/// Parameters controlling a single spectrum's charge state deconvolution
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeisotoperParams {
    pub min_charge: i32,
    pub max_charge: i32,
    /// An absolute minimum intensity for a peak to seed an isotopic pattern. When absent,
    /// the spectrum's noise level at `noise_percentile` is used instead.
    pub intensity_floor: Option<f64>,
    pub noise_percentile: f64,
    /// The largest m/z gap between neighboring peaks in the same peak group
    pub peak_group_distance: f64,
    pub isotopic: IsotopicDistParams,
    /// The window used to collapse duplicate monoisotopic peaks after deconvolution
    pub cleanup_tolerance: MassTolerance,
}

impl Default for DeisotoperParams {
    fn default() -> Self {
        Self {
            min_charge: 1,
            max_charge: 5,
            intensity_floor: None,
            noise_percentile: 30.0,
            peak_group_distance: 1.1,
            isotopic: IsotopicDistParams::default(),
            cleanup_tolerance: MassTolerance::default(),
        }
    }
}

impl DeisotoperParams {
    pub fn new(min_charge: i32, max_charge: i32) -> Self {
        Self {
            min_charge,
            max_charge,
            ..Default::default()
        }
    }

    pub fn with_intensity_floor(mut self, floor: f64) -> Self {
        self.intensity_floor = Some(floor);
        self
    }

    pub fn with_tolerance(mut self, tolerance: MassTolerance) -> Self {
        self.isotopic.tolerance = tolerance;
        self.cleanup_tolerance = tolerance;
        self
    }

    pub fn validate(&self) -> Result<(), DeisotopeError> {
        if self.min_charge < 1 || self.min_charge > self.max_charge {
            return Err(DeisotopeError::InvalidChargeRange {
                min: self.min_charge,
                max: self.max_charge,
            });
        }
        if let Some(floor) = self.intensity_floor {
            if !(floor >= 0.0) {
                return Err(DeisotopeError::InvalidParameter(format!(
                    "intensity_floor must be non-negative, got {floor}"
                )));
            }
        }
        if !(0.0..=100.0).contains(&self.noise_percentile) {
            return Err(DeisotopeError::InvalidParameter(format!(
                "noise_percentile must be in [0, 100], got {}",
                self.noise_percentile
            )));
        }
        if !(self.peak_group_distance > 0.0) {
            return Err(DeisotopeError::InvalidParameter(format!(
                "peak_group_distance must be positive, got {}",
                self.peak_group_distance
            )));
        }
        self.cleanup_tolerance.validate("cleanup tolerance")?;
        self.isotopic.validate()
    }
}

/// How to resolve two elution peaks landing on the same m/z and apex scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum CollisionPolicy {
    /// The most recently inserted peak replaces the existing one
    Overwrite,
    /// Keep whichever peak has the larger total area
    #[default]
    KeepMaxArea,
    /// Sum the areas of both peaks, keeping the apex of the more intense one
    MergeSum,
    /// Refuse the insertion with an error
    Reject,
}

/// Parameters for the run-level elution peak store
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LCMSParams {
    /// Two m/z keys within this tolerance of one another are the same key
    pub mz_tolerance: MassTolerance,
    /// The area an elution peak must exceed to be reported by a scan query
    pub intensity_threshold: f64,
    pub collision_policy: CollisionPolicy,
}

impl Default for LCMSParams {
    fn default() -> Self {
        Self {
            mz_tolerance: MassTolerance::ppm(1.0),
            intensity_threshold: 0.0,
            collision_policy: CollisionPolicy::default(),
        }
    }
}

/// Parameters for linking monoisotopic peaks across scans into elution traces
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ElutionParams {
    pub mz_tolerance: MassTolerance,
    /// The number of scans a trace may skip and still be extended
    pub max_scan_gap: u32,
    /// Traces with fewer points than this are discarded
    pub min_scan_count: usize,
}

impl Default for ElutionParams {
    fn default() -> Self {
        Self {
            mz_tolerance: MassTolerance::ppm(10.0),
            max_scan_gap: 1,
            min_scan_count: 1,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tolerance_width() {
        let tol = MassTolerance::new(10.0, 0.001);
        assert!((tol.width(500.0) - 0.006).abs() < 1e-12);
        assert!(tol.test(500.005, 500.0));
        assert!(!tol.test(500.007, 500.0));
    }

    #[test]
    fn test_validate() {
        assert!(DeisotoperParams::default().validate().is_ok());
        assert_eq!(
            DeisotoperParams::new(4, 2).validate(),
            Err(DeisotopeError::InvalidChargeRange { min: 4, max: 2 })
        );
        assert!(DeisotoperParams::new(0, 2).validate().is_err());

        let mut params = DeisotoperParams::default();
        params.isotopic.intensity_cv = 1.5;
        assert!(params.validate().is_err());

        let mut params = DeisotoperParams::default();
        params.noise_percentile = 101.0;
        assert!(params.validate().is_err());
    }
}
