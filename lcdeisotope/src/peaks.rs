//! Peak types flowing through deisotoping.
use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};

use mzpeaks::{CoordinateLike, IntensityMeasurement, KnownCharge, MZ};

/// A single resolved centroid in a mass spectrum.
///
/// `intensity` is the working intensity, reduced as isotopic patterns are
/// subtracted. `original_intensity` keeps the value the peak was created with.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CentroidPeak {
    pub mass: f64,
    pub intensity: f64,
    pub original_intensity: f64,
    /// The intensity explained by the most recent isotopic fit involving this peak
    pub fitted_intensity: f64,
    /// The position of this peak in an isotopic series, -1 when unassigned
    pub isotope_index: i32,
    pub retention_time: Option<f64>,
    pub signal_to_noise: f64,
}

impl CentroidPeak {
    pub fn new(mass: f64, intensity: f64) -> Self {
        Self {
            mass,
            intensity,
            original_intensity: intensity,
            fitted_intensity: 0.0,
            isotope_index: -1,
            retention_time: None,
            signal_to_noise: 0.0,
        }
    }

    pub fn with_retention_time(mut self, retention_time: f64) -> Self {
        self.retention_time = Some(retention_time);
        self
    }

    /// The fraction of the original intensity which has been subtracted away
    pub fn depletion(&self) -> f64 {
        if self.original_intensity > 0.0 {
            1.0 - self.intensity / self.original_intensity
        } else {
            0.0
        }
    }
}

impl From<mzpeaks::CentroidPeak> for CentroidPeak {
    fn from(value: mzpeaks::CentroidPeak) -> Self {
        Self::new(value.mz, value.intensity as f64)
    }
}

impl From<(f64, f64)> for CentroidPeak {
    fn from((mass, intensity): (f64, f64)) -> Self {
        Self::new(mass, intensity)
    }
}

/// Ordered by m/z, then by intensity. Peaks which tie on both but differ otherwise
/// are unordered.
impl PartialOrd for CentroidPeak {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.mass.partial_cmp(&other.mass)? {
            Ordering::Equal => {}
            ord => return Some(ord),
        }
        match self.intensity.partial_cmp(&other.intensity)? {
            Ordering::Equal => {}
            ord => return Some(ord),
        }
        (self == other).then_some(Ordering::Equal)
    }
}

impl CoordinateLike<MZ> for CentroidPeak {
    fn coordinate(&self) -> f64 {
        self.mass
    }
}

impl IntensityMeasurement for CentroidPeak {
    fn intensity(&self) -> f32 {
        self.intensity as f32
    }
}

/// A monoisotopic peak assigned a charge state by fitting an isotopic pattern.
///
/// The monoisotopic [`CentroidPeak`] is reachable through [`Deref`], so a
/// `DeconvPeak` may be used wherever a centroid is read.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeconvPeak {
    pub peak: CentroidPeak,
    pub charge: i32,
    pub num_isotopes: usize,
    /// The sum of per-isotope agreement ratios between the observed and modelled
    /// intensities. Bounded above by `num_isotopes`.
    pub isotope_fit_score: f64,
    /// Mean absolute deviation in Da of the observed isotope positions from their
    /// expected positions
    pub c13_mass_error: f64,
    /// The scaling factor applied to the theoretical isotopic abundances
    pub alpha: f64,
    pub scan: Option<u32>,
    /// The observed isotopic envelope as it was prior to subtraction
    pub isotopic_peaks: Vec<CentroidPeak>,
}

impl DeconvPeak {
    pub fn new(peak: CentroidPeak, charge: i32) -> Self {
        Self {
            peak,
            charge,
            ..Default::default()
        }
    }

    pub fn mz(&self) -> f64 {
        self.peak.mass
    }

    /// The neutral mass of the monoisotopic peak
    pub fn neutral_mass(&self) -> f64 {
        crate::isotopic_model::neutral_mass(self.peak.mass, self.charge)
    }

    pub fn retention_time(&self) -> Option<f64> {
        self.peak.retention_time
    }
}

impl Deref for DeconvPeak {
    type Target = CentroidPeak;

    fn deref(&self) -> &Self::Target {
        &self.peak
    }
}

impl DerefMut for DeconvPeak {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.peak
    }
}

impl PartialOrd for DeconvPeak {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.peak.mass.partial_cmp(&other.peak.mass)? {
            Ordering::Equal => {}
            ord => return Some(ord),
        }
        match self.charge.cmp(&other.charge) {
            Ordering::Equal => {}
            ord => return Some(ord),
        }
        match self.peak.intensity.partial_cmp(&other.peak.intensity)? {
            Ordering::Equal => {}
            ord => return Some(ord),
        }
        (self == other).then_some(Ordering::Equal)
    }
}

impl CoordinateLike<MZ> for DeconvPeak {
    fn coordinate(&self) -> f64 {
        self.peak.mass
    }
}

impl IntensityMeasurement for DeconvPeak {
    fn intensity(&self) -> f32 {
        self.peak.intensity as f32
    }
}

impl KnownCharge for DeconvPeak {
    fn charge(&self) -> i32 {
        self.charge
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_conversion() {
        let peak: CentroidPeak = mzpeaks::CentroidPeak::new(204.08, 3432.5, 0).into();
        assert_eq!(peak.mass, 204.08);
        assert_eq!(peak.intensity, 3432.5);
        assert_eq!(peak.original_intensity, 3432.5);
        assert_eq!(peak.isotope_index, -1);
        assert_eq!(peak.coordinate(), 204.08);
    }

    #[test]
    fn test_deconv_deref() {
        let mut dpeak = DeconvPeak::new(CentroidPeak::new(500.0, 100.0), 2);
        assert_eq!(dpeak.mass, 500.0);
        dpeak.intensity = 50.0;
        assert_eq!(dpeak.peak.intensity, 50.0);
        assert_eq!(dpeak.charge(), 2);
        assert!((dpeak.depletion() - 0.5).abs() < 1e-12);
        assert!((dpeak.neutral_mass() - (500.0 - crate::isotopic_model::PROTON) * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_ordering() {
        let low = CentroidPeak::new(300.0, 10.0);
        let high = CentroidPeak::new(300.5, 1.0);
        assert!(low < high);
        assert!(CentroidPeak::new(300.0, 5.0) < low);
        assert_eq!(low.partial_cmp(&low.clone()), Some(Ordering::Equal));

        let mut depleted = low.clone();
        depleted.original_intensity = 20.0;
        assert_eq!(low.partial_cmp(&depleted), None);

        let z2 = DeconvPeak::new(low.clone(), 2);
        let z3 = DeconvPeak::new(low.clone(), 3);
        assert!(z2 < z3);
        assert!(z3 < DeconvPeak::new(high, 1));
        assert_eq!(mzpeaks::CoordinateLike::<MZ>::coordinate(&z3), 300.0);
    }
}
