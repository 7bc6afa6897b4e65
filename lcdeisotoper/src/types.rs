use mzdata::spectrum::{utils::Collator, MultiLayerSpectrum};
use mzpeaks::CentroidPeak;

use lcdeisotope::DeconvPeak;

pub(crate) type CPeak = CentroidPeak;
pub(crate) type DPeak = mzpeaks::DeconvolutedPeak;
pub(crate) type SpectrumType = MultiLayerSpectrum<CPeak, DPeak>;
pub(crate) const BUFFER_SIZE: usize = 10_000;
pub(crate) const PEAK_COUNT_THRESHOLD_WARNING: usize = 10_000;

/// The monoisotopic peaks found in one spectrum
#[derive(Debug, Clone, Default)]
pub struct ScanPeaks {
    pub scan: u32,
    pub retention_time: Option<f64>,
    pub peaks: Vec<DeconvPeak>,
}

/// Releases [`ScanPeaks`] in input order
pub(crate) type ScanCollator = Collator<Option<ScanPeaks>>;

/// A spectrum's position in the input stream and its peaks, or `None` if it was skipped
pub(crate) type ScanMessage = (usize, Option<ScanPeaks>);
