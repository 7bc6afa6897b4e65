//! Deisotope and charge state deconvolve centroided mass spectra, then trace the
//! resulting monoisotopic peaks across an LC-MS run into elution peaks.
pub mod centroid;
pub mod charge;
pub mod deisotoper;
pub mod elution;
pub mod error;
pub mod isotopic_dist;
pub mod isotopic_model;
pub mod lcms;
pub mod params;
pub mod peaks;

pub use crate::centroid::{CentroidData, PeakGroupIter};
pub use crate::deisotoper::Deisotoper;
pub use crate::elution::ElutionTracker;
pub use crate::error::DeisotopeError;
pub use crate::isotopic_dist::{IsotopeMatch, IsotopicDist};
pub use crate::isotopic_model::{IsotopeTable, IsotopeTableParams, IsotopicModel, IsotopicModels};
pub use crate::lcms::{LCElutionPeak, LCMSCData};
pub use crate::params::{
    CollisionPolicy, DeisotoperParams, ElutionParams, IsotopicDistParams, LCMSParams,
    MassTolerance,
};
pub use crate::peaks::{CentroidPeak, DeconvPeak};

#[cfg(test)]
mod test {
    use super::*;
    use crate::isotopic_model::isotopic_shift;

    const ROW: [f64; 4] = [0.33, 0.36, 0.21, 0.10];

    fn make_scan(scale: f64) -> Vec<CentroidPeak> {
        let spacing = isotopic_shift(2);
        let mut peaks: Vec<CentroidPeak> = ROW[..3]
            .iter()
            .enumerate()
            .map(|(i, t)| CentroidPeak::new(1000.0 + i as f64 * spacing, t * scale))
            .collect();
        peaks.push(CentroidPeak::new(1250.0, 3.0));
        peaks
    }

    #[test_log::test]
    fn test_run() -> Result<(), DeisotopeError> {
        let table = IsotopeTable::new(5000.0, vec![ROW.to_vec()])?;
        let params = DeisotoperParams::new(1, 3).with_intensity_floor(10.0);
        let mut deisotoper = Deisotoper::new(params, table)?;
        let mut tracker = ElutionTracker::new(ElutionParams::default());

        for (scan, scale) in [(1u32, 1000.0), (2, 4000.0), (3, 2000.0)] {
            let mut data = deisotoper
                .centroid_data(make_scan(scale))?
                .with_scan(scan, Some(scan as f64 * 0.1));
            let peaks = deisotoper.process(&mut data)?;
            assert_eq!(peaks.len(), 1);
            assert_eq!(peaks[0].charge, 2);
            tracker.add_scan(scan, data.retention_time, peaks)?;
        }

        let mut lcms = LCMSCData::new(LCMSParams::default());
        assert_eq!(tracker.finish(&mut lcms)?, 1);

        let hits = lcms.get_mz_list(2);
        assert_eq!(hits.len(), 1);
        let peak = hits[0];
        assert_eq!(peak.charge, 2);
        assert_eq!(peak.start_scan, 1);
        assert_eq!(peak.end_scan, 3);
        assert!((peak.apex_mz - 1000.0).abs() < 1e-9);
        assert!(peak.total_peak_area > 0.0);
        assert!(lcms.get_mz_list_in_window(10, 5).is_empty());
        Ok(())
    }
}
