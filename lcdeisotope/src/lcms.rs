//! Run-level storage of elution peaks keyed by m/z and apex scan
use std::collections::btree_map::{self, BTreeMap, Entry};

use tracing::trace;

use crate::error::DeisotopeError;
use crate::isotopic_model::neutral_mass;
use crate::params::{CollisionPolicy, LCMSParams};

/// A monoisotopic peak traced across consecutive scans of an LC run
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LCElutionPeak {
    pub apex_scan: u32,
    pub apex_mz: f64,
    pub apex_retention_time: Option<f64>,
    pub apex_intensity: f64,
    pub total_peak_area: f64,
    pub charge: i32,
    pub start_scan: u32,
    pub end_scan: u32,
    pub scan_count: usize,
    pub signal_to_noise: f64,
    pub isotope_fit_score: f64,
}

impl LCElutionPeak {
    /// A single-scan elution peak
    pub fn new(apex_scan: u32, apex_mz: f64, total_peak_area: f64) -> Self {
        Self {
            apex_scan,
            apex_mz,
            apex_intensity: total_peak_area,
            total_peak_area,
            start_scan: apex_scan,
            end_scan: apex_scan,
            scan_count: 1,
            ..Default::default()
        }
    }

    pub fn neutral_mass(&self) -> f64 {
        neutral_mass(self.apex_mz, self.charge)
    }

    /// Fold `other` into this peak, summing areas and apex intensities, and taking
    /// the apex from whichever of the two was more intense.
    fn merge(&mut self, other: LCElutionPeak) {
        let area = self.total_peak_area + other.total_peak_area;
        let intensity = self.apex_intensity + other.apex_intensity;
        let start_scan = self.start_scan.min(other.start_scan);
        let end_scan = self.end_scan.max(other.end_scan);
        let scan_count = self.scan_count + other.scan_count;
        if other.apex_intensity > self.apex_intensity {
            *self = other;
        }
        self.total_peak_area = area;
        self.apex_intensity = intensity;
        self.start_scan = start_scan;
        self.end_scan = end_scan;
        self.scan_count = scan_count;
    }
}

/// All the elution peaks sharing one m/z key, ordered by apex scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MzEntry {
    pub mz: f64,
    pub peaks: BTreeMap<u32, LCElutionPeak>,
}

impl MzEntry {
    fn new(mz: f64) -> Self {
        Self {
            mz,
            peaks: BTreeMap::new(),
        }
    }

    pub fn iter(&self) -> btree_map::Values<'_, u32, LCElutionPeak> {
        self.peaks.values()
    }

    /// The most abundant elution peak whose apex falls in `[start, end)`
    fn best_in_range(&self, start: u32, end: u32) -> Option<&LCElutionPeak> {
        if start >= end {
            return None;
        }
        self.peaks.range(start..end).map(|(_, p)| p).fold(None, |best, p| match best {
            Some(b) if b.total_peak_area >= p.total_peak_area => Some(b),
            _ => Some(p),
        })
    }
}

/// The elution peaks of an LC-MS run, keyed by m/z and then by apex scan.
///
/// Two m/z values within [`LCMSParams::mz_tolerance`] of one another share a key. Keys
/// are kept in ascending order, so every query returns peaks in ascending m/z order.
#[derive(Debug, Clone, Default)]
pub struct LCMSCData {
    params: LCMSParams,
    entries: Vec<MzEntry>,
}

impl LCMSCData {
    pub fn new(params: LCMSParams) -> Self {
        Self {
            params,
            entries: Vec::new(),
        }
    }

    pub fn params(&self) -> &LCMSParams {
        &self.params
    }

    /// Locate the key matching `mz`, or the position a new key for `mz` belongs at.
    ///
    /// When two keys are equally close, the lower one wins.
    fn find_key(&self, mz: f64) -> Result<usize, usize> {
        let pos = self.entries.partition_point(|e| e.mz < mz);
        let tolerance = self.params.mz_tolerance;
        let mut best: Option<(usize, f64)> = None;
        for i in [pos.checked_sub(1), Some(pos)].into_iter().flatten() {
            let Some(entry) = self.entries.get(i) else {
                continue;
            };
            if !tolerance.test(mz, entry.mz) {
                continue;
            }
            let err = (entry.mz - mz).abs();
            match best {
                Some((_, best_err)) if best_err <= err => {}
                _ => best = Some((i, err)),
            }
        }
        best.map(|(i, _)| i).ok_or(pos)
    }

    /// Store `peak` under the key for `mz`, resolving a clash with an existing peak
    /// at the same apex scan with the configured [`CollisionPolicy`].
    pub fn add_lc_elution_peak(&mut self, mz: f64, peak: LCElutionPeak) -> Result<(), DeisotopeError> {
        if !mz.is_finite() {
            return Err(DeisotopeError::InvalidParameter(format!(
                "elution peak m/z must be finite, got {mz}"
            )));
        }
        let index = match self.find_key(mz) {
            Ok(index) => index,
            Err(pos) => {
                self.entries.insert(pos, MzEntry::new(mz));
                pos
            }
        };
        let policy = self.params.collision_policy;
        let entry = &mut self.entries[index];
        let key_mz = entry.mz;
        match entry.peaks.entry(peak.apex_scan) {
            Entry::Vacant(slot) => {
                slot.insert(peak);
            }
            Entry::Occupied(mut slot) => {
                trace!(
                    "Elution peak collision at {key_mz:0.5}, scan {} under {policy:?}",
                    peak.apex_scan
                );
                match policy {
                    CollisionPolicy::Overwrite => {
                        slot.insert(peak);
                    }
                    CollisionPolicy::KeepMaxArea => {
                        if peak.total_peak_area > slot.get().total_peak_area {
                            slot.insert(peak);
                        }
                    }
                    CollisionPolicy::MergeSum => slot.get_mut().merge(peak),
                    CollisionPolicy::Reject => {
                        return Err(DeisotopeError::DuplicateElutionPeak {
                            mz: key_mz,
                            scan: peak.apex_scan,
                        })
                    }
                }
            }
        }
        Ok(())
    }

    fn passes_threshold(&self, peak: &LCElutionPeak) -> bool {
        peak.total_peak_area > self.params.intensity_threshold
    }

    /// For each m/z key, the elution peak with its apex at exactly `scan`
    pub fn get_mz_list(&self, scan: u32) -> Vec<&LCElutionPeak> {
        self.entries
            .iter()
            .filter_map(|e| e.peaks.get(&scan))
            .filter(|p| self.passes_threshold(p))
            .collect()
    }

    /// For each m/z key, the largest-area elution peak with its apex in
    /// `[scan - tolerance, scan + tolerance)`. A `tolerance` of zero behaves
    /// like [`LCMSCData::get_mz_list`].
    pub fn get_mz_list_in_window(&self, scan: u32, tolerance: u32) -> Vec<&LCElutionPeak> {
        if tolerance == 0 {
            return self.get_mz_list(scan);
        }
        let start = scan.saturating_sub(tolerance);
        let end = scan.saturating_add(tolerance);
        self.entries
            .iter()
            .filter_map(|e| e.best_in_range(start, end))
            .filter(|p| self.passes_threshold(p))
            .collect()
    }

    /// Every stored elution peak in ascending m/z, then ascending apex scan order
    pub fn get_all_peaks(&self) -> Vec<&LCElutionPeak> {
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LCElutionPeak> + '_ {
        self.entries.iter().flat_map(|e| e.iter())
    }

    pub fn entries(&self) -> &[MzEntry] {
        &self.entries
    }

    pub fn mz_keys(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|e| e.mz)
    }

    /// The number of elution peaks stored
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.peaks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.peaks.is_empty())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::MassTolerance;

    fn with_policy(policy: CollisionPolicy) -> LCMSCData {
        LCMSCData::new(LCMSParams {
            collision_policy: policy,
            ..Default::default()
        })
    }

    #[test]
    fn test_round_trip() {
        let mut data = LCMSCData::default();
        data.add_lc_elution_peak(712.18, LCElutionPeak::new(50, 712.18, 1000.0))
            .unwrap();

        let hits = data.get_mz_list(50);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].total_peak_area, 1000.0);
        assert!(data.get_mz_list(51).is_empty());

        assert!(data.get_mz_list_in_window(60, 5).is_empty());
        assert_eq!(data.get_mz_list_in_window(53, 5).len(), 1);
        // The window excludes its upper bound
        assert!(data.get_mz_list_in_window(45, 5).is_empty());
        assert_eq!(data.get_mz_list_in_window(46, 5).len(), 1);
        assert_eq!(data.get_mz_list_in_window(50, 0).len(), 1);
        assert_eq!(data.get_mz_list_in_window(2, 100).len(), 1);
    }

    #[test]
    fn test_window_picks_max_area() {
        let mut data = LCMSCData::default();
        data.add_lc_elution_peak(500.0, LCElutionPeak::new(10, 500.0, 20.0)).unwrap();
        data.add_lc_elution_peak(500.0, LCElutionPeak::new(12, 500.0, 80.0)).unwrap();
        data.add_lc_elution_peak(500.0, LCElutionPeak::new(14, 500.0, 50.0)).unwrap();
        let hits = data.get_mz_list_in_window(12, 3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].apex_scan, 12);
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_threshold() {
        let mut data = LCMSCData::new(LCMSParams {
            intensity_threshold: 100.0,
            ..Default::default()
        });
        data.add_lc_elution_peak(300.0, LCElutionPeak::new(5, 300.0, 100.0)).unwrap();
        data.add_lc_elution_peak(400.0, LCElutionPeak::new(5, 400.0, 101.0)).unwrap();
        let hits = data.get_mz_list(5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].apex_mz, 400.0);
        assert_eq!(data.get_all_peaks().len(), 2);
    }

    #[test]
    fn test_key_merging() {
        let mut data = LCMSCData::new(LCMSParams {
            mz_tolerance: MassTolerance::ppm(5.0),
            ..Default::default()
        });
        data.add_lc_elution_peak(1000.0, LCElutionPeak::new(1, 1000.0, 10.0)).unwrap();
        data.add_lc_elution_peak(1000.003, LCElutionPeak::new(2, 1000.003, 10.0)).unwrap();
        data.add_lc_elution_peak(1000.02, LCElutionPeak::new(3, 1000.02, 10.0)).unwrap();
        data.add_lc_elution_peak(999.0, LCElutionPeak::new(3, 999.0, 10.0)).unwrap();
        let keys: Vec<f64> = data.mz_keys().collect();
        assert_eq!(keys, vec![999.0, 1000.0, 1000.02]);

        let all: Vec<(f64, u32)> = data
            .get_all_peaks()
            .into_iter()
            .map(|p| (p.apex_mz, p.apex_scan))
            .collect();
        assert_eq!(
            all,
            vec![(999.0, 3), (1000.0, 1), (1000.003, 2), (1000.02, 3)]
        );
    }

    #[test]
    fn test_collision_policies() {
        let first = LCElutionPeak::new(7, 600.0, 100.0);
        let second = LCElutionPeak::new(7, 600.0, 40.0);

        let mut data = with_policy(CollisionPolicy::KeepMaxArea);
        data.add_lc_elution_peak(600.0, first.clone()).unwrap();
        data.add_lc_elution_peak(600.0, second.clone()).unwrap();
        assert_eq!(data.get_mz_list(7)[0].total_peak_area, 100.0);

        let mut data = with_policy(CollisionPolicy::Overwrite);
        data.add_lc_elution_peak(600.0, first.clone()).unwrap();
        data.add_lc_elution_peak(600.0, second.clone()).unwrap();
        assert_eq!(data.get_mz_list(7)[0].total_peak_area, 40.0);

        let mut data = with_policy(CollisionPolicy::MergeSum);
        data.add_lc_elution_peak(600.0, second.clone()).unwrap();
        data.add_lc_elution_peak(600.0, first.clone()).unwrap();
        let merged = data.get_mz_list(7)[0];
        assert_eq!(merged.total_peak_area, 140.0);
        assert_eq!(merged.apex_intensity, 140.0);
        assert_eq!(merged.scan_count, 2);
        assert_eq!(data.len(), 1);

        let mut data = with_policy(CollisionPolicy::Reject);
        data.add_lc_elution_peak(600.0, first).unwrap();
        assert_eq!(
            data.add_lc_elution_peak(600.0, second),
            Err(DeisotopeError::DuplicateElutionPeak { mz: 600.0, scan: 7 })
        );
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_empty() {
        let data = LCMSCData::default();
        assert!(data.is_empty());
        assert!(data.get_mz_list(1).is_empty());
        assert!(data.get_mz_list_in_window(1, 10).is_empty());
        assert!(data.get_all_peaks().is_empty());
    }
}
