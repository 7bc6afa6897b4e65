//! Linking monoisotopic peaks across scans into elution peaks
use std::mem;

use tracing::debug;

use crate::error::DeisotopeError;
use crate::lcms::{LCElutionPeak, LCMSCData};
use crate::params::ElutionParams;
use crate::peaks::DeconvPeak;

#[derive(Debug, Clone)]
struct TracePoint {
    scan: u32,
    retention_time: Option<f64>,
    peak: DeconvPeak,
}

/// A run of monoisotopic peaks with the same charge and similar m/z in nearby scans
#[derive(Debug, Clone)]
struct ElutionTrace {
    charge: i32,
    /// The m/z of the most intense point so far
    mz: f64,
    apex_intensity: f64,
    points: Vec<TracePoint>,
}

impl ElutionTrace {
    fn new(point: TracePoint) -> Self {
        Self {
            charge: point.peak.charge,
            mz: point.peak.mz(),
            apex_intensity: point.peak.intensity,
            points: vec![point],
        }
    }

    fn last_scan(&self) -> u32 {
        self.points.last().map(|p| p.scan).unwrap_or_default()
    }

    fn push(&mut self, point: TracePoint) {
        if point.peak.intensity > self.apex_intensity {
            self.apex_intensity = point.peak.intensity;
            self.mz = point.peak.mz();
        }
        self.points.push(point);
    }

    /// Trapezoidal integral of intensity over retention time, falling back to scan
    /// number when any point lacks a retention time.
    fn area(&self) -> f64 {
        if self.points.len() == 1 {
            return self.points[0].peak.intensity;
        }
        let use_time = self.points.iter().all(|p| p.retention_time.is_some());
        self.points
            .windows(2)
            .map(|w| {
                let width = if use_time {
                    w[1].retention_time.unwrap_or_default() - w[0].retention_time.unwrap_or_default()
                } else {
                    (w[1].scan - w[0].scan) as f64
                };
                width * (w[0].peak.intensity + w[1].peak.intensity) / 2.0
            })
            .sum()
    }

    fn to_elution_peak(&self) -> Option<LCElutionPeak> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        let apex = self
            .points
            .iter()
            .fold(first, |best, p| if p.peak.intensity > best.peak.intensity { p } else { best });
        Some(LCElutionPeak {
            apex_scan: apex.scan,
            apex_mz: apex.peak.mz(),
            apex_retention_time: apex.retention_time,
            apex_intensity: apex.peak.intensity,
            total_peak_area: self.area(),
            charge: self.charge,
            start_scan: first.scan,
            end_scan: last.scan,
            scan_count: self.points.len(),
            signal_to_noise: apex.peak.signal_to_noise,
            isotope_fit_score: apex.peak.isotope_fit_score,
        })
    }
}

/// Accumulates the monoisotopic peaks of successive scans into elution traces.
///
/// Scans must be added in non-decreasing scan order. A trace is closed once more than
/// [`ElutionParams::max_scan_gap`] scans pass without extending it.
#[derive(Debug, Clone, Default)]
pub struct ElutionTracker {
    params: ElutionParams,
    open: Vec<ElutionTrace>,
    closed: Vec<ElutionTrace>,
    last_scan: Option<u32>,
}

impl ElutionTracker {
    pub fn new(params: ElutionParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    pub fn params(&self) -> &ElutionParams {
        &self.params
    }

    /// The number of traces started so far
    pub fn len(&self) -> usize {
        self.open.len() + self.closed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn close_stale_traces(&mut self, scan: u32) {
        let max_step = self.params.max_scan_gap.saturating_add(1);
        let (open, stale): (Vec<_>, Vec<_>) = mem::take(&mut self.open)
            .into_iter()
            .partition(|t| scan - t.last_scan() <= max_step);
        self.open = open;
        self.closed.extend(stale);
    }

    /// The open trace nearest `peak` in m/z with the same charge that has not
    /// been extended in `scan` yet or `claimed` by another peak of `scan`.
    ///
    /// `self.open` must be sorted by m/z.
    fn find_trace(&self, peak: &DeconvPeak, scan: u32, claimed: &[bool]) -> Option<usize> {
        let tolerance = self.params.mz_tolerance;
        let mz = peak.mz();
        let width = tolerance.width(mz);
        let start = self.open.partition_point(|t| t.mz < mz - width);
        self.open[start..]
            .iter()
            .enumerate()
            .take_while(|(_, t)| t.mz <= mz + width)
            .filter(|(i, t)| {
                t.charge == peak.charge && t.last_scan() < scan && !claimed[start + i]
            })
            .min_by(|(_, a), (_, b)| (a.mz - mz).abs().total_cmp(&(b.mz - mz).abs()))
            .map(|(i, _)| start + i)
    }

    /// Add the monoisotopic peaks found in `scan`. More intense peaks claim traces first.
    pub fn add_scan(
        &mut self,
        scan: u32,
        retention_time: Option<f64>,
        mut peaks: Vec<DeconvPeak>,
    ) -> Result<(), DeisotopeError> {
        if let Some(previous) = self.last_scan {
            if scan < previous {
                return Err(DeisotopeError::ScanOutOfOrder {
                    previous,
                    current: scan,
                });
            }
        }
        self.last_scan = Some(scan);
        self.close_stale_traces(scan);

        peaks.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
        // Every peak is assigned before any trace is extended, since extending a trace
        // can move its m/z and break the ordering `find_trace` searches.
        let mut claimed = vec![false; self.open.len()];
        let mut extended = Vec::new();
        let mut opened = Vec::new();
        for mut peak in peaks {
            peak.scan = Some(scan);
            let point = TracePoint {
                scan,
                retention_time,
                peak,
            };
            match self.find_trace(&point.peak, scan, &claimed) {
                Some(i) => {
                    claimed[i] = true;
                    extended.push((i, point));
                }
                None => opened.push(ElutionTrace::new(point)),
            }
        }
        for (i, point) in extended {
            self.open[i].push(point);
        }
        self.open.extend(opened);
        self.open.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        Ok(())
    }

    /// Close every trace and store the elution peaks built from those with at least
    /// [`ElutionParams::min_scan_count`] points in `lcms`, returning how many were stored.
    pub fn finish(mut self, lcms: &mut LCMSCData) -> Result<usize, DeisotopeError> {
        self.closed.append(&mut self.open);
        let n_traces = self.closed.len();
        let mut n_stored = 0;
        for trace in self.closed.iter() {
            if trace.points.len() < self.params.min_scan_count {
                continue;
            }
            if let Some(peak) = trace.to_elution_peak() {
                lcms.add_lc_elution_peak(peak.apex_mz, peak)?;
                n_stored += 1;
            }
        }
        debug!("Stored {n_stored} elution peaks from {n_traces} traces");
        Ok(n_stored)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peaks::CentroidPeak;

    fn make_peak(mz: f64, intensity: f64, charge: i32) -> DeconvPeak {
        DeconvPeak::new(CentroidPeak::new(mz, intensity), charge)
    }

    #[test_log::test]
    fn test_trace_split_at_gap() {
        let mut tracker = ElutionTracker::new(ElutionParams::default());
        tracker.add_scan(1, Some(1.0), vec![make_peak(500.0, 10.0, 2)]).unwrap();
        tracker.add_scan(2, Some(1.5), vec![make_peak(500.001, 20.0, 2)]).unwrap();
        tracker.add_scan(3, Some(2.0), vec![make_peak(499.999, 10.0, 2)]).unwrap();
        tracker.add_scan(6, Some(3.5), vec![make_peak(500.0, 7.0, 2)]).unwrap();
        assert_eq!(tracker.len(), 2);

        let mut lcms = LCMSCData::default();
        assert_eq!(tracker.finish(&mut lcms).unwrap(), 2);
        let peaks = lcms.get_all_peaks();
        assert_eq!(peaks.len(), 2);

        let first = peaks.iter().find(|p| p.apex_scan == 2).unwrap();
        assert_eq!(first.start_scan, 1);
        assert_eq!(first.end_scan, 3);
        assert_eq!(first.scan_count, 3);
        assert_eq!(first.apex_mz, 500.001);
        assert_eq!(first.apex_retention_time, Some(1.5));
        assert!((first.total_peak_area - 15.0).abs() < 1e-9);

        let second = peaks.iter().find(|p| p.apex_scan == 6).unwrap();
        assert_eq!(second.scan_count, 1);
        assert_eq!(second.total_peak_area, 7.0);
    }

    #[test]
    fn test_extension_keeps_neighbors_reachable() {
        let mut tracker = ElutionTracker::new(ElutionParams::default());
        tracker
            .add_scan(1, None, vec![make_peak(500.0, 10.0, 2), make_peak(500.003, 10.0, 3)])
            .unwrap();
        // The charge 2 point would pull its trace above the charge 3 trace if it were
        // pushed before the charge 3 point is placed.
        tracker
            .add_scan(
                2,
                None,
                vec![make_peak(500.0049, 100.0, 2), make_peak(499.9995, 50.0, 3)],
            )
            .unwrap();
        assert_eq!(tracker.len(), 2);

        let mut lcms = LCMSCData::default();
        assert_eq!(tracker.finish(&mut lcms).unwrap(), 2);
        assert!(lcms.iter().all(|p| p.scan_count == 2));
    }

    #[test]
    fn test_gap_tolerated() {
        let mut tracker = ElutionTracker::new(ElutionParams {
            max_scan_gap: 2,
            ..Default::default()
        });
        tracker.add_scan(1, None, vec![make_peak(800.0, 10.0, 1)]).unwrap();
        tracker.add_scan(4, None, vec![make_peak(800.0, 30.0, 1)]).unwrap();
        assert_eq!(tracker.len(), 1);

        let mut lcms = LCMSCData::default();
        tracker.finish(&mut lcms).unwrap();
        let peak = lcms.get_mz_list(4)[0];
        // Integrated over scan numbers without retention times
        assert!((peak.total_peak_area - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_charge_separates_traces() {
        let mut tracker = ElutionTracker::new(ElutionParams::default());
        tracker
            .add_scan(1, None, vec![make_peak(700.0, 10.0, 2), make_peak(700.0, 5.0, 3)])
            .unwrap();
        tracker
            .add_scan(2, None, vec![make_peak(700.0, 12.0, 3)])
            .unwrap();
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_min_scan_count() {
        let mut tracker = ElutionTracker::new(ElutionParams {
            min_scan_count: 2,
            ..Default::default()
        });
        tracker.add_scan(1, None, vec![make_peak(400.0, 10.0, 1), make_peak(600.0, 10.0, 1)]).unwrap();
        tracker.add_scan(2, None, vec![make_peak(400.0, 10.0, 1)]).unwrap();
        let mut lcms = LCMSCData::default();
        assert_eq!(tracker.finish(&mut lcms).unwrap(), 1);
        assert_eq!(lcms.mz_keys().collect::<Vec<_>>(), vec![400.0]);
    }

    #[test]
    fn test_scan_order() {
        let mut tracker = ElutionTracker::default();
        tracker.add_scan(5, None, Vec::new()).unwrap();
        tracker.add_scan(5, None, Vec::new()).unwrap();
        assert_eq!(
            tracker.add_scan(4, None, Vec::new()),
            Err(DeisotopeError::ScanOutOfOrder {
                previous: 5,
                current: 4
            })
        );
    }
}
