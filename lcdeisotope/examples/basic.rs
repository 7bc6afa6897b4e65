//! A basic demonstration of how to use [`lcdeisotope::Deisotoper`] and
//! [`lcdeisotope::ElutionTracker`] on a handful of synthetic scans.

use std::collections::BTreeMap;

use lcdeisotope::{
    isotopic_model::{isotopic_shift, IsotopeTableParams, IsotopicModels},
    CentroidPeak, DeisotopeError, Deisotoper, DeisotoperParams, ElutionParams, ElutionTracker,
    LCMSCData, LCMSParams,
};

/// A charge 2 and a charge 3 isotopic pattern, plus a little noise
fn make_scan(scale: f64) -> Vec<CentroidPeak> {
    let mut peaks = Vec::new();
    for (mz, z) in [(650.35, 2), (812.4, 3)] {
        for (i, t) in [0.45, 0.35, 0.15, 0.05].iter().enumerate() {
            peaks.push(CentroidPeak::new(mz + i as f64 * isotopic_shift(z), t * scale));
        }
    }
    for mz in [402.1, 733.8, 901.5] {
        peaks.push(CentroidPeak::new(mz, 5.0));
    }
    peaks.sort_by(|a, b| a.mass.total_cmp(&b.mass));
    peaks
}

fn main() -> Result<(), DeisotopeError> {
    // Build the table of theoretical isotopic abundances from the peptide averagine.
    // This is the expensive part, so do it once and clone the deisotoper for each thread.
    let table = IsotopeTableParams {
        model: IsotopicModels::Peptide,
        max_mass: 4000.0,
        ..Default::default()
    }
    .build()?;

    let params = DeisotoperParams::new(1, 4).with_intensity_floor(20.0);
    let mut deisotoper = Deisotoper::new(params, table)?;
    let mut tracker = ElutionTracker::new(ElutionParams::default());

    for (scan, scale) in [(1u32, 500.0), (2, 2000.0), (3, 3500.0), (4, 1200.0)] {
        let mut data = deisotoper
            .centroid_data(make_scan(scale))?
            .with_scan(scan, Some(scan as f64 * 0.05));
        let peaks = deisotoper.process(&mut data)?;

        // Count the charge states found in this scan to prove something happened
        let mut charges: BTreeMap<i32, usize> = BTreeMap::new();
        for peak in peaks.iter() {
            *charges.entry(peak.charge).or_default() += 1;
        }
        println!("Scan {scan}: {charges:?}");

        tracker.add_scan(scan, data.retention_time, peaks)?;
    }

    let mut lcms = LCMSCData::new(LCMSParams::default());
    tracker.finish(&mut lcms)?;
    for peak in lcms.get_all_peaks() {
        println!(
            "{:0.4} z={} apex={} area={:0.2} scans={}..{}",
            peak.apex_mz, peak.charge, peak.apex_scan, peak.total_peak_area, peak.start_scan, peak.end_scan
        );
    }
    Ok(())
}
