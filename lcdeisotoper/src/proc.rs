use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use crossbeam_channel::Sender;
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use mzdata::prelude::*;
use mzdata::spectrum::SignalContinuity;
use mzpeaks::coordinate::Span1D;

use lcdeisotope::{CentroidData, Deisotoper};

use crate::progress::ProgressRecord;
use crate::time_range::TimeRange;
use crate::types::{
    CPeak, DPeak, ScanMessage, ScanPeaks, SpectrumType, PEAK_COUNT_THRESHOLD_WARNING,
};

/// Deisotope a single spectrum if it is a centroided spectrum at `ms_level`
pub(crate) fn deisotope_spectrum(
    deisotoper: &mut Deisotoper,
    scan: u32,
    mut spectrum: SpectrumType,
    ms_level: u8,
    time_range: &TimeRange,
) -> (Option<ScanPeaks>, ProgressRecord) {
    let mut prog = ProgressRecord::default();
    let id = spectrum.id().to_string();
    if spectrum.ms_level() != ms_level || !time_range.contains(&spectrum.start_time()) {
        prog.spectra_skipped += 1;
        return (None, prog);
    }
    match spectrum.signal_continuity() {
        SignalContinuity::Profile => {
            warn!(
                "Skipping {}, profile spectra must be centroided before deisotoping",
                id
            );
            prog.spectra_skipped += 1;
            return (None, prog);
        }
        SignalContinuity::Unknown => {
            debug!("Treating {} as centroided", id);
            spectrum.description_mut().signal_continuity = SignalContinuity::Centroid;
        }
        SignalContinuity::Centroid => {}
    }

    let retention_time = Some(spectrum.start_time());
    let distance = deisotoper.params().peak_group_distance;
    let data = match spectrum.try_build_centroids() {
        Ok(peaks) => {
            if peaks.len() > PEAK_COUNT_THRESHOLD_WARNING {
                trace!("{} has {} peaks", id, peaks.len());
            }
            CentroidData::from_peak_set(peaks.as_slice(), distance)
        }
        Err(e) => {
            warn!("Failed to read the peaks of {}: {e}", id);
            prog.spectra_skipped += 1;
            return (None, prog);
        }
    };

    let mut data = match data {
        Ok(data) => data.with_scan(scan, retention_time),
        Err(e) => {
            warn!("Skipping {}: {e}", id);
            prog.spectra_skipped += 1;
            return (None, prog);
        }
    };

    match deisotoper.process(&mut data) {
        Ok(peaks) => {
            trace!(
                "Found {} monoisotopic peaks in {} ({:0.3})",
                peaks.len(),
                id,
                spectrum.start_time()
            );
            prog.spectra_processed += 1;
            prog.mono_peaks += peaks.len();
            (
                Some(ScanPeaks {
                    scan,
                    retention_time,
                    peaks,
                }),
                prog,
            )
        }
        Err(e) => {
            warn!("Failed to deisotope {}: {e}", id);
            prog.spectra_skipped += 1;
            (None, prog)
        }
    }
}

/// Deisotope every spectrum from `reader` in parallel, sending the results to the
/// collator tagged with their position in the input.
pub(crate) fn prepare_processing<
    R: RandomAccessSpectrumIterator<CPeak, DPeak, SpectrumType> + Send,
>(
    mut reader: R,
    deisotoper: Deisotoper,
    ms_level: u8,
    time_range: Option<TimeRange>,
    sender: Sender<ScanMessage>,
) -> ProgressRecord {
    let init_counter = AtomicU32::new(0);
    let started = Instant::now();

    let time_range = time_range.unwrap_or_default();
    if time_range.start > 0.0 {
        info!("Starting from {}", time_range.start);
        if let Err(e) = reader.start_from_time(time_range.start) {
            warn!("Failed to seek to {}: {e}", time_range.start);
        }
    }
    let end_time = time_range.end;

    // Not every format numbers spectra while streaming, so count from the first one read
    let mut reader = reader.peekable();
    let first_index = reader.peek().map(|s| s.index()).unwrap_or_default();

    let prog: ProgressRecord = reader
        .enumerate()
        .take_while(|(_, s)| s.start_time() <= end_time)
        .par_bridge()
        .map_init(
            || {
                init_counter.fetch_add(1, Ordering::AcqRel);
                deisotoper.clone()
            },
            |deisotoper, (i, spectrum)| {
                let span = tracing::debug_span!("deisotoping", scan_id = spectrum.id(), index = i);
                let _entered = span.enter();
                let scan = (first_index + i) as u32;
                let (result, prog) =
                    deisotope_spectrum(deisotoper, scan, spectrum, ms_level, &time_range);
                (i, result, prog)
            },
        )
        .map(|(i, result, prog)| {
            if let Err(e) = sender.send((i, result)) {
                warn!("Failed to send spectrum {i}: {e}");
            }
            prog
        })
        .fold(ProgressRecord::default, ProgressRecord::sum)
        .sum();

    let elapsed = Instant::now() - started;
    debug!(
        "{} threads run for deisotoping",
        init_counter.load(Ordering::SeqCst)
    );
    info!("Deisotoping Elapsed Time: {:0.3?}", elapsed);
    prog
}
