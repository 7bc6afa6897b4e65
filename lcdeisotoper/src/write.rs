use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use crossbeam_channel::Receiver;
use flate2::{write::GzEncoder, Compression};
use tracing::{debug, info};

use lcdeisotope::{DeisotopeError, ElutionTracker, LCMSCData};

use crate::types::{ScanCollator, ScanMessage, ScanPeaks};

/// Receive deisotoped spectra, put them back into input order and feed them to
/// `tracker`. This is the only place elution traces are mutated.
pub(crate) fn collate_results(
    receiver: Receiver<ScanMessage>,
    mut tracker: ElutionTracker,
) -> Result<ElutionTracker, DeisotopeError> {
    let mut collator = ScanCollator::default();
    let mut checkpoint = Instant::now();
    let mut n_received = 0usize;
    while let Ok((key, item)) = receiver.recv() {
        n_received += 1;
        collator.receive(key, item);
        while let Some((key, item)) = collator.try_next() {
            if let Some(ScanPeaks {
                scan,
                retention_time,
                peaks,
            }) = item
            {
                tracker.add_scan(scan, retention_time, peaks)?;
                if (Instant::now() - checkpoint).as_secs_f64() > 5.0 {
                    info!(
                        "Completed Spectrum {} | Time={:0.3} | {} items in the queue",
                        key + 1,
                        retention_time.unwrap_or_default(),
                        receiver.len()
                    );
                    checkpoint = Instant::now();
                }
            }
        }
    }
    if !collator.waiting.is_empty() {
        debug!(
            "{} spectra were never released, expected {}",
            collator.waiting.len(),
            collator.next_key
        );
    }
    debug!("Collated {n_received} spectra into {} traces", tracker.len());
    Ok(tracker)
}

/// A destination for the report: STDOUT, a plain file, or a gzip compressed file
pub enum OutputSink {
    Stdout(io::BufWriter<io::Stdout>),
    File(io::BufWriter<fs::File>),
    Gzip(GzEncoder<io::BufWriter<fs::File>>),
}

impl OutputSink {
    /// Flush everything written, writing the gzip trailer if compressed
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Stdout(mut handle) => handle.flush(),
            Self::File(mut handle) => handle.flush(),
            Self::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(handle) => handle.write(buf),
            Self::File(handle) => handle.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(handle) => handle.flush(),
            Self::File(handle) => handle.flush(),
            Self::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Open `path` for writing, where `-` means STDOUT and a `.gz` extension means gzip
pub fn open_output(path: &Path) -> io::Result<OutputSink> {
    if path == Path::new("-") {
        return Ok(OutputSink::Stdout(io::BufWriter::new(io::stdout())));
    }
    let handle = io::BufWriter::new(fs::File::create(path)?);
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(OutputSink::Gzip(GzEncoder::new(handle, Compression::best())))
    } else {
        Ok(OutputSink::File(handle))
    }
}

pub const REPORT_HEADER: &[&str] = &[
    "mz",
    "charge",
    "apex_scan",
    "apex_time",
    "area",
    "apex_intensity",
    "start_scan",
    "end_scan",
    "scans",
    "score",
];

/// Write every elution peak in `lcms` as a tab-separated table, returning the number
/// of rows written.
pub fn write_elution_peaks<W: Write>(writer: &mut W, lcms: &LCMSCData) -> io::Result<usize> {
    writeln!(writer, "{}", REPORT_HEADER.join("\t"))?;
    let mut n_rows = 0;
    for peak in lcms.get_all_peaks() {
        let apex_time = peak
            .apex_retention_time
            .map(|t| format!("{t:0.4}"))
            .unwrap_or_default();
        writeln!(
            writer,
            "{:0.5}\t{}\t{}\t{}\t{:0.3}\t{:0.3}\t{}\t{}\t{}\t{:0.4}",
            peak.apex_mz,
            peak.charge,
            peak.apex_scan,
            apex_time,
            peak.total_peak_area,
            peak.apex_intensity,
            peak.start_scan,
            peak.end_scan,
            peak.scan_count,
            peak.isotope_fit_score,
        )?;
        n_rows += 1;
    }
    writer.flush()?;
    Ok(n_rows)
}
