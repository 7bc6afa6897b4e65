use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Instant;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use mzdata::io::{
    infer_format, infer_from_stream,
    mgf::MGFReaderType,
    mzml::MzMLReaderType,
    MassSpectrometryFormat, PreBufferedStream, RestartableGzDecoder, StreamingSpectrumIterator,
};
#[cfg(feature = "mzmlb")]
use mzdata::io::mzmlb::MzMLbReaderType;
use mzdata::prelude::*;

use lcdeisotope::{DeisotopeError, Deisotoper, ElutionTracker, LCMSCData};

use crate::args::{ArgChargeRange, ArgIsotopicModels};
use crate::config::ProcessingConfig;
use crate::proc::prepare_processing;
use crate::time_range::TimeRange;
use crate::types::{CPeak, DPeak, SpectrumType, BUFFER_SIZE};
use crate::write::{collate_results, open_output, write_elution_peaks};

#[derive(Debug, Error)]
pub enum LCDeisotoperError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("The input file format for {0} was either unknown or not supported ({1:?})")]
    FormatUnknownOrNotSupportedError(String, MassSpectrometryFormat),
    #[error("The input file format from STDIN was either unknown or not supported ({0:?})")]
    FormatUnknownOrNotSupportedErrorStdIn(MassSpectrometryFormat),
    #[error("An error occurred while deisotoping: {0}")]
    DeisotopeError(
        #[source]
        #[from]
        DeisotopeError,
    ),
    #[error("Failed to read the configuration: {0}")]
    ConfigError(
        #[source]
        #[from]
        Box<figment::Error>,
    ),
    #[error("Failed to write the configuration: {0}")]
    ConfigWriteError(
        #[source]
        #[from]
        toml::ser::Error,
    ),
    #[error("A worker thread panicked: {0}")]
    ThreadError(String),
}

impl From<figment::Error> for LCDeisotoperError {
    fn from(value: figment::Error) -> Self {
        Self::ConfigError(Box::new(value))
    }
}

/// Deisotope the spectra of an LC-MS run and trace their monoisotopic peaks over time.
///
/// Read a centroided mzML or MGF file or stream, find the monoisotopic peak of each
/// isotopic pattern in every spectrum, link them across scans into elution peaks, and
/// write those out as a tab-separated table.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[command(author, version)]
#[serde(default)]
pub struct LCDeisotoper {
    /// The path to read the input spectra from, or if '-' is passed, read from STDIN
    #[arg()]
    pub input_file: String,

    /// The path to write the elution peak table to, or if '-' is passed, write to STDOUT.
    ///
    /// If the path ends with `.gz`, the table is gzip compressed.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    pub output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `lcdeisotoper.toml` in the working directory.
    /// Environment variables prefixed with `LCDEISOTOPER_` will be read too, using `__`
    /// to separate nested keys.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Write the effective processing configuration to this path as TOML
    #[arg(long = "write-config")]
    pub write_config: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    pub threads: i32,

    /// The time range to process, denoted (start?)-(stop?)
    #[arg(
        short='r',
        long="time-range",
        value_parser=TimeRange::from_str,
        value_name="BEGIN-END",
        long_help=r#"The time range to process, denoted (start?)-(stop?)

If a start is not specified, processing begins from the start of the run.
If a stop is not specified, processing stops at the end of the run.
"#
    )]
    pub time_range: Option<TimeRange>,

    /// The range of charge states to consider for each peak denoted (low)-(high) or (high)
    #[arg(short = 'z', long = "charge-range")]
    pub charge_range: Option<ArgChargeRange>,

    /// The MS level of the spectra to deisotope
    #[arg(long = "ms-level", default_value_t = 1)]
    pub ms_level: u8,

    /// The averagine model to build the isotope table from
    #[arg(short = 'a', long = "isotopic-model")]
    pub isotopic_model: Option<ArgIsotopicModels>,

    #[arg(
        skip,
        help = "The parameters of each processing stage, read from configuration files and the environment"
    )]
    pub processing: ProcessingConfig,
}

impl Default for LCDeisotoper {
    fn default() -> Self {
        Self {
            input_file: "-".to_string(),
            output_file: PathBuf::from("-"),
            log_file: None,
            config_file: None,
            write_config: None,
            threads: -1,
            time_range: None,
            charge_range: None,
            ms_level: 1,
            isotopic_model: None,
            processing: ProcessingConfig::default(),
        }
    }
}

impl LCDeisotoper {
    fn create_threadpool(&self) -> Result<rayon::ThreadPool, LCDeisotoperError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} cores", num_threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| LCDeisotoperError::ThreadError(e.to_string()))
    }

    /// Replace the processing configuration with the layered file and environment
    /// configuration.
    pub fn load_config(&mut self) -> Result<(), LCDeisotoperError> {
        self.processing = ProcessingConfig::load(self.config_file.as_deref())?;
        Ok(())
    }

    /// The processing configuration with command line options applied on top
    pub fn effective_config(&self) -> ProcessingConfig {
        let mut config = self.processing;
        if let Some(charge_range) = self.charge_range {
            config.deisotoper.min_charge = charge_range.0;
            config.deisotoper.max_charge = charge_range.1;
        }
        if let Some(model) = self.isotopic_model {
            config.isotope_table.model = model.into();
        }
        config
    }

    pub fn main(&self) -> Result<(), LCDeisotoperError> {
        info!(
            "lcdeisotoper v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Input: {}", self.input_file);
        info!("Output: {}", self.output_file.display());
        let config = self.effective_config();
        if let Some(path) = self.write_config.as_ref() {
            info!("Writing configuration to {}", path.display());
            fs::write(path, config.to_toml()?)?;
        }
        self.create_threadpool()?.install(|| self.reader_then(&config))
    }

    fn reader_then(&self, config: &ProcessingConfig) -> Result<(), LCDeisotoperError> {
        if self.input_file == "-" {
            let mut buffered =
                PreBufferedStream::new_with_buffer_size(io::stdin(), 2usize.pow(20))?;
            let (ms_format, compressed) = infer_from_stream(&mut buffered)?;
            debug!("Detected {ms_format:?} from STDIN (compressed? {compressed})");
            match ms_format {
                MassSpectrometryFormat::MGF => {
                    if compressed {
                        let reader = StreamingSpectrumIterator::new(MGFReaderType::new(
                            RestartableGzDecoder::new(io::BufReader::new(buffered)),
                        ));
                        self.run_workflow(reader, config)?;
                    } else {
                        let reader = StreamingSpectrumIterator::new(MGFReaderType::new(buffered));
                        self.run_workflow(reader, config)?;
                    }
                }
                MassSpectrometryFormat::MzML => {
                    if compressed {
                        let reader = StreamingSpectrumIterator::new(MzMLReaderType::new(
                            RestartableGzDecoder::new(io::BufReader::new(buffered)),
                        ));
                        self.run_workflow(reader, config)?;
                    } else {
                        let reader = StreamingSpectrumIterator::new(MzMLReaderType::new(buffered));
                        self.run_workflow(reader, config)?;
                    }
                }
                _ => {
                    return Err(LCDeisotoperError::FormatUnknownOrNotSupportedErrorStdIn(
                        ms_format,
                    ))
                }
            }
        } else {
            let (ms_format, compressed) = infer_format(&self.input_file)?;
            debug!("Detected {ms_format:?} from path (compressed? {compressed})");
            match ms_format {
                MassSpectrometryFormat::MGF => {
                    if compressed {
                        let fh = RestartableGzDecoder::new(io::BufReader::new(fs::File::open(
                            &self.input_file,
                        )?));
                        let reader = StreamingSpectrumIterator::new(MGFReaderType::new(fh));
                        self.run_workflow(reader, config)?;
                    } else {
                        let reader = MGFReaderType::open_path(self.input_file.clone())?;
                        self.run_workflow(reader, config)?;
                    }
                }
                MassSpectrometryFormat::MzML => {
                    if compressed {
                        let fh = RestartableGzDecoder::new(io::BufReader::new(fs::File::open(
                            &self.input_file,
                        )?));
                        let reader = StreamingSpectrumIterator::new(MzMLReaderType::new(fh));
                        self.run_workflow(reader, config)?;
                    } else {
                        let reader = MzMLReaderType::open_path(self.input_file.clone())?;
                        self.run_workflow(reader, config)?;
                    }
                }
                #[cfg(feature = "mzmlb")]
                MassSpectrometryFormat::MzMLb => {
                    let reader = MzMLbReaderType::open_path(self.input_file.clone())?;
                    self.run_workflow(reader, config)?;
                }
                _ => {
                    return Err(LCDeisotoperError::FormatUnknownOrNotSupportedError(
                        self.input_file.clone(),
                        ms_format,
                    ))
                }
            }
        }
        Ok(())
    }

    fn run_workflow<
        R: RandomAccessSpectrumIterator<CPeak, DPeak, SpectrumType> + Send + 'static,
    >(
        &self,
        reader: R,
        config: &ProcessingConfig,
    ) -> Result<(), LCDeisotoperError> {
        let start = Instant::now();
        let table = config.isotope_table.build()?;
        debug!(
            "Built an isotope table with {} bins of {} Da",
            table.len(),
            table.mass_step()
        );
        let deisotoper = Deisotoper::new(config.deisotoper, table)?;
        let tracker = ElutionTracker::new(config.elution);

        let (send_solved, recv_solved) = crossbeam_channel::bounded(BUFFER_SIZE);

        let ms_level = self.ms_level;
        let time_range = self.time_range;
        let read_task = thread::spawn(move || {
            prepare_processing(reader, deisotoper, ms_level, time_range, send_solved)
        });
        let collate_task = thread::spawn(move || collate_results(recv_solved, tracker));

        let mut prog = match read_task.join() {
            Ok(prog) => prog,
            Err(e) => {
                warn!("Failed to join reader task: {e:?}");
                return Err(LCDeisotoperError::ThreadError(format!("{e:?}")));
            }
        };

        let tracker = match collate_task.join() {
            Ok(tracker) => tracker?,
            Err(e) => {
                warn!("Failed to join collator task: {e:?}");
                return Err(LCDeisotoperError::ThreadError(format!("{e:?}")));
            }
        };

        let mut lcms = LCMSCData::new(config.lcms);
        tracker.finish(&mut lcms)?;
        prog.elution_peaks = lcms.len();

        let mut writer = open_output(&self.output_file)?;
        let n_rows = write_elution_peaks(&mut writer, &lcms)?;
        writer.finish()?;
        debug!("Wrote {n_rows} rows");

        info!("Spectra Processed: {}", prog.spectra_processed);
        info!("Spectra Skipped: {}", prog.spectra_skipped);
        info!("Monoisotopic Peaks: {}", prog.mono_peaks);
        info!("Elution Peaks: {}", prog.elution_peaks);
        info!("Elapsed Time: {:0.3?}", Instant::now() - start);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_effective_config() {
        let mut driver = LCDeisotoper::try_parse_from([
            "lcdeisotoper",
            "run.mzML",
            "-z",
            "2-4",
            "-a",
            "glycan",
            "-r",
            "5-10",
        ])
        .unwrap();
        driver.processing.deisotoper.max_charge = 8;
        let config = driver.effective_config();
        assert_eq!(config.deisotoper.min_charge, 2);
        assert_eq!(config.deisotoper.max_charge, 4);
        assert_eq!(
            config.isotope_table.model,
            lcdeisotope::IsotopicModels::Glycan
        );
        assert_eq!(driver.time_range, Some(TimeRange::new(5.0, 10.0)));
        assert_eq!(driver.ms_level, 1);
    }

    #[test]
    fn test_config_without_overrides() {
        let mut driver = LCDeisotoper::try_parse_from(["lcdeisotoper", "run.mzML"]).unwrap();
        driver.processing.deisotoper.max_charge = 3;
        assert_eq!(driver.effective_config(), driver.processing);
    }
}
