mod args;
mod config;
mod driver;
mod proc;
mod progress;
mod time_range;
mod types;
mod write;

pub use args::*;
pub use config::{ProcessingConfig, CONFIG_FILE_NAME, ENV_PREFIX};
pub use driver::{LCDeisotoper, LCDeisotoperError};
pub use progress::ProgressRecord;
pub use time_range::{TimeRange, TimeRangeParseError};
pub use types::ScanPeaks;
pub use write::{open_output, write_elution_peaks, OutputSink, REPORT_HEADER};
