pub mod analysis;
pub mod args;
pub mod classify;
pub mod fields;
pub mod query;
pub mod report;
pub mod stats;
pub mod utils;

pub use analysis::{analyze_log_file, analyze_reader, ScanOptions, DEFAULT_LOG_PATH};
pub use args::{Args, Command};
pub use query::{QueryMode, WILDCARD};
pub use report::{print_report, write_report, RankedEntry, RenderOptions, Report};
pub use stats::{Aggregation, FrequencyTable};
