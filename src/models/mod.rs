pub mod measurement;
pub mod stats;
pub mod summary;

pub use measurement::{parse_tenths, Tenths};
pub use stats::StationStats;
pub use summary::{StationReport, StationSummary, Summary};
