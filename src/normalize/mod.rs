pub mod alcosan;
pub mod nwps;
pub mod nws;
pub mod open_meteo;
pub mod usgs;

use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeStats {
    pub total_records: usize,
    pub normalized: usize,
    /// Records that were well formed but carried no usable value
    /// (empty series, sentinel values, null forecast points).
    pub no_data: usize,
    pub malformed: usize,
}

impl NormalizeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_ok(&mut self) {
        self.total_records += 1;
        self.normalized += 1;
    }

    pub(crate) fn record_no_data(&mut self) {
        self.total_records += 1;
        self.no_data += 1;
    }

    pub(crate) fn record_malformed(&mut self, source: &str, index: usize, reason: &str) {
        self.total_records += 1;
        self.malformed += 1;
        warn!(
            "Skipping malformed {} record {} (failure {}/{}): {}",
            source,
            index + 1,
            self.malformed,
            self.total_records,
            reason
        );
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total_records == 0 {
            0.0
        } else {
            self.malformed as f64 / self.total_records as f64
        }
    }
}
