use crate::models::StationStats;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationSummary {
    pub name: Vec<u8>,
    pub stats: StationStats,
}

impl StationSummary {
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    pub fn to_report(&self) -> StationReport {
        StationReport {
            station: self.name_lossy().into_owned(),
            min: self.stats.min().as_f64(),
            mean: self.stats.mean().map(|m| m.as_f64()).unwrap_or_default(),
            max: self.stats.max().as_f64(),
            count: self.stats.count,
        }
    }
}

impl fmt::Display for StationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Rows are only built from accumulated stats, so a mean always exists.
        let mean = self.stats.mean().unwrap_or_default();
        write!(
            f,
            "{}={}/{}/{}",
            self.name_lossy(),
            self.stats.min(),
            mean,
            self.stats.max()
        )
    }
}

/// Serializable view of one station for structured output.
#[derive(Debug, Clone, Serialize)]
pub struct StationReport {
    pub station: String,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub count: i64,
}

/// Final result: stations sorted ascending by name bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    stations: Vec<StationSummary>,
}

impl Summary {
    /// Build from a merged table; stations that never accumulated a value are dropped.
    pub fn from_merged<K: AsRef<[u8]>>(merged: BTreeMap<K, StationStats>) -> Self {
        let stations = merged
            .into_iter()
            .filter(|(_, stats)| !stats.is_empty())
            .map(|(name, stats)| StationSummary {
                name: name.as_ref().to_vec(),
                stats,
            })
            .collect();
        Self { stations }
    }

    pub fn stations(&self) -> &[StationSummary] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn total_count(&self) -> i64 {
        self.stations.iter().map(|s| s.stats.count).sum()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, station) in self.stations.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", station)?;
        }
        f.write_str("}")
    }
}
