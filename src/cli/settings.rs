use crate::cli::args::RunOptions;
use crate::error::Result;
use crate::processors::{DiscoveryPolicy, ParallelProcessor, TableStrategy};
use crate::readers::{ReadMode, ScanStrategy};
use crate::utils::constants::{
    DEFAULT_DISCOVERY_MAX_BYTES, DEFAULT_DISCOVERY_STABLE_WINDOW, ENV_PREFIX,
};
use crate::writers::OutputFormat;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use validator::Validate;

/// Run settings, layered as defaults < settings file < `BRC_*` environment < CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    #[validate(range(min = 1, max = 4096))]
    pub workers: usize,

    pub read_mode: ReadMode,
    pub scanner: ScanStrategy,
    pub table: TableStrategy,
    pub tree_merge: bool,

    #[validate(range(min = 1))]
    pub discovery_stable_window: usize,

    #[validate(range(min = 1))]
    pub discovery_max_bytes: usize,

    #[validate(range(min = 1))]
    pub expected_stations: Option<usize>,

    pub format: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            read_mode: ReadMode::default(),
            scanner: ScanStrategy::default(),
            table: TableStrategy::default(),
            tree_merge: false,
            discovery_stable_window: DEFAULT_DISCOVERY_STABLE_WINDOW,
            discovery_max_bytes: DEFAULT_DISCOVERY_MAX_BYTES,
            expected_stations: None,
            format: OutputFormat::default(),
        }
    }
}

impl Settings {
    /// Build settings from the optional file and the environment.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_file {
            debug!("Loading settings from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Apply per-run command line flags on top of the loaded layers.
    pub fn apply_overrides(mut self, options: &RunOptions) -> Self {
        if let Some(workers) = options.workers {
            self.workers = workers;
        }
        if let Some(read_mode) = options.read_mode {
            self.read_mode = read_mode;
        }
        if let Some(scanner) = options.scanner {
            self.scanner = scanner;
        }
        if let Some(table) = options.table {
            self.table = table;
        }
        if options.tree_merge {
            self.tree_merge = true;
        }
        if options.expected_stations.is_some() {
            self.expected_stations = options.expected_stations;
        }
        if let Some(format) = options.format {
            self.format = format;
        }
        self
    }

    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn discovery_policy(&self) -> DiscoveryPolicy {
        DiscoveryPolicy {
            stable_window: self.discovery_stable_window,
            max_bytes: self.discovery_max_bytes,
            max_keys: self.expected_stations,
        }
    }

    pub fn to_processor(&self) -> ParallelProcessor {
        ParallelProcessor::new(self.workers)
            .with_read_mode(self.read_mode)
            .with_scan_strategy(self.scanner)
            .with_table_strategy(self.table)
            .with_discovery_policy(self.discovery_policy())
            .with_tree_merge(self.tree_merge)
    }
}
