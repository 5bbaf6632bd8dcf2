use crate::error::{ProcessingError, Result};
use crate::models::{StationStats, Summary};
use crate::processors::{
    discover_keys, DataMerger, DiscoveryPolicy, DiscoveryStop, OpenAddressingTable,
    PerfectHashTable, StationTable, TableStrategy,
};
use crate::readers::{
    partition, ByteSource, DelimiterSearch, LaneSearch, MemchrSearch, Partition, ReadMode,
    RecordScanner, ScalarSearch, ScanStrategy,
};
use crate::utils::progress::ProgressReporter;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What one worker did with its partition.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionReport {
    pub partition: Partition,
    pub records: u64,
    pub stations: usize,
    pub overflow_keys: usize,
}

struct WorkerOutput<'a> {
    report: PartitionReport,
    entries: Vec<(&'a [u8], StationStats)>,
}

/// Totals and choices of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub input_bytes: usize,
    pub memory_mapped: bool,
    pub workers: usize,
    pub scan_strategy: ScanStrategy,
    pub table_strategy: TableStrategy,
    pub discovered_keys: Option<usize>,
    pub discovery_stop: Option<DiscoveryStop>,
    pub partitions: Vec<PartitionReport>,
    pub records: u64,
    pub stations: usize,
    pub overflow_keys: usize,
    pub elapsed: Duration,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Input bytes:      {}", self.input_bytes)?;
        writeln!(f, "Memory mapped:    {}", self.memory_mapped)?;
        writeln!(f, "Workers:          {}", self.workers)?;
        writeln!(f, "Scanner:          {:?}", self.scan_strategy)?;
        writeln!(f, "Table:            {:?}", self.table_strategy)?;
        if let (Some(keys), Some(stop)) = (self.discovered_keys, self.discovery_stop) {
            writeln!(f, "Discovered keys:  {} (stopped: {:?})", keys, stop)?;
        }
        writeln!(f, "Records:          {}", self.records)?;
        writeln!(f, "Stations:         {}", self.stations)?;
        writeln!(f, "Overflow keys:    {}", self.overflow_keys)?;
        writeln!(f, "Elapsed:          {:.3?}", self.elapsed)?;
        writeln!(f, "Partitions:")?;
        for report in &self.partitions {
            writeln!(
                f,
                "  #{:<3} bytes {:>12}..{:<12} records {:>10} stations {:>6}",
                report.partition.index,
                report.partition.start,
                report.partition.end,
                report.records,
                report.stations
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub summary: Summary,
    pub report: RunReport,
}

/// Worker harness: one thread per partition, joined before the merge.
pub struct ParallelProcessor {
    max_workers: usize,
    read_mode: ReadMode,
    scan_strategy: ScanStrategy,
    table_strategy: TableStrategy,
    discovery: DiscoveryPolicy,
    tree_merge: bool,
}

impl ParallelProcessor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            read_mode: ReadMode::default(),
            scan_strategy: ScanStrategy::default(),
            table_strategy: TableStrategy::default(),
            discovery: DiscoveryPolicy::default(),
            tree_merge: false,
        }
    }

    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }

    pub fn with_scan_strategy(mut self, scan_strategy: ScanStrategy) -> Self {
        self.scan_strategy = scan_strategy;
        self
    }

    pub fn with_table_strategy(mut self, table_strategy: TableStrategy) -> Self {
        self.table_strategy = table_strategy;
        self
    }

    pub fn with_discovery_policy(mut self, discovery: DiscoveryPolicy) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_tree_merge(mut self, tree_merge: bool) -> Self {
        self.tree_merge = tree_merge;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Open `path` and aggregate it.
    pub fn process_file(
        &self,
        path: &Path,
        progress: Option<&ProgressReporter>,
    ) -> Result<ProcessingOutcome> {
        if let Some(p) = progress {
            p.set_message(&format!("Opening {}...", path.display()));
        }
        let source = ByteSource::open(path, self.read_mode)?;
        self.process_source(&source, progress)
    }

    /// Aggregate an already opened source.
    pub fn process_source(
        &self,
        source: &ByteSource,
        progress: Option<&ProgressReporter>,
    ) -> Result<ProcessingOutcome> {
        if self.max_workers == 0 {
            return Err(ProcessingError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }

        match self.scan_strategy.resolve() {
            ScanStrategy::Scalar => self.process_with(source, ScalarSearch, progress),
            ScanStrategy::Lanes => self.process_with(source, LaneSearch, progress),
            ScanStrategy::Auto | ScanStrategy::Memchr => {
                self.process_with(source, MemchrSearch, progress)
            }
        }
    }

    fn process_with<S: DelimiterSearch>(
        &self,
        source: &ByteSource,
        search: S,
        progress: Option<&ProgressReporter>,
    ) -> Result<ProcessingOutcome> {
        let started = Instant::now();
        let partitions = partition(source.bytes(), self.max_workers)?;
        info!(
            bytes = source.len(),
            workers = partitions.len(),
            scanner = ?self.scan_strategy.resolve(),
            "input partitioned"
        );

        let mut report = RunReport {
            input_bytes: source.len(),
            memory_mapped: source.is_mapped(),
            workers: partitions.len(),
            scan_strategy: self.scan_strategy.resolve(),
            table_strategy: TableStrategy::OpenAddressing,
            discovered_keys: None,
            discovery_stop: None,
            partitions: Vec::with_capacity(partitions.len()),
            records: 0,
            stations: 0,
            overflow_keys: 0,
            elapsed: Duration::ZERO,
        };

        let outputs = match self.table_strategy {
            TableStrategy::OpenAddressing => {
                if let Some(p) = progress {
                    p.set_message("Aggregating partitions...");
                }
                self.run_workers(source, &partitions, search, OpenAddressingTable::new)?
            }
            TableStrategy::PerfectHash | TableStrategy::Auto => {
                if let Some(p) = progress {
                    p.set_message("Discovering station names...");
                }
                let discovery = discover_keys(source.bytes(), search, &self.discovery)?;
                info!(
                    keys = discovery.keys.len(),
                    records = discovery.records,
                    bytes = discovery.bytes_scanned,
                    stop = ?discovery.stop,
                    "key discovery finished"
                );
                report.discovered_keys = Some(discovery.keys.len());
                report.discovery_stop = Some(discovery.stop);

                if let Some(p) = progress {
                    p.set_message("Aggregating partitions...");
                }
                match PerfectHashTable::build(&discovery.keys) {
                    Some(table) => {
                        info!(
                            keys = discovery.keys.len(),
                            capacity = table.capacity(),
                            seed = table.seed(),
                            "perfect hash built"
                        );
                        report.table_strategy = TableStrategy::PerfectHash;
                        self.run_workers(source, &partitions, search, || table.clone())?
                    }
                    None => {
                        warn!(
                            keys = discovery.keys.len(),
                            "perfect hash could not be built; falling back to open addressing"
                        );
                        self.run_workers(source, &partitions, search, OpenAddressingTable::new)?
                    }
                }
            }
        };

        if let Some(p) = progress {
            p.set_message("Merging worker tables...");
        }
        let mut tables = Vec::with_capacity(outputs.len());
        for output in outputs {
            report.records += output.report.records;
            report.overflow_keys += output.report.overflow_keys;
            report.partitions.push(output.report);
            tables.push(output.entries);
        }

        let merger = DataMerger::with_tree_reduce(self.tree_merge);
        let summary = merger.summarize(merger.merge_tables(tables));

        report.stations = summary.len();
        report.elapsed = started.elapsed();
        if report.overflow_keys > 0 && report.table_strategy == TableStrategy::PerfectHash {
            warn!(
                overflow_keys = report.overflow_keys,
                "stations missed by key discovery were aggregated through the overflow table"
            );
        }
        info!(
            records = report.records,
            stations = report.stations,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "aggregation complete"
        );

        Ok(ProcessingOutcome { summary, report })
    }

    /// Runs exactly one worker per partition on a dedicated pool and waits for
    /// all of them before returning.
    fn run_workers<'a, S, T, F>(
        &self,
        source: &'a ByteSource,
        partitions: &[Partition],
        search: S,
        make_table: F,
    ) -> Result<Vec<WorkerOutput<'a>>>
    where
        S: DelimiterSearch,
        T: StationTable<'a>,
        F: Fn() -> T + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(partitions.len())
            .thread_name(|index| format!("brc-worker-{}", index))
            .build()?;

        // `broadcast` runs the closure once on every pool thread, so worker `i`
        // owns partition `i` and nothing is stolen or shared.
        let outputs = pool.broadcast(|context| {
            let partition = &partitions[context.index()];
            aggregate_partition(source, partition, search, make_table())
        });

        outputs.into_iter().collect()
    }
}

impl Default for ParallelProcessor {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

fn aggregate_partition<'a, S, T>(
    source: &'a ByteSource,
    partition: &Partition,
    search: S,
    mut table: T,
) -> Result<WorkerOutput<'a>>
where
    S: DelimiterSearch,
    T: StationTable<'a>,
{
    let bytes = source.range(partition)?;
    let mut records = 0u64;

    for record in RecordScanner::new(bytes, partition, source.len(), search) {
        let record = record?;
        table.record(record.name, record.tenths()?);
        records += 1;
    }

    let overflow_keys = table.overflow_len();
    let entries = table.into_entries();
    debug!(
        partition = partition.index,
        start = partition.start,
        end = partition.end,
        records,
        stations = entries.len(),
        overflow_keys,
        "partition aggregated"
    );

    Ok(WorkerOutput {
        report: PartitionReport {
            partition: *partition,
            records,
            stations: entries.len(),
            overflow_keys,
        },
        entries,
    })
}
