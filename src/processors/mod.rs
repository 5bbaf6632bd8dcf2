pub mod aggregate_table;
pub mod data_merger;
pub mod key_discovery;
pub mod parallel_processor;

pub use aggregate_table::{
    hash_key, OpenAddressingTable, PerfectHashTable, StationTable, TableStrategy,
};
pub use data_merger::{DataMerger, MergedTable};
pub use key_discovery::{discover_keys, Discovery, DiscoveryPolicy, DiscoveryStop, DistinctKeySet};
pub use parallel_processor::{ParallelProcessor, PartitionReport, ProcessingOutcome, RunReport};
