pub mod byte_source;
pub mod partitioner;
pub mod record_scanner;

pub use byte_source::{ByteSource, ReadMode};
pub use partitioner::{partition, Partition};
pub use record_scanner::{
    DelimiterSearch, LaneSearch, MemchrSearch, Record, RecordScanner, ScalarSearch, ScanStrategy,
};
