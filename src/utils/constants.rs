/// Record layout
pub const SEPARATOR: u8 = b';';
pub const TERMINATOR: u8 = b'\n';

/// Default input file
pub const DEFAULT_INPUT_FILE: &str = "measurements.txt";

/// Environment prefix for settings (e.g. BRC_WORKERS)
pub const ENV_PREFIX: &str = "BRC";

/// Key discovery defaults
pub const DEFAULT_DISCOVERY_STABLE_WINDOW: usize = 1_000_000;
pub const DEFAULT_DISCOVERY_MAX_BYTES: usize = 64 * 1024 * 1024; // 64MB

/// Perfect hash construction
pub const PERFECT_HASH_BUCKET_SIZE: usize = 4;
pub const PERFECT_HASH_SEED_ATTEMPTS: u64 = 32;
pub const PERFECT_HASH_MAX_PILOT: u64 = 1 << 16;

/// Open addressing
pub const OPEN_TABLE_INITIAL_CAPACITY: usize = 1024;

