use crate::error::Result;
use crate::readers::{DelimiterSearch, RecordScanner};
use crate::utils::constants::{DEFAULT_DISCOVERY_MAX_BYTES, DEFAULT_DISCOVERY_STABLE_WINDOW};
use serde::Serialize;
use std::collections::HashSet;

/// Station names in first-seen order, without duplicates.
#[derive(Debug, Clone, Default)]
pub struct DistinctKeySet<'a> {
    keys: Vec<&'a [u8]>,
    seen: HashSet<&'a [u8]>,
}

impl<'a> DistinctKeySet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the key was not present yet.
    pub fn insert(&mut self, key: &'a [u8]) -> bool {
        let inserted = self.seen.insert(key);
        if inserted {
            self.keys.push(key);
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[&'a [u8]] {
        &self.keys
    }
}

/// When the discovery pass may stop looking for new station names.
///
/// None of these limits is a correctness requirement: keys that discovery
/// misses are still aggregated, just through the slower overflow path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscoveryPolicy {
    /// Consecutive records without a new key after which the set is considered complete.
    pub stable_window: usize,
    /// Maximum number of input bytes to scan.
    pub max_bytes: usize,
    /// Explicit cardinality cutoff, if the key domain is known in advance.
    pub max_keys: Option<usize>,
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self {
            stable_window: DEFAULT_DISCOVERY_STABLE_WINDOW,
            max_bytes: DEFAULT_DISCOVERY_MAX_BYTES,
            max_keys: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryStop {
    EndOfInput,
    Stable,
    KeyLimit,
    ByteBudget,
}

#[derive(Debug)]
pub struct Discovery<'a> {
    pub keys: DistinctKeySet<'a>,
    pub records: u64,
    pub bytes_scanned: usize,
    pub stop: DiscoveryStop,
}

/// Collect station names from the start of the input until the policy says the
/// key set has stopped growing.
pub fn discover_keys<'a, S: DelimiterSearch>(
    bytes: &'a [u8],
    search: S,
    policy: &DiscoveryPolicy,
) -> Result<Discovery<'a>> {
    let mut scanner = RecordScanner::over(bytes, search);
    let mut keys = DistinctKeySet::new();
    let mut records = 0u64;
    let mut since_new_key = 0usize;

    let stop = loop {
        if scanner.position() >= policy.max_bytes {
            break DiscoveryStop::ByteBudget;
        }
        let Some(record) = scanner.next() else {
            break DiscoveryStop::EndOfInput;
        };
        let record = record?;
        records += 1;

        if keys.insert(record.name) {
            since_new_key = 0;
            if policy.max_keys.is_some_and(|limit| keys.len() >= limit) {
                break DiscoveryStop::KeyLimit;
            }
        } else {
            since_new_key += 1;
            if since_new_key >= policy.stable_window {
                break DiscoveryStop::Stable;
            }
        }
    };

    Ok(Discovery {
        keys,
        records,
        bytes_scanned: scanner.position().min(bytes.len()),
        stop,
    })
}
