use crate::models::StationStats;
use crate::processors::DistinctKeySet;
use crate::utils::constants::{
    OPEN_TABLE_INITIAL_CAPACITY, PERFECT_HASH_BUCKET_SIZE, PERFECT_HASH_MAX_PILOT,
    PERFECT_HASH_SEED_ATTEMPTS,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

const WORD_MULTIPLIER: u64 = 0x517c_c1b7_2722_0a95;
const MIX_MULTIPLIER: u64 = 0x9e37_79b9_7f4a_7c15;
const FINAL_MULTIPLIER: u64 = 0xbf58_476d_1ce4_e5b9;

/// Seeded 64-bit hash of a station name, consuming eight bytes per step.
#[inline]
pub fn hash_key(key: &[u8], seed: u64) -> u64 {
    let mut hash = seed ^ (key.len() as u64).wrapping_mul(WORD_MULTIPLIER);
    let mut rest = key;

    while let Some((word, tail)) = rest.split_first_chunk::<8>() {
        hash = (hash.rotate_left(5) ^ u64::from_le_bytes(*word)).wrapping_mul(WORD_MULTIPLIER);
        rest = tail;
    }
    if !rest.is_empty() {
        let mut word = [0u8; 8];
        word[..rest.len()].copy_from_slice(rest);
        hash = (hash.rotate_left(5) ^ u64::from_le_bytes(word)).wrapping_mul(WORD_MULTIPLIER);
    }

    hash ^= hash >> 32;
    hash = hash.wrapping_mul(FINAL_MULTIPLIER);
    hash ^ (hash >> 29)
}

/// Which key → statistics table the workers use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableStrategy {
    /// Perfect hash over discovered keys, open addressing if it cannot be built
    #[default]
    Auto,
    /// General open-addressing table with linear probing
    OpenAddressing,
    /// Perfect hash over discovered keys with an open-addressing overflow
    PerfectHash,
}

/// Per-worker key → statistics map. Never shared, so no synchronization.
pub trait StationTable<'a>: Send {
    fn get_or_create(&mut self, key: &'a [u8]) -> &mut StationStats;

    #[inline(always)]
    fn record(&mut self, key: &'a [u8], value: i32) {
        self.get_or_create(key).accumulate(value);
    }

    /// Stations holding at least one value.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys that were not known when the table was laid out.
    fn overflow_len(&self) -> usize {
        0
    }

    /// All accumulated entries, in no particular order.
    fn into_entries(self) -> Vec<(&'a [u8], StationStats)>;
}

#[derive(Debug, Clone)]
struct Slot<'a> {
    hash: u64,
    key: &'a [u8],
    stats: StationStats,
}

/// Open addressing with linear probing, kept at most half full.
#[derive(Debug, Clone)]
pub struct OpenAddressingTable<'a> {
    slots: Vec<Option<Slot<'a>>>,
    mask: usize,
    len: usize,
}

impl Default for OpenAddressingTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> OpenAddressingTable<'a> {
    pub fn new() -> Self {
        Self::with_capacity(OPEN_TABLE_INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self {
            slots: vec![None; capacity],
            mask: capacity - 1,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the slot holding `key`, or of the empty slot where it belongs.
    #[inline]
    fn probe(&self, hash: u64, key: &[u8]) -> usize {
        let mut index = hash as usize & self.mask;
        loop {
            match &self.slots[index] {
                Some(slot) if slot.hash != hash || slot.key != key => {
                    index = (index + 1) & self.mask;
                }
                _ => return index,
            }
        }
    }

    fn grow(&mut self) {
        let capacity = self.slots.len() * 2;
        let old = std::mem::replace(&mut self.slots, vec![None; capacity]);
        self.mask = capacity - 1;
        for slot in old.into_iter().flatten() {
            let index = self.probe(slot.hash, slot.key);
            self.slots[index] = Some(slot);
        }
    }
}

impl<'a> StationTable<'a> for OpenAddressingTable<'a> {
    #[inline]
    fn get_or_create(&mut self, key: &'a [u8]) -> &mut StationStats {
        if (self.len + 1) * 2 > self.slots.len() {
            self.grow();
        }

        let hash = hash_key(key, 0);
        let index = self.probe(hash, key);
        let slot = &mut self.slots[index];
        if slot.is_none() {
            self.len += 1;
        }
        &mut slot
            .get_or_insert_with(|| Slot {
                hash,
                key,
                stats: StationStats::new(),
            })
            .stats
    }

    fn len(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|slot| !slot.stats.is_empty())
            .count()
    }

    fn into_entries(self) -> Vec<(&'a [u8], StationStats)> {
        self.slots
            .into_iter()
            .flatten()
            .filter(|slot| !slot.stats.is_empty())
            .map(|slot| (slot.key, slot.stats))
            .collect()
    }
}

/// Hash-and-displace perfect hash laid out over a discovered key set.
///
/// Keys are split into small buckets by the high half of their hash; each
/// bucket gets a pilot value chosen so that every key in it lands on a free
/// slot. A lookup is one hash, one pilot load and one key comparison. A key
/// that was not in the discovered set fails the comparison and is kept in a
/// private open-addressing overflow table instead, so no station is ever
/// dropped or merged with another.
#[derive(Debug, Clone)]
pub struct PerfectHashTable<'a> {
    seed: u64,
    shift: u32,
    buckets: u64,
    pilots: Vec<u64>,
    keys: Vec<Option<&'a [u8]>>,
    stats: Vec<StationStats>,
    overflow: OpenAddressingTable<'a>,
}

#[inline(always)]
fn bucket_of(hash: u64, buckets: u64) -> usize {
    (((hash >> 32) * buckets) >> 32) as usize
}

#[inline(always)]
fn slot_of(hash: u64, pilot: u64, shift: u32) -> usize {
    ((hash ^ pilot.wrapping_mul(MIX_MULTIPLIER)).wrapping_mul(FINAL_MULTIPLIER) >> shift) as usize
}

impl<'a> PerfectHashTable<'a> {
    /// Returns `None` for an empty key set or when no seed yields a layout.
    pub fn build(keys: &DistinctKeySet<'a>) -> Option<Self> {
        let keys = keys.keys();
        if keys.is_empty() {
            return None;
        }

        let base_capacity = (keys.len() + keys.len() / 4).max(2).next_power_of_two();
        let buckets = keys.len().div_ceil(PERFECT_HASH_BUCKET_SIZE).max(1);

        (0..PERFECT_HASH_SEED_ATTEMPTS).find_map(|seed| {
            // Loosen the load factor every eight failed seeds.
            let capacity = base_capacity << (seed / 8);
            Self::try_build(keys, seed, capacity, buckets)
        })
    }

    fn try_build(keys: &[&'a [u8]], seed: u64, capacity: usize, buckets: usize) -> Option<Self> {
        let shift = 64 - capacity.trailing_zeros();
        let hashes: Vec<u64> = keys.iter().map(|key| hash_key(key, seed)).collect();

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); buckets];
        for (index, hash) in hashes.iter().enumerate() {
            members[bucket_of(*hash, buckets as u64)].push(index);
        }

        let mut order: Vec<usize> = (0..buckets).collect();
        order.sort_by_key(|&bucket| Reverse(members[bucket].len()));

        let mut taken = vec![false; capacity];
        let mut pilots = vec![0u64; buckets];
        let mut placed = Vec::with_capacity(PERFECT_HASH_BUCKET_SIZE * 2);

        for bucket in order {
            let group = &members[bucket];
            if group.is_empty() {
                break;
            }

            let pilot = (0..PERFECT_HASH_MAX_PILOT).find(|&pilot| {
                placed.clear();
                for &member in group {
                    let slot = slot_of(hashes[member], pilot, shift);
                    if taken[slot] || placed.contains(&slot) {
                        return false;
                    }
                    placed.push(slot);
                }
                true
            })?;

            for &slot in &placed {
                taken[slot] = true;
            }
            pilots[bucket] = pilot;
        }

        let mut table_keys = vec![None; capacity];
        for (key, hash) in keys.iter().zip(&hashes) {
            let pilot = pilots[bucket_of(*hash, buckets as u64)];
            table_keys[slot_of(*hash, pilot, shift)] = Some(*key);
        }

        Some(Self {
            seed,
            shift,
            buckets: buckets as u64,
            pilots,
            keys: table_keys,
            stats: vec![StationStats::new(); capacity],
            overflow: OpenAddressingTable::with_capacity(16),
        })
    }

    pub fn capacity(&self) -> usize {
        self.keys.len()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Slot of a discovered key, `None` for anything else.
    #[inline(always)]
    pub fn slot(&self, key: &[u8]) -> Option<usize> {
        let hash = hash_key(key, self.seed);
        let pilot = self.pilots[bucket_of(hash, self.buckets)];
        let slot = slot_of(hash, pilot, self.shift);
        (self.keys[slot] == Some(key)).then_some(slot)
    }
}

impl<'a> StationTable<'a> for PerfectHashTable<'a> {
    #[inline]
    fn get_or_create(&mut self, key: &'a [u8]) -> &mut StationStats {
        match self.slot(key) {
            Some(slot) => &mut self.stats[slot],
            None => self.overflow.get_or_create(key),
        }
    }

    fn len(&self) -> usize {
        self.stats.iter().filter(|stats| !stats.is_empty()).count() + self.overflow.len()
    }

    fn overflow_len(&self) -> usize {
        self.overflow.len()
    }

    fn into_entries(self) -> Vec<(&'a [u8], StationStats)> {
        let mut entries: Vec<_> = self
            .keys
            .into_iter()
            .zip(self.stats)
            .filter_map(|(key, stats)| Some((key?, stats)))
            .filter(|(_, stats)| !stats.is_empty())
            .collect();
        entries.extend(self.overflow.into_entries());
        entries
    }
}
