use crate::error::{ProcessingError, Result};
use crate::readers::Partition;
use crate::utils::constants::{SEPARATOR, TERMINATOR};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Finds the next occurrence of a byte at or after `from`.
///
/// Every implementation must return exactly what [`ScalarSearch`] returns for
/// the same input; the faster ones are accelerators, not variations.
pub trait DelimiterSearch: Copy + Send + Sync + fmt::Debug {
    fn find_next(&self, haystack: &[u8], from: usize, target: u8) -> Option<usize>;
}

/// Byte-at-a-time reference search.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarSearch;

impl DelimiterSearch for ScalarSearch {
    #[inline]
    fn find_next(&self, haystack: &[u8], from: usize, target: u8) -> Option<usize> {
        haystack
            .get(from..)?
            .iter()
            .position(|&byte| byte == target)
            .map(|offset| from + offset)
    }
}

/// Portable fixed-width lane scan over 8-byte words (SWAR).
///
/// Each word is XORed with the broadcast target so matching lanes become zero,
/// then the classic `(x - 0x01..) & !x & 0x80..` trick yields a per-lane mask.
/// The lowest set lane is always a true match, so `trailing_zeros` resolves the
/// first index. Bytes past the last full word go through the scalar loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaneSearch;

const LANES: usize = 8;

impl LaneSearch {
    const LOW_BITS: u64 = 0x0101_0101_0101_0101;
    const HIGH_BITS: u64 = 0x8080_8080_8080_8080;

    #[inline(always)]
    fn match_mask(word: u64, pattern: u64) -> u64 {
        let lanes = word ^ pattern;
        lanes.wrapping_sub(Self::LOW_BITS) & !lanes & Self::HIGH_BITS
    }
}

impl DelimiterSearch for LaneSearch {
    #[inline]
    fn find_next(&self, haystack: &[u8], from: usize, target: u8) -> Option<usize> {
        let mut rest = haystack.get(from..)?;
        let pattern = u64::from_le_bytes([target; LANES]);
        let mut position = from;

        while let Some((chunk, tail)) = rest.split_first_chunk::<LANES>() {
            let mask = Self::match_mask(u64::from_le_bytes(*chunk), pattern);
            if mask != 0 {
                return Some(position + (mask.trailing_zeros() / 8) as usize);
            }
            position += LANES;
            rest = tail;
        }

        ScalarSearch.find_next(haystack, position, target)
    }
}

/// `memchr`, which picks SSE2/AVX2/NEON kernels at runtime and falls back to
/// its own word-at-a-time loop elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemchrSearch;

impl DelimiterSearch for MemchrSearch {
    #[inline]
    fn find_next(&self, haystack: &[u8], from: usize, target: u8) -> Option<usize> {
        memchr::memchr(target, haystack.get(from..)?).map(|offset| from + offset)
    }
}

/// Which delimiter search the workers use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStrategy {
    /// Best available for this platform (memchr)
    #[default]
    Auto,
    /// Byte-by-byte reference loop
    Scalar,
    /// Portable 8-lane word scan
    Lanes,
    /// Runtime-dispatched SIMD via memchr
    Memchr,
}

impl ScanStrategy {
    pub fn resolve(self) -> Self {
        match self {
            ScanStrategy::Auto => ScanStrategy::Memchr,
            other => other,
        }
    }
}

/// One `name;value` record, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub name: &'a [u8],
    pub value: &'a [u8],
    /// Absolute byte offset of the record start.
    pub offset: usize,
}

impl Record<'_> {
    /// Parsed value in tenths, or a `Parse` error carrying the record offset.
    #[inline]
    pub fn tenths(&self) -> Result<i32> {
        crate::models::parse_tenths(self.value).ok_or_else(|| ProcessingError::Parse {
            literal: String::from_utf8_lossy(self.value).into_owned(),
            offset: self.offset + self.name.len() + 1,
        })
    }
}

/// Walks the records of one partition strictly forward.
pub struct RecordScanner<'a, S> {
    bytes: &'a [u8],
    cursor: usize,
    base: usize,
    partition: usize,
    allow_unterminated: bool,
    search: S,
}

impl<'a, S: DelimiterSearch> RecordScanner<'a, S> {
    /// `bytes` is the partition's view; `partition` locates it in the input.
    ///
    /// Only a partition that ends at the end of the input may finish with an
    /// unterminated record.
    pub fn new(bytes: &'a [u8], partition: &Partition, input_len: usize, search: S) -> Self {
        Self {
            bytes,
            cursor: 0,
            base: partition.start,
            partition: partition.index,
            allow_unterminated: partition.end == input_len,
            search,
        }
    }

    /// Scan a whole buffer as a single partition.
    pub fn over(bytes: &'a [u8], search: S) -> Self {
        Self {
            bytes,
            cursor: 0,
            base: 0,
            partition: 0,
            allow_unterminated: true,
            search,
        }
    }

    /// Absolute offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.base + self.cursor
    }

    fn next_record(&mut self) -> Result<Option<Record<'a>>> {
        if self.cursor >= self.bytes.len() {
            return Ok(None);
        }

        let start = self.cursor;
        let end = match self.search.find_next(self.bytes, start, TERMINATOR) {
            Some(end) => end,
            None if self.allow_unterminated => self.bytes.len(),
            None => {
                return Err(ProcessingError::malformed(
                    self.partition,
                    self.base + start,
                    "record is not terminated before the end of its partition",
                ))
            }
        };

        let line = &self.bytes[start..end];
        // The value is at most five bytes, so the separator is found within the
        // last few positions of a well-formed line.
        let separator = line
            .iter()
            .rposition(|&byte| byte == SEPARATOR)
            .ok_or_else(|| {
                ProcessingError::malformed(
                    self.partition,
                    self.base + start,
                    format!(
                        "missing ';' separator in '{}'",
                        String::from_utf8_lossy(line)
                    ),
                )
            })?;

        if separator == 0 {
            return Err(ProcessingError::malformed(
                self.partition,
                self.base + start,
                "empty station name",
            ));
        }

        self.cursor = end + 1;
        Ok(Some(Record {
            name: &line[..separator],
            value: &line[separator + 1..],
            offset: self.base + start,
        }))
    }
}

impl<'a, S: DelimiterSearch> Iterator for RecordScanner<'a, S> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                // Fail fast: nothing after a malformed record is trusted.
                self.cursor = self.bytes.len();
                Some(Err(e))
            }
        }
    }
}
