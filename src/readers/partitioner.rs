use crate::error::{ProcessingError, Result};
use crate::utils::constants::TERMINATOR;
use serde::Serialize;

/// A newline-aligned `[start, end)` byte span handled by exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `bytes` into `workers` disjoint spans whose union is the whole input.
///
/// Each internal cut is estimated at `i * len / workers` and then moved back to
/// just past the nearest preceding terminator. A cut that finds no terminator
/// after the previous boundary collapses into an empty partition. The last
/// partition always runs to the end of the buffer, terminated or not.
pub fn partition(bytes: &[u8], workers: usize) -> Result<Vec<Partition>> {
    if workers == 0 {
        return Err(ProcessingError::Config(
            "worker count must be at least 1".to_string(),
        ));
    }

    let len = bytes.len();
    let span = len / workers;
    let mut partitions = Vec::with_capacity(workers);
    let mut start = 0;

    for index in 0..workers {
        let end = if index + 1 == workers {
            len
        } else {
            let estimate = ((index + 1) * span).max(start);
            match memchr::memrchr(TERMINATOR, &bytes[start..estimate]) {
                Some(position) => start + position + 1,
                None => start,
            }
        };

        partitions.push(Partition { index, start, end });
        start = end;
    }

    Ok(partitions)
}
