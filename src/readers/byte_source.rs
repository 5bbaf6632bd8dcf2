use crate::error::{ProcessingError, Result};
use crate::readers::Partition;
use clap::ValueEnum;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

/// How the input file is brought into memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadMode {
    /// Map the file read-only into the address space
    #[default]
    Mmap,
    /// Read the whole file into one heap buffer
    Buffered,
}

enum Backing {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

/// The whole input as one immutable, contiguous byte range.
///
/// The mapping (or buffer) lives exactly as long as the `ByteSource`; every
/// view handed out borrows from it, so no view can outlive the data.
pub struct ByteSource {
    backing: Backing,
}

impl ByteSource {
    pub fn open(path: &Path, mode: ReadMode) -> Result<Self> {
        let open_error = |source| ProcessingError::InputOpen {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(open_error)?;
        let len = file.metadata().map_err(open_error)?.len();
        let len = addressable_len(len).map_err(open_error)?;

        let backing = if len == 0 {
            Backing::Buffered(Vec::new())
        } else {
            match mode {
                ReadMode::Mmap => {
                    // SAFETY: the map is read-only and the input is not expected to
                    // change while the batch runs.
                    let mmap = unsafe { Mmap::map(&file) }.map_err(open_error)?;
                    Backing::Mapped(mmap)
                }
                ReadMode::Buffered => {
                    let mut buffer = Vec::with_capacity(len);
                    file.read_to_end(&mut buffer).map_err(open_error)?;
                    Backing::Buffered(buffer)
                }
            }
        };

        debug!(path = %path.display(), bytes = len, ?mode, "input source opened");
        Ok(Self { backing })
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            backing: Backing::Buffered(bytes.into()),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(mmap) => &mmap[..],
            Backing::Buffered(buffer) => buffer.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// Read-only view of one partition.
    pub fn range(&self, partition: &Partition) -> Result<&[u8]> {
        self.bytes().get(partition.start..partition.end).ok_or_else(|| {
            ProcessingError::malformed(
                partition.index,
                partition.start,
                format!(
                    "partition {}..{} lies outside the {}-byte input",
                    partition.start,
                    partition.end,
                    self.len()
                ),
            )
        })
    }
}

/// A single mapping or buffer cannot exceed `isize::MAX` bytes.
fn addressable_len(len: u64) -> io::Result<usize> {
    usize::try_from(len)
        .ok()
        .filter(|&len| len <= isize::MAX as usize)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} bytes is too large to address on this platform", len),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_mmap_and_buffered() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "Tokyo;23.4\nParis;5.0\n")?;

        let mapped = ByteSource::open(file.path(), ReadMode::Mmap)?;
        let buffered = ByteSource::open(file.path(), ReadMode::Buffered)?;

        assert!(mapped.is_mapped());
        assert!(!buffered.is_mapped());
        assert_eq!(mapped.bytes(), b"Tokyo;23.4\nParis;5.0\n");
        assert_eq!(mapped.bytes(), buffered.bytes());
        Ok(())
    }

    #[test]
    fn test_empty_file() -> Result<()> {
        let file = NamedTempFile::new()?;
        let source = ByteSource::open(file.path(), ReadMode::Mmap)?;
        assert!(source.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ByteSource::open(Path::new("/definitely/not/here.txt"), ReadMode::Mmap);
        let error = result.err().unwrap();
        assert_eq!(error.kind(), "IOError");
        assert!(error.to_string().contains("/definitely/not/here.txt"));
    }

    #[test]
    fn test_oversized_input_is_io_error() {
        assert_eq!(addressable_len(4096).unwrap(), 4096);

        let error = addressable_len(u64::MAX).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::InvalidInput);

        let error = ProcessingError::InputOpen {
            path: "huge.txt".into(),
            source: error,
        };
        assert_eq!(error.kind(), "IOError");
        assert_eq!(error.exit_code(), 74);
    }

    #[test]
    fn test_range_is_bounds_checked() {
        let source = ByteSource::from_bytes(b"a;1.0\n".to_vec());
        let inside = Partition {
            index: 0,
            start: 0,
            end: 6,
        };
        let outside = Partition {
            index: 1,
            start: 4,
            end: 9,
        };
        assert_eq!(source.range(&inside).unwrap(), b"a;1.0\n");
        assert!(source.range(&outside).is_err());
    }
}
