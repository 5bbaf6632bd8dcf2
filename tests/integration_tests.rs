use brc_processor::cli::Settings;
use brc_processor::models::StationStats;
use brc_processor::processors::{ParallelProcessor, TableStrategy};
use brc_processor::readers::{partition, ByteSource, ReadMode, ScanStrategy};
use brc_processor::{ProcessingError, Result};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const SAMPLE: &str = "Tokyo;23.4\nParis;5.0\nTokyo;18.1\nOslo;-3.0\nParis;-0.5\n";

fn write_input(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents).unwrap();
    path
}

fn run_file(path: &Path, workers: usize) -> Result<String> {
    let outcome = ParallelProcessor::new(workers).process_file(path, None)?;
    Ok(outcome.summary.to_string())
}

fn run_bytes(
    bytes: &[u8],
    processor: &ParallelProcessor,
) -> Result<BTreeMap<Vec<u8>, StationStats>> {
    let source = ByteSource::from_bytes(bytes.to_vec());
    let outcome = processor.process_source(&source, None)?;
    Ok(outcome
        .summary
        .stations()
        .iter()
        .map(|s| (s.name.clone(), s.stats))
        .collect())
}

/// Straightforward single-threaded aggregation used as the reference result.
fn naive_aggregate(bytes: &[u8]) -> BTreeMap<Vec<u8>, StationStats> {
    let mut table: BTreeMap<Vec<u8>, StationStats> = BTreeMap::new();
    for line in bytes.split(|&b| b == b'\n').filter(|l| !l.is_empty()) {
        let split = line.iter().rposition(|&b| b == b';').unwrap();
        let (name, value) = (&line[..split], &line[split + 1..]);
        let text = std::str::from_utf8(value).unwrap();
        let tenths = (text.parse::<f64>().unwrap() * 10.0).round() as i32;
        table.entry(name.to_vec()).or_default().accumulate(tenths);
    }
    table
}

struct SplitMix(u64);

impl SplitMix {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

fn generate(seed: u64, stations: usize, records: usize) -> Vec<u8> {
    let mut rng = SplitMix(seed);
    let names: Vec<String> = (0..stations)
        .map(|i| match i % 4 {
            0 => format!("Station {}", i),
            1 => format!("Ångström-{}", i),
            2 => "x".repeat(1 + i % 40),
            _ => format!("São Paulo;Norte {}", i),
        })
        .collect();

    let mut out = Vec::new();
    for _ in 0..records {
        let name = &names[(rng.next() % stations as u64) as usize];
        let value = (rng.next() % 1999) as i32 - 999;
        let sign = if value < 0 { "-" } else { "" };
        writeln!(out, "{};{}{}.{}", name, sign, value.abs() / 10, value.abs() % 10).unwrap();
    }
    out
}

#[test]
fn test_end_to_end_sample() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_input(&dir, "measurements.txt", SAMPLE.as_bytes());
    assert_eq!(
        run_file(&path, 2)?,
        "{Oslo=-3.0/-3.0/-3.0, Paris=-0.5/2.3/5.0, Tokyo=18.1/20.8/23.4}"
    );
    Ok(())
}

#[test]
fn test_single_record() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_input(&dir, "one.txt", b"A;0.0\n");
    assert_eq!(run_file(&path, 1)?, "{A=0.0/0.0/0.0}");
    Ok(())
}

#[test]
fn test_last_record_without_terminator() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_input(&dir, "open.txt", b"A;1.0\nB;-2.5\nA;3.0");
    assert_eq!(run_file(&path, 3)?, "{A=1.0/2.0/3.0, B=-2.5/-2.5/-2.5}");
    Ok(())
}

#[test]
fn test_more_workers_than_records() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_input(&dir, "few.txt", b"A;1.0\nB;2.0\n");
    assert_eq!(run_file(&path, 64)?, "{A=1.0/1.0/1.0, B=2.0/2.0/2.0}");
    Ok(())
}

#[test]
fn test_empty_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_input(&dir, "empty.txt", b"");
    assert_eq!(run_file(&path, 4)?, "{}");
    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = run_file(&dir.path().join("nope.txt"), 2).unwrap_err();
    assert!(matches!(err, ProcessingError::InputOpen { .. }));
    assert_eq!(err.kind(), "IOError");
}

#[test]
fn test_bad_value_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, "bad.txt", b"A;1.0\nB;12.34\n");
    let err = run_file(&path, 2).unwrap_err();
    assert!(matches!(err, ProcessingError::Parse { .. }));
    assert_eq!(err.exit_code(), 65);
}

#[test]
fn test_missing_separator_is_malformed() {
    let dir = TempDir::new().unwrap();
    let path = write_input(&dir, "bad.txt", b"A;1.0\nno separator here\nB;2.0\n");
    let err = run_file(&path, 1).unwrap_err();
    assert_eq!(err.kind(), "MalformedRecordError");
}

#[test]
fn test_matches_reference_for_many_worker_counts() -> Result<()> {
    let bytes = generate(7, 60, 20_000);
    let expected = naive_aggregate(&bytes);

    for workers in [1, 2, 3, 4, 5, 7, 8, 13, 16, 31, 64] {
        let actual = run_bytes(&bytes, &ParallelProcessor::new(workers))?;
        assert_eq!(actual, expected, "workers = {}", workers);
    }
    Ok(())
}

#[test]
fn test_partitions_cover_input_exactly() -> Result<()> {
    let bytes = generate(11, 25, 5_000);
    for workers in [1, 2, 6, 17, 200] {
        let parts = partition(&bytes, workers)?;
        assert_eq!(parts.len(), workers);
        assert_eq!(parts[0].start, 0);
        assert_eq!(parts[workers - 1].end, bytes.len());
        for pair in parts.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for part in parts.iter().filter(|p| p.start > 0) {
            assert_eq!(bytes[part.start - 1], b'\n');
        }
    }
    Ok(())
}

#[test]
fn test_strategies_agree() -> Result<()> {
    let bytes = generate(23, 500, 30_000);
    let expected = naive_aggregate(&bytes);

    for scanner in [ScanStrategy::Scalar, ScanStrategy::Lanes, ScanStrategy::Memchr] {
        for table in [
            TableStrategy::OpenAddressing,
            TableStrategy::PerfectHash,
            TableStrategy::Auto,
        ] {
            for tree_merge in [false, true] {
                let processor = ParallelProcessor::new(6)
                    .with_scan_strategy(scanner)
                    .with_table_strategy(table)
                    .with_tree_merge(tree_merge);
                let actual = run_bytes(&bytes, &processor)?;
                assert_eq!(
                    actual, expected,
                    "scanner {:?} table {:?} tree {}",
                    scanner, table, tree_merge
                );
            }
        }
    }
    Ok(())
}

#[test]
fn test_incomplete_discovery_still_exact() -> Result<()> {
    let bytes = generate(5, 300, 10_000);
    let expected = naive_aggregate(&bytes);

    let settings = Settings {
        workers: 4,
        table: TableStrategy::PerfectHash,
        expected_stations: Some(10),
        ..Settings::default()
    };
    let source = ByteSource::from_bytes(bytes);
    let outcome = settings.to_processor().process_source(&source, None)?;

    assert_eq!(outcome.report.discovered_keys, Some(10));
    assert!(outcome.report.overflow_keys > 0);
    let actual: BTreeMap<Vec<u8>, StationStats> = outcome
        .summary
        .stations()
        .iter()
        .map(|s| (s.name.clone(), s.stats))
        .collect();
    assert_eq!(actual, expected);
    Ok(())
}

#[test]
fn test_mmap_and_buffered_agree() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_input(&dir, "gen.txt", &generate(3, 40, 8_000));

    let mapped = ParallelProcessor::new(4)
        .with_read_mode(ReadMode::Mmap)
        .process_file(&path, None)?;
    let buffered = ParallelProcessor::new(4)
        .with_read_mode(ReadMode::Buffered)
        .process_file(&path, None)?;

    assert_eq!(mapped.summary.to_string(), buffered.summary.to_string());
    assert!(mapped.report.memory_mapped);
    assert!(!buffered.report.memory_mapped);
    assert_eq!(mapped.report.records, 8_000);
    assert_eq!(buffered.report.records, 8_000);
    Ok(())
}

#[test]
fn test_settings_file_drives_processor() -> Result<()> {
    let dir = TempDir::new()?;
    let settings_path = write_input(
        &dir,
        "brc.toml",
        b"workers = 3\nscanner = \"scalar\"\ntable = \"open-addressing\"\n",
    );
    let input = write_input(&dir, "measurements.txt", SAMPLE.as_bytes());

    let settings = Settings::load(Some(&settings_path))?.validated()?;
    let outcome = settings.to_processor().process_file(&input, None)?;

    assert_eq!(outcome.report.workers, 3);
    assert_eq!(outcome.report.scan_strategy, ScanStrategy::Scalar);
    assert_eq!(outcome.report.table_strategy, TableStrategy::OpenAddressing);
    assert_eq!(outcome.report.records, 5);
    Ok(())
}
