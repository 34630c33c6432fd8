//! Ingestion stage: load raw data, split it and persist the split.

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::common::error::{PipelineError, PipelineResult};
use crate::common::ids::Fingerprint;

use super::domain::{DatasetRepo, IngestionConfig, Split, Table};

/// Result of the ingestion stage.
#[derive(Clone, Debug)]
pub struct IngestOutput {
    pub split: Split,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub raw_rows: usize,
    pub fingerprint: String,
}

pub fn ingest(repo: &dyn DatasetRepo, cfg: &IngestionConfig) -> PipelineResult<IngestOutput> {
    let raw = repo.read_raw(&cfg.raw_path)?;
    info!(
        path = %cfg.raw_path.display(),
        rows = raw.len(),
        columns = raw.headers.len(),
        "raw dataset read"
    );

    let raw_rows = raw.len();
    let fingerprint = fingerprint(&raw);
    let split = shuffle_split(raw, cfg.test_size, cfg.random_state)?;

    let train_path = cfg.train_path();
    let test_path = cfg.test_path();
    repo.write_table(&train_path, &split.train)?;
    repo.write_table(&test_path, &split.test)?;
    info!(
        train = split.train.len(),
        test = split.test.len(),
        fingerprint = %fingerprint,
        "train/test split written"
    );

    Ok(IngestOutput {
        split,
        train_path,
        test_path,
        raw_rows,
        fingerprint,
    })
}

/// Shuffle rows with a seeded RNG and move `round(n * test_size)` of them to the test side.
///
/// Both sides always receive at least one row.
pub fn shuffle_split(table: Table, test_size: f64, seed: u64) -> PipelineResult<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::invalid(format!(
            "test_size must lie in (0, 1), got {test_size}"
        )));
    }
    let n = table.len();
    if n < 2 {
        return Err(PipelineError::invalid(format!(
            "need at least two rows to split, got {n}"
        )));
    }

    let Table { headers, mut rows } = table;
    let mut rng = StdRng::seed_from_u64(seed);
    rows.shuffle(&mut rng);

    let test_len = ((n as f64) * test_size).round() as usize;
    let test_len = test_len.clamp(1, n - 1);
    let test_rows = rows.split_off(n - test_len);

    Ok(Split {
        train: Table::new(headers.clone(), rows),
        test: Table::new(headers, test_rows),
    })
}

pub fn fingerprint(table: &Table) -> String {
    let mut hasher = Fingerprint::new();
    hasher.update_record(&table.headers);
    for row in &table.rows {
        hasher.update_record(row);
    }
    hasher.finish_hex()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::repo_fs::FsDatasetRepo;
    use std::fs;
    use tempfile::tempdir;

    fn numbered(n: usize) -> Table {
        Table::new(
            vec!["x".into(), "target".into()],
            (0..n)
                .map(|i| vec![i.to_string(), (i * 2).to_string()])
                .collect(),
        )
    }

    #[test]
    fn split_sizes_and_determinism() {
        let a = shuffle_split(numbered(10), 0.2, 42).unwrap();
        let b = shuffle_split(numbered(10), 0.2, 42).unwrap();
        assert_eq!(a.train.len(), 8);
        assert_eq!(a.test.len(), 2);
        assert_eq!(a.test.rows, b.test.rows);

        let mut all: Vec<_> = a.train.rows.iter().chain(a.test.rows.iter()).cloned().collect();
        all.sort();
        let mut expected = numbered(10).rows;
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn split_keeps_one_row_on_each_side() {
        let tiny = shuffle_split(numbered(2), 0.01, 1).unwrap();
        assert_eq!((tiny.train.len(), tiny.test.len()), (1, 1));
        let heavy = shuffle_split(numbered(3), 0.99, 1).unwrap();
        assert_eq!((heavy.train.len(), heavy.test.len()), (1, 2));
    }

    #[test]
    fn split_rejects_bad_inputs() {
        assert!(shuffle_split(numbered(10), 0.0, 1).is_err());
        assert!(shuffle_split(numbered(10), 1.0, 1).is_err());
        assert!(shuffle_split(numbered(1), 0.5, 1).is_err());
    }

    #[test]
    fn ingest_writes_split_files() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        fs::write(&raw, "x,target\n1,2\n2,4\n3,6\n4,8\n5,10\n").unwrap();
        let cfg = IngestionConfig {
            raw_path: raw,
            processed_dir: dir.path().join("processed"),
            test_size: 0.4,
            random_state: 7,
        };

        let out = ingest(&FsDatasetRepo::new(), &cfg).unwrap();
        assert_eq!(out.raw_rows, 5);
        assert_eq!(out.split.test.len(), 2);
        assert!(out.train_path.exists());
        assert!(out.test_path.exists());
        assert_eq!(out.fingerprint.len(), 16);
    }
}
