//! Transformation stage: fit the preprocessor on the training split and encode both splits.

use std::path::PathBuf;

use tracing::info;

use crate::common::error::{PipelineError, PipelineResult};
use crate::data::domain::{DatasetRepo, Split};

use super::domain::{FeatureMatrix, Preprocessor, TransformationConfig};

#[derive(Clone, Debug)]
pub struct TransformOutput {
    pub preprocessor: Preprocessor,
    pub train: FeatureMatrix,
    pub test: FeatureMatrix,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
}

pub fn transform(
    repo: &dyn DatasetRepo,
    cfg: &TransformationConfig,
    split: &Split,
) -> PipelineResult<TransformOutput> {
    let preprocessor = Preprocessor::fit(&split.train, &cfg.target_column)?;
    info!(
        columns = preprocessor.columns.len(),
        features = preprocessor.width(),
        "preprocessor fitted"
    );

    let train = preprocessor.transform_table(&split.train)?;
    let test = preprocessor.transform_table(&split.test)?;
    if train.is_empty() {
        return Err(PipelineError::invalid("training split has no labelled rows"));
    }
    if test.is_empty() {
        return Err(PipelineError::invalid("test split has no labelled rows"));
    }

    let train_path = cfg.train_path();
    let test_path = cfg.test_path();
    repo.write_table(&train_path, &train.to_table(&cfg.target_column))?;
    repo.write_table(&test_path, &test.to_table(&cfg.target_column))?;
    info!(
        train = %train_path.display(),
        test = %test_path.display(),
        "processed datasets written"
    );

    Ok(TransformOutput {
        preprocessor,
        train,
        test,
        train_path,
        test_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::domain::Table;
    use crate::data::repo_fs::FsDatasetRepo;
    use tempfile::tempdir;

    fn table(rows: &[[&str; 3]]) -> Table {
        Table::new(
            vec!["x".into(), "kind".into(), "target".into()],
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn writes_processed_files_with_encoded_headers() {
        let dir = tempdir().unwrap();
        let cfg = TransformationConfig {
            target_column: "target".into(),
            processed_dir: dir.path().to_path_buf(),
        };
        let split = Split {
            train: table(&[["1", "a", "2"], ["2", "b", "4"], ["3", "a", "6"]]),
            test: table(&[["4", "c", "8"]]),
        };

        let out = transform(&FsDatasetRepo::new(), &cfg, &split).unwrap();
        assert_eq!(out.train.len(), 3);
        assert_eq!(out.test.rows.row(0).to_vec()[1..], [0.0, 0.0]);

        let written = FsDatasetRepo::new().read_raw(&out.train_path).unwrap();
        assert_eq!(written.headers, vec!["x", "kind=a", "kind=b", "target"]);
        assert!(out.test_path.exists());
    }

    #[test]
    fn unlabelled_test_split_is_rejected() {
        let dir = tempdir().unwrap();
        let cfg = TransformationConfig {
            target_column: "target".into(),
            processed_dir: dir.path().to_path_buf(),
        };
        let split = Split {
            train: table(&[["1", "a", "2"], ["2", "b", "4"]]),
            test: table(&[["4", "c", ""]]),
        };
        assert!(matches!(
            transform(&FsDatasetRepo::new(), &cfg, &split),
            Err(PipelineError::InvalidInput(_))
        ));
    }
}
