//! YAML configuration tree consumed by both pipelines.
//!
//! The file is read once per invocation and never written back. Values are
//! addressed by dotted key paths such as `training.test_size`; there is no
//! schema, so consumers decide which keys are required.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;
use tracing::debug;

/// Conventional location of the project configuration.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("cannot read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed YAML in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("config root in {} is not a mapping", path.display())]
    NotAMapping { path: PathBuf },
    #[error("missing config key `{0}`")]
    MissingKey(String),
    #[error("config key `{key}` must be {expected}")]
    InvalidType { key: String, expected: &'static str },
    #[error("config key `{key}` is invalid: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Parsed configuration file.
#[derive(Clone, Debug)]
pub struct Config {
    origin: PathBuf,
    root: Value,
}

/// Read and parse the YAML file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ConfigError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ConfigError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let config = Config::from_yaml_str(&text, path)?;
    debug!(path = %path.display(), keys = ?config.top_level_keys(), "config loaded");
    Ok(config)
}

impl Config {
    /// Parse YAML text; `origin` only labels errors.
    pub fn from_yaml_str(text: &str, origin: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let origin = origin.as_ref().to_path_buf();
        let root: Value = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.clone(),
            source,
        })?;
        if !root.is_mapping() {
            return Err(ConfigError::NotAMapping { path: origin });
        }
        Ok(Self { origin, root })
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Keys of the root mapping, in file order.
    pub fn top_level_keys(&self) -> Vec<String> {
        self.root
            .as_mapping()
            .map(|map| map.keys().map(key_label).collect())
            .unwrap_or_default()
    }

    /// Node at a dotted key path. `null` values count as absent.
    pub fn lookup(&self, key_path: &str) -> Option<&Value> {
        let mut node = &self.root;
        for segment in key_path.split('.') {
            node = node.get(segment)?;
        }
        if node.is_null() {
            None
        } else {
            Some(node)
        }
    }

    pub fn require(&self, key_path: &str) -> Result<&Value, ConfigError> {
        self.lookup(key_path)
            .ok_or_else(|| ConfigError::MissingKey(key_path.to_string()))
    }

    pub fn str(&self, key_path: &str) -> Result<&str, ConfigError> {
        as_str(key_path, self.require(key_path)?)
    }

    pub fn f64(&self, key_path: &str) -> Result<f64, ConfigError> {
        as_f64(key_path, self.require(key_path)?)
    }

    pub fn u64(&self, key_path: &str) -> Result<u64, ConfigError> {
        as_u64(key_path, self.require(key_path)?)
    }

    pub fn bool(&self, key_path: &str) -> Result<bool, ConfigError> {
        as_bool(key_path, self.require(key_path)?)
    }

    pub fn opt_str(&self, key_path: &str) -> Result<Option<&str>, ConfigError> {
        self.lookup(key_path).map(|v| as_str(key_path, v)).transpose()
    }

    pub fn opt_f64(&self, key_path: &str) -> Result<Option<f64>, ConfigError> {
        self.lookup(key_path).map(|v| as_f64(key_path, v)).transpose()
    }

    pub fn opt_u64(&self, key_path: &str) -> Result<Option<u64>, ConfigError> {
        self.lookup(key_path).map(|v| as_u64(key_path, v)).transpose()
    }

    pub fn opt_bool(&self, key_path: &str) -> Result<Option<bool>, ConfigError> {
        self.lookup(key_path).map(|v| as_bool(key_path, v)).transpose()
    }

    /// Deserialize the subtree at `key_path` into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self, key_path: &str) -> Result<Option<T>, ConfigError> {
        self.lookup(key_path)
            .map(|node| decode(key_path, node))
            .transpose()
    }
}

/// Deserialize an arbitrary node, labelling failures with `key_path`.
pub fn decode<T: DeserializeOwned>(key_path: &str, node: &Value) -> Result<T, ConfigError> {
    serde_yaml::from_value(node.clone()).map_err(|err| ConfigError::InvalidValue {
        key: key_path.to_string(),
        reason: err.to_string(),
    })
}

fn key_label(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn as_str<'a>(key: &str, value: &'a Value) -> Result<&'a str, ConfigError> {
    value.as_str().ok_or_else(|| invalid_type(key, "a string"))
}

fn as_f64(key: &str, value: &Value) -> Result<f64, ConfigError> {
    value.as_f64().ok_or_else(|| invalid_type(key, "a number"))
}

fn as_u64(key: &str, value: &Value) -> Result<u64, ConfigError> {
    value
        .as_u64()
        .ok_or_else(|| invalid_type(key, "a non-negative integer"))
}

fn as_bool(key: &str, value: &Value) -> Result<bool, ConfigError> {
    value.as_bool().ok_or_else(|| invalid_type(key, "a boolean"))
}

fn invalid_type(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidType {
        key: key.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
data:
  raw_path: data/raw/data.csv
model:
  type: linear_regression
  params:
    alpha: 0.5
training:
  test_size: 0.2
  random_state: 42
logging: ~
";

    #[test]
    fn top_level_keys_follow_the_file() {
        let cfg = Config::from_yaml_str(SAMPLE, "inline.yaml").unwrap();
        assert_eq!(
            cfg.top_level_keys(),
            vec!["data", "model", "training", "logging"]
        );
    }

    #[test]
    fn top_level_keys_cover_any_mapping_shape() {
        let keys = |text: &str| Config::from_yaml_str(text, "inline.yaml").unwrap().top_level_keys();

        assert_eq!(keys("only: 1\n"), vec!["only"]);
        assert_eq!(keys("outer:\n  inner:\n    leaf: 1\n"), vec!["outer"]);
        assert_eq!(
            keys("1: one\ntrue: yes\n2.5: half\nname: x\n"),
            vec!["1", "true", "2.5", "name"]
        );
    }

    #[test]
    fn boolean_getters() {
        let cfg = Config::from_yaml_str(
            "flags:\n  shuffle: true\n  verbose: false\n  level: 3\n  unset: ~\n",
            "inline.yaml",
        )
        .unwrap();
        assert!(cfg.bool("flags.shuffle").unwrap());
        assert!(!cfg.bool("flags.verbose").unwrap());
        assert!(matches!(
            cfg.bool("flags.level"),
            Err(ConfigError::InvalidType { expected: "a boolean", .. })
        ));
        assert!(matches!(cfg.bool("flags.absent"), Err(ConfigError::MissingKey(_))));

        assert_eq!(cfg.opt_bool("flags.verbose").unwrap(), Some(false));
        assert_eq!(cfg.opt_bool("flags.unset").unwrap(), None);
        assert_eq!(cfg.opt_bool("flags.absent").unwrap(), None);
        assert!(cfg.opt_bool("flags.level").is_err());
    }

    #[test]
    fn subtrees_deserialize_into_typed_structs() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Training {
            test_size: f64,
            random_state: u64,
        }

        let cfg = Config::from_yaml_str(SAMPLE, "inline.yaml").unwrap();
        assert_eq!(
            cfg.deserialize::<Training>("training").unwrap(),
            Some(Training {
                test_size: 0.2,
                random_state: 42,
            })
        );
        assert_eq!(cfg.deserialize::<Training>("logging").unwrap(), None);
        assert!(matches!(
            cfg.deserialize::<Training>("data"),
            Err(ConfigError::InvalidValue { key, .. }) if key == "data"
        ));
    }

    #[test]
    fn dotted_lookup_and_typed_getters() {
        let cfg = Config::from_yaml_str(SAMPLE, "inline.yaml").unwrap();
        assert_eq!(cfg.str("data.raw_path").unwrap(), "data/raw/data.csv");
        assert_eq!(cfg.f64("training.test_size").unwrap(), 0.2);
        assert_eq!(cfg.u64("training.random_state").unwrap(), 42);
        assert_eq!(cfg.f64("model.params.alpha").unwrap(), 0.5);
        assert!(cfg.lookup("logging").is_none());
        assert_eq!(cfg.opt_str("data.processed_dir").unwrap(), None);
    }

    #[test]
    fn missing_and_mistyped_keys_are_config_errors() {
        let cfg = Config::from_yaml_str(SAMPLE, "inline.yaml").unwrap();
        assert!(matches!(
            cfg.str("model.path"),
            Err(ConfigError::MissingKey(key)) if key == "model.path"
        ));
        assert!(matches!(
            cfg.u64("data.raw_path"),
            Err(ConfigError::InvalidType { .. })
        ));
        assert!(matches!(
            cfg.opt_f64("model.type"),
            Err(ConfigError::InvalidType { .. })
        ));
    }

    #[test]
    fn nonexistent_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = load_config(dir.path().join("config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn malformed_and_scalar_documents_are_rejected() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.yaml");
        fs::write(&broken, "data: [unclosed\n").unwrap();
        assert!(matches!(
            load_config(&broken),
            Err(ConfigError::Parse { .. })
        ));

        let scalar = dir.path().join("scalar.yaml");
        fs::write(&scalar, "just a string\n").unwrap();
        assert!(matches!(
            load_config(&scalar),
            Err(ConfigError::NotAMapping { .. })
        ));

        let empty = dir.path().join("empty.yaml");
        fs::write(&empty, "").unwrap();
        assert!(matches!(
            load_config(&empty),
            Err(ConfigError::NotAMapping { .. } | ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, SAMPLE).unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.origin(), path.as_path());
        assert_eq!(cfg.str("model.type").unwrap(), "linear_regression");
    }
}
