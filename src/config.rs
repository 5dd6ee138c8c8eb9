//! Analysis configuration, loaded from a YAML file and validated before the
//! run starts.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::correlation::ClassificationMode;
use crate::topology::VisibilityMode;

/// How the analyzable AS subset is chosen, as written in the config file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisibilityConfig {
    /// Analyze every monitored AS.
    Monitored,
    /// Analyze only ASes whose monitored-neighbor fraction reaches `fraction`.
    Threshold { fraction: f64 },
}

impl VisibilityConfig {
    pub fn mode(&self) -> VisibilityMode {
        match *self {
            VisibilityConfig::Monitored => VisibilityMode::AllMonitored,
            VisibilityConfig::Threshold { fraction } => VisibilityMode::Threshold(fraction),
        }
    }
}

/// Which classifier the run uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModeConfig {
    Advanced,
    Basic { threshold: f64 },
}

impl ModeConfig {
    pub fn mode(&self) -> ClassificationMode {
        match *self {
            ModeConfig::Advanced => ClassificationMode::Advanced,
            ModeConfig::Basic { threshold } => ClassificationMode::Basic { threshold },
        }
    }
}

/// Top-level configuration for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Topology edge list files. The first is the base map; the rest are
    /// intersected into it.
    pub topology_files: Vec<PathBuf>,

    /// Update dump files, one per observer.
    pub update_files: Vec<PathBuf>,

    /// Half-width of the duplicate search window, in seconds.
    pub time_window: i64,

    /// Minimum prefix overlap fraction for two spikes to count as duplicated.
    pub duplication_fraction: f64,

    pub visibility: VisibilityConfig,

    pub mode: ModeConfig,

    /// Worker threads per bucket.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// First spike-size bucket, 1-based.
    #[serde(default = "default_first_bucket")]
    pub first_bucket: usize,

    /// One past the last processed bucket.
    #[serde(default = "default_last_bucket")]
    pub last_bucket: usize,

    #[serde(default = "default_bucket_stride")]
    pub bucket_stride: usize,

    /// Trim all feeds to their common overlap window before classifying.
    #[serde(default)]
    pub synchronise: bool,

    /// Restrict the analysis to the biggest connected component of the
    /// analyzable AS graph.
    #[serde(default)]
    pub component_only: bool,
}

fn default_threads() -> usize {
    4
}

fn default_first_bucket() -> usize {
    1
}

fn default_last_bucket() -> usize {
    203
}

fn default_bucket_stride() -> usize {
    100
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no topology files configured")]
    NoTopologyFiles,

    #[error("no update files configured")]
    NoUpdateFiles,

    #[error("time_window must be positive, got {0}")]
    InvalidTimeWindow(i64),

    #[error("duplication_fraction must be in (0, 1], got {0}")]
    InvalidDuplicationFraction(f64),

    #[error("visibility fraction must be in [0, 1], got {0}")]
    InvalidVisibilityFraction(f64),

    #[error("basic threshold must be non-negative, got {0}")]
    InvalidBasicThreshold(f64),

    #[error("threads must be at least 1")]
    NoThreads,

    #[error("bucket range {first}..{last} is invalid; buckets start at 1")]
    InvalidBucketRange { first: usize, last: usize },

    #[error("bucket_stride must be at least 1")]
    InvalidBucketStride,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topology_files.is_empty() {
            return Err(ConfigError::NoTopologyFiles);
        }
        if self.update_files.is_empty() {
            return Err(ConfigError::NoUpdateFiles);
        }
        if self.time_window <= 0 {
            return Err(ConfigError::InvalidTimeWindow(self.time_window));
        }
        if !(self.duplication_fraction > 0.0 && self.duplication_fraction <= 1.0) {
            return Err(ConfigError::InvalidDuplicationFraction(
                self.duplication_fraction,
            ));
        }
        if let VisibilityConfig::Threshold { fraction } = self.visibility {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(ConfigError::InvalidVisibilityFraction(fraction));
            }
        }
        if let ModeConfig::Basic { threshold } = self.mode {
            if threshold < 0.0 {
                return Err(ConfigError::InvalidBasicThreshold(threshold));
            }
        }
        if self.threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.first_bucket == 0 || self.last_bucket <= self.first_bucket {
            return Err(ConfigError::InvalidBucketRange {
                first: self.first_bucket,
                last: self.last_bucket,
            });
        }
        if self.bucket_stride == 0 {
            return Err(ConfigError::InvalidBucketStride);
        }
        Ok(())
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: AnalysisConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AnalysisConfig {
        AnalysisConfig {
            topology_files: vec![PathBuf::from("map.txt")],
            update_files: vec![PathBuf::from("rrc00.txt")],
            time_window: 60,
            duplication_fraction: 0.85,
            visibility: VisibilityConfig::Monitored,
            mode: ModeConfig::Advanced,
            threads: 4,
            first_bucket: 1,
            last_bucket: 203,
            bucket_stride: 100,
            synchronise: false,
            component_only: false,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_inputs() {
        let mut config = valid_config();
        config.topology_files.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoTopologyFiles)
        ));

        let mut config = valid_config();
        config.update_files.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoUpdateFiles)));
    }

    #[test]
    fn test_rejects_bad_fractions() {
        let mut config = valid_config();
        config.duplication_fraction = 0.0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.duplication_fraction = 1.5;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.visibility = VisibilityConfig::Threshold { fraction: 1.1 };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidVisibilityFraction(_))
        ));
    }

    #[test]
    fn test_rejects_bad_bucket_range() {
        let mut config = valid_config();
        config.first_bucket = 10;
        config.last_bucket = 5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBucketRange { .. })
        ));
    }

    #[test]
    fn test_parses_yaml_with_defaults() {
        let yaml = r#"
topology_files:
  - map_2009_04.txt
update_files:
  - rrc00.txt
  - rrc01.txt
time_window: 60
duplication_fraction: 0.85
visibility:
  type: threshold
  fraction: 0.5
mode:
  type: advanced
"#;
        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.threads, 4);
        assert_eq!(config.first_bucket, 1);
        assert_eq!(config.last_bucket, 203);
        assert_eq!(config.bucket_stride, 100);
        assert!(!config.synchronise);
        assert_eq!(
            config.visibility,
            VisibilityConfig::Threshold { fraction: 0.5 }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parses_basic_mode() {
        let yaml = r#"
type: basic
threshold: 0.25
"#;
        let mode: ModeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(mode, ModeConfig::Basic { threshold: 0.25 });
    }
}
