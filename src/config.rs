use crate::histogram::NullHistogram;
use crate::partition::{chunk, Chunks};
use crate::PermsetError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable that overrides the state directory
pub const STATE_DIR_ENV: &str = "PERMSET_STATE_DIR";
pub const CONFIG_FILE_NAME: &str = "run_config.json";

/// Weighting applied to ranked scores by the enrichment statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightMethod {
    Unweighted,
    #[default]
    Weighted,
    Exp,
    Log,
}

impl FromStr for WeightMethod {
    type Err = PermsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unweighted" => Ok(WeightMethod::Unweighted),
            "weighted" => Ok(WeightMethod::Weighted),
            "exp" => Ok(WeightMethod::Exp),
            "log" => Ok(WeightMethod::Log),
            other => Err(PermsetError::InvalidArgument(format!(
                "unknown weight method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for WeightMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WeightMethod::Unweighted => "unweighted",
            WeightMethod::Weighted => "weighted",
            WeightMethod::Exp => "exp",
            WeightMethod::Log => "log",
        };
        f.write_str(s)
    }
}

/// Parameters shared by every worker of one permutation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub state_dir: PathBuf,
    pub num_permutations: u64,
    pub num_chunks: u64,
    pub hist_bins: usize,
    pub hist_min: f64,
    pub hist_max: f64,
    pub weight_method: WeightMethod,
    pub rand_seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("./permset_state"),
            num_permutations: 1000,
            num_chunks: 1,
            hist_bins: 100,
            hist_min: -1.0,
            hist_max: 1.0,
            weight_method: WeightMethod::Weighted,
            rand_seed: 0,
        }
    }
}

impl RunConfig {
    /// Defaults with the state directory taken from `PERMSET_STATE_DIR` if set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(STATE_DIR_ENV) {
            config.state_dir = PathBuf::from(dir);
        }
        config
    }

    /// Custom configuration rooted at `state_dir` (for tests)
    pub fn custom(state_dir: PathBuf) -> Self {
        Self {
            state_dir,
            ..Self::default()
        }
    }

    pub fn config_path(state_dir: &Path) -> PathBuf {
        state_dir.join(CONFIG_FILE_NAME)
    }

    pub fn validate(&self) -> Result<(), PermsetError> {
        if self.num_chunks == 0 {
            return Err(PermsetError::InvalidArgument("num_chunks must be at least 1".to_string()));
        }
        if self.hist_bins == 0 {
            return Err(PermsetError::InvalidArgument("hist_bins must be at least 1".to_string()));
        }
        if !(self.hist_min < self.hist_max) {
            return Err(PermsetError::InvalidArgument(format!(
                "hist_min {} must be below hist_max {}",
                self.hist_min, self.hist_max
            )));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PermsetError> {
        let text = fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config stored in `state_dir`, or defaults rooted there
    pub fn load_or_default(state_dir: &Path) -> Result<Self, PermsetError> {
        let path = Self::config_path(state_dir);
        if path.exists() {
            let mut config = Self::load(&path)?;
            config.state_dir = state_dir.to_path_buf();
            Ok(config)
        } else {
            Ok(Self::custom(state_dir.to_path_buf()))
        }
    }

    pub fn save(&self) -> Result<(), PermsetError> {
        self.validate()?;
        fs::create_dir_all(&self.state_dir)?;
        let text = serde_json::to_string_pretty(self)?;
        fs::write(Self::config_path(&self.state_dir), text)?;
        Ok(())
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.state_dir.join("jobs")
    }

    /// Permutation ranges, one per chunk
    pub fn chunks(&self) -> Result<Chunks, PermsetError> {
        chunk(self.num_permutations, self.num_chunks)
    }

    /// Seed for one chunk; fixed per chunk so a rerun reproduces it exactly
    pub fn chunk_seed(&self, index: u64) -> u64 {
        self.rand_seed.wrapping_add(index)
    }

    pub fn new_histogram(&self) -> Result<NullHistogram, PermsetError> {
        NullHistogram::new(self.hist_min, self.hist_max, self.hist_bins)
    }
}
