use anyhow::Result;
use config::Config as eConfig;
use serde::{Deserialize, Serialize};

use crate::error::NmfError;

/// Contains all settings for nmfcore
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    /// Model shape and query behavior
    pub model: Model,
    /// Training schedule and optimization hyperparameters
    pub training: Training,
    /// Iteration caps and stopping thresholds for the inner solvers
    pub convergence: Convergence,
    /// Configuration for logging
    pub log: Log,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            model: Model::default(),
            training: Training::default(),
            convergence: Convergence::default(),
            log: Log::default(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Settings::default()
    }

    /// Validate the settings
    ///
    /// Raised before any computation; an invalid configuration is fatal.
    pub fn validate(&self) -> Result<(), NmfError> {
        self.model.validate()?;
        self.training.validate()?;
        self.convergence.validate()?;
        Ok(())
    }
}

/// Model shape and query behavior
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Model {
    /// Number of topics in the factorization
    pub num_topics: usize,
    /// Whether topic and document distributions are normalized to sum to 1
    pub normalize: bool,
    /// Floor below which topic probabilities are dropped from query results
    pub minimum_probability: f64,
    /// Residual magnitude cap; when unset it is derived once from the first
    /// batch and cached for the model lifetime
    pub v_max: Option<f64>,
    /// Seed for the random dictionary initialization
    pub seed: usize,
}

impl Default for Model {
    fn default() -> Self {
        Model {
            num_topics: 100,
            normalize: true,
            minimum_probability: 0.01,
            v_max: None,
            seed: 347,
        }
    }
}

impl Model {
    pub fn validate(&self) -> Result<(), NmfError> {
        if self.num_topics == 0 {
            return Err(NmfError::InvalidConfiguration(
                "num_topics must be positive".to_string(),
            ));
        }
        if self.minimum_probability < 0.0 {
            return Err(NmfError::InvalidConfiguration(format!(
                "minimum_probability must be non-negative, got {}",
                self.minimum_probability
            )));
        }
        if let Some(v_max) = self.v_max {
            if v_max <= 0.0 {
                return Err(NmfError::InvalidConfiguration(format!(
                    "v_max must be positive, got {}",
                    v_max
                )));
            }
        }
        Ok(())
    }
}

/// Training schedule and optimization hyperparameters
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Training {
    /// Number of documents in a chunk
    pub chunksize: usize,
    /// Number of full passes over the training corpus
    pub passes: usize,
    /// Gradient step scale
    pub kappa: f64,
    /// Weight of the residual L1 penalty
    pub lambda: f64,
    /// Whether to model a sparse residual term at all
    pub use_r: bool,
    /// Retain each chunk's activation matrix for diagnostics
    pub store_h: bool,
    /// Retain each chunk's residual matrix for diagnostics
    pub store_r: bool,
    /// Reconstruction loss is logged every `eval_every` chunks
    pub eval_every: usize,
}

impl Default for Training {
    fn default() -> Self {
        Training {
            chunksize: 2000,
            passes: 1,
            kappa: 1.0,
            lambda: 1.0,
            use_r: false,
            store_h: false,
            store_r: false,
            eval_every: 10,
        }
    }
}

impl Training {
    pub fn validate(&self) -> Result<(), NmfError> {
        if self.chunksize == 0 {
            return Err(NmfError::InvalidConfiguration(
                "chunksize must be positive".to_string(),
            ));
        }
        if self.passes == 0 {
            return Err(NmfError::InvalidConfiguration(
                "passes must be at least 1".to_string(),
            ));
        }
        if self.kappa <= 0.0 {
            return Err(NmfError::InvalidConfiguration(format!(
                "kappa must be positive, got {}",
                self.kappa
            )));
        }
        if self.lambda < 0.0 {
            return Err(NmfError::InvalidConfiguration(format!(
                "lambda must be non-negative, got {}",
                self.lambda
            )));
        }
        if self.eval_every == 0 {
            return Err(NmfError::InvalidConfiguration(
                "eval_every must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Iteration caps and stopping thresholds for the inner solvers
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Convergence {
    /// Iteration cap for the dictionary updater
    pub w_max_iter: usize,
    /// Relative-change threshold for the dictionary updater
    pub w_stop_condition: f64,
    /// Iteration cap for the activation/residual solver
    pub h_r_max_iter: usize,
    /// Relative-change threshold for the activation/residual solver
    pub h_r_stop_condition: f64,
}

impl Default for Convergence {
    fn default() -> Self {
        Convergence {
            w_max_iter: 200,
            w_stop_condition: 1e-4,
            h_r_max_iter: 50,
            h_r_stop_condition: 1e-3,
        }
    }
}

impl Convergence {
    pub fn validate(&self) -> Result<(), NmfError> {
        if self.w_max_iter == 0 || self.h_r_max_iter == 0 {
            return Err(NmfError::InvalidConfiguration(
                "iteration caps must be at least 1".to_string(),
            ));
        }
        if self.w_stop_condition < 0.0 || self.h_r_stop_condition < 0.0 {
            return Err(NmfError::InvalidConfiguration(
                "stop conditions must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Log {
    /// The maximum log level to display
    ///
    /// One of `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// The file to write the log to
    pub file: String,
    /// Whether to install a global subscriber
    ///
    /// If set to `false`, a global subscriber will not be set by nmfcore.
    /// Useful when the caller wants its own subscriber, or for benchmarks.
    pub write: bool,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            level: String::from("info"),
            file: String::from("log.txt"),
            write: true,
        }
    }
}

/// Parses the settings from a TOML configuration file
///
/// Entries in the TOML file may be overridden by environment variables
/// prefixed with `NMFCORE_`, with a single underscore separating nested
/// entries, e.g. `NMFCORE_TRAINING_PASSES=5`.
pub fn read(path: impl Into<String>) -> Result<Settings> {
    let settings_path = path.into();

    let parsed = eConfig::builder()
        .add_source(config::File::with_name(&settings_path).format(config::FileFormat::Toml))
        .add_source(config::Environment::with_prefix("NMFCORE").separator("_"))
        .build()?;

    let settings: Settings = parsed.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(
        "Parsed settings: {}",
        serde_json::to_string_pretty(&settings)?
    );

    Ok(settings)
}
