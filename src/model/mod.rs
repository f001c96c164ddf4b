use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;

use crate::corpus::Corpus;
use crate::error::NmfError;
use crate::routines::settings::Settings;
use crate::routines::solver::Solver;
use crate::routines::update::{frobenius_norm, solve_w};
use crate::structs::batch::Batch;
use crate::structs::dictionary::Dictionary;
use crate::structs::suffstats::SuffStats;

pub mod query;

/// Represents the status of the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// No corpus has been seen yet; the dictionary is not allocated
    Uninitialized,
    /// Training is in progress
    Running,
    /// Training was stopped by the user through a stop file
    ManualStop,
    /// Training aborted on an error; warm starts are kept for a retry
    Failed,
    /// Training completed the requested passes
    Done,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Uninitialized => write!(f, "Uninitialized"),
            Status::Running => write!(f, "Running"),
            Status::ManualStop => write!(f, "Manual stop requested"),
            Status::Failed => write!(f, "Failed"),
            Status::Done => write!(f, "Done"),
        }
    }
}

/// Online non-negative matrix factorization topic model
///
/// Learns a dictionary W (features × topics) from a stream of sparse
/// term-count documents, chunk by chunk, without revisiting the full corpus.
/// Each chunk is factorized as V ≈ W·H + R against the current dictionary,
/// folded into running sufficient statistics, and the dictionary is updated
/// from their averages.
///
/// The feature dimension (vocabulary size) is fixed at creation; the
/// dictionary itself is allocated when the first corpus arrives, scaled to
/// the first document's intensity.
#[derive(Debug, Clone)]
pub struct Nmf {
    pub(crate) settings: Settings,
    pub(crate) n_features: usize,
    pub(crate) status: Status,
    pub(crate) dictionary: Option<Dictionary>,
    pub(crate) stats: SuffStats,
    /// Warm starts carried across chunk and pass boundaries
    pub(crate) h: Option<Array2<f64>>,
    pub(crate) r: Option<Array2<f64>>,
    /// Residual cap derived from the first batch when not configured
    pub(crate) v_max: Option<f64>,
    pub(crate) h_history: Vec<Array2<f64>>,
    pub(crate) r_history: Vec<Array2<f64>>,
}

impl Nmf {
    /// Create a model over a vocabulary of `n_features` terms
    ///
    /// The settings are validated up front; an invalid configuration is
    /// rejected before any computation.
    pub fn new(settings: Settings, n_features: usize) -> Result<Self, NmfError> {
        settings.validate()?;
        if n_features == 0 {
            return Err(NmfError::InvalidConfiguration(
                "the feature dimension must be positive".to_string(),
            ));
        }

        let num_topics = settings.model.num_topics;
        Ok(Nmf {
            settings,
            n_features,
            status: Status::Uninitialized,
            dictionary: None,
            stats: SuffStats::new(n_features, num_topics),
            h: None,
            r: None,
            v_max: None,
            h_history: Vec::new(),
            r_history: Vec::new(),
        })
    }

    /// Create a model resuming from an existing dictionary
    pub fn from_parts(
        settings: Settings,
        n_features: usize,
        dictionary: Dictionary,
    ) -> Result<Self, NmfError> {
        let mut model = Nmf::new(settings, n_features)?;
        if dictionary.n_features() != n_features
            || dictionary.num_topics() != model.settings.model.num_topics
        {
            return Err(NmfError::InvalidConfiguration(format!(
                "dictionary shape ({}, {}) does not match the model ({}, {})",
                dictionary.n_features(),
                dictionary.num_topics(),
                n_features,
                model.settings.model.num_topics
            )));
        }
        model.dictionary = Some(dictionary);
        model.status = Status::Done;
        Ok(model)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn dictionary(&self) -> Option<&Dictionary> {
        self.dictionary.as_ref()
    }

    pub fn stats(&self) -> &SuffStats {
        &self.stats
    }

    /// Per-chunk activation matrices, retained when `store_h` is enabled
    pub fn h_history(&self) -> &[Array2<f64>] {
        &self.h_history
    }

    /// Per-chunk residual matrices, retained when `store_r` is enabled
    pub fn r_history(&self) -> &[Array2<f64>] {
        &self.r_history
    }

    pub(crate) fn solver(&self) -> Solver {
        Solver {
            kappa: self.settings.training.kappa,
            lambda: self.settings.training.lambda,
            use_r: self.settings.training.use_r,
            max_iter: self.settings.convergence.h_r_max_iter,
            stop_condition: self.settings.convergence.h_r_stop_condition,
        }
    }

    /// Allocate the dictionary and statistics from the first corpus
    fn setup(&mut self, corpus: &Corpus) -> Result<(), NmfError> {
        let first_mean = corpus
            .first_document_mean(self.n_features)
            .ok_or(NmfError::EmptyCorpus)?;

        let num_topics = self.settings.model.num_topics;
        let scale = (first_mean / self.n_features as f64).sqrt() / (num_topics as f64).sqrt();
        self.dictionary = Some(Dictionary::init(
            self.n_features,
            num_topics,
            scale,
            self.settings.model.seed as u64,
        ));
        self.stats = SuffStats::new(self.n_features, num_topics);
        self.h = None;
        self.r = None;

        tracing::info!(
            "Initialized dictionary: {} features, {} topics, scale {:.3e}",
            self.n_features,
            num_topics,
            scale
        );
        Ok(())
    }

    /// Train on a corpus, updating the dictionary chunk by chunk
    ///
    /// Runs `passes` full passes in chunks of `chunksize` documents. H and R
    /// are warm-started from the previous chunk whenever the batch shape
    /// matches, and reset to zero otherwise. A file named `stop` in the
    /// working directory stops training between chunks; a stop file left over
    /// from an earlier run is removed before the first chunk.
    ///
    /// Repeated calls continue the factorization online with the accumulated
    /// statistics.
    pub fn update(&mut self, corpus: &Corpus) -> Result<()> {
        if self.dictionary.is_none() {
            self.setup(corpus)?;
        }

        // If a stop file exists in the current directory, remove it
        if Path::new("stop").exists() {
            tracing::info!("Removing existing stop file prior to training");
            fs::remove_file("stop").context("Unable to remove previous stop file")?;
        }

        let solver = self.solver();
        let training = self.settings.training.clone();
        let convergence = self.settings.convergence.clone();
        let configured_v_max = self.settings.model.v_max;

        let dictionary = self
            .dictionary
            .as_mut()
            .context("dictionary not initialized")?;
        self.status = Status::Running;

        // Warm starts move through locals during the pass loop
        let mut h = self.h.take();
        let mut r = self.r.take();

        let mut chunk_idx: usize = 1;
        let mut last_batch: Option<Batch> = None;

        'training: for pass in 1..=training.passes {
            for chunk in corpus.chunks(training.chunksize) {
                if Path::new("stop").exists() {
                    tracing::warn!("Stop file detected, stopping before chunk {}", chunk_idx);
                    self.status = Status::ManualStop;
                    break 'training;
                }

                let batch = match Batch::from_documents(chunk, self.n_features) {
                    Ok(batch) => batch,
                    Err(error) => {
                        // Put the warm starts back so a retry resumes cleanly
                        self.h = h;
                        self.r = r;
                        self.status = Status::Failed;
                        return Err(error.into());
                    }
                };
                let v_max = match configured_v_max {
                    Some(v) => v,
                    None => *self.v_max.get_or_insert_with(|| batch.max()),
                };

                let output = solver.solve(batch.matrix(), dictionary.matrix(), h, r, v_max);

                let v_minus_r = batch.matrix() - &output.r;
                self.stats.accumulate(&output.h, &v_minus_r);

                let iterations = solve_w(
                    dictionary,
                    &self.stats.average_a(),
                    &self.stats.average_b(),
                    training.kappa,
                    v_max,
                    convergence.w_max_iter,
                    convergence.w_stop_condition,
                );
                tracing::debug!(
                    "Pass {}, chunk {}: solver objective {:.6e}, {} dictionary iterations",
                    pass,
                    chunk_idx,
                    output.error,
                    iterations
                );

                if chunk_idx % training.eval_every == 0 {
                    let (loss, loss_outliers) =
                        reconstruction_losses(&batch, dictionary, &output.h, &output.r);
                    tracing::info!(
                        "Loss (no outliers): {:.6}\tLoss (with outliers): {:.6}",
                        loss,
                        loss_outliers
                    );
                }

                if training.store_h {
                    self.h_history.push(output.h.clone());
                }
                if training.store_r {
                    self.r_history.push(output.r.clone());
                }

                h = Some(output.h);
                r = Some(output.r);
                last_batch = Some(batch);
                chunk_idx += 1;
            }
        }

        self.h = h;
        self.r = r;

        if let (Some(batch), Some(last_h), Some(last_r)) =
            (&last_batch, self.h.as_ref(), self.r.as_ref())
        {
            let (loss, loss_outliers) = reconstruction_losses(batch, dictionary, last_h, last_r);
            tracing::info!(
                "Loss (no outliers): {:.6}\tLoss (with outliers): {:.6}",
                loss,
                loss_outliers
            );
        }

        if self.status == Status::Running {
            self.status = Status::Done;
        }
        Ok(())
    }
}

/// Reconstruction losses `‖V−WH‖` and `‖V−WH−R‖`, reported for observability
/// only
fn reconstruction_losses(
    batch: &Batch,
    dictionary: &Dictionary,
    h: &Array2<f64>,
    r: &Array2<f64>,
) -> (f64, f64) {
    let wh = dictionary.matrix().dot(h);
    let diff = batch.matrix() - &wh;
    let loss = frobenius_norm(&diff);
    let loss_outliers = frobenius_norm(&(diff - r));
    (loss, loss_outliers)
}
