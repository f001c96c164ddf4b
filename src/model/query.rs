use anyhow::{Context, Result};
use ndarray::{Array2, Axis};

use crate::corpus::Document;
use crate::error::NmfError;
use crate::structs::batch::Batch;

use super::Nmf;

/// Floor applied under any user-supplied probability threshold, prevents
/// zeros from leaking into query results
const PROBABILITY_FLOOR: f64 = 1e-8;

/// Read-only views over the learned dictionary
impl Nmf {
    /// The topic-term matrix, shaped topics × features
    ///
    /// With `normalize` enabled each row is rescaled to sum to 1, giving a
    /// probability distribution over terms; otherwise the raw transposed
    /// dictionary is returned.
    pub fn topics(&self) -> Result<Array2<f64>> {
        let dictionary = self
            .dictionary
            .as_ref()
            .context("the model has not been trained")?;

        let mut topics = dictionary.matrix().t().to_owned();
        if self.settings.model.normalize {
            for mut row in topics.axis_iter_mut(Axis(0)) {
                let sum = row.sum();
                if sum > 0.0 {
                    row.mapv_inplace(|x| x / sum);
                }
            }
        }
        Ok(topics)
    }

    /// Topic distribution for a held-out document
    ///
    /// The document is solved against the trained dictionary with the
    /// residual cap relaxed to infinity and no warm start, i.e. a plain
    /// non-negative least-squares fit. Entries at or below
    /// `max(minimum_probability, 1e-8)` are dropped. The result is ordered by
    /// ascending topic id.
    pub fn document_topics(
        &self,
        bow: &Document,
        minimum_probability: Option<f64>,
    ) -> Result<Vec<(usize, f64)>> {
        let dictionary = self
            .dictionary
            .as_ref()
            .context("the model has not been trained")?;

        let batch = Batch::from_documents(std::slice::from_ref(bow), self.n_features)?;
        let output = self.solver().solve(
            batch.matrix(),
            dictionary.matrix(),
            None,
            None,
            f64::INFINITY,
        );

        let mut column = output.h.column(0).to_owned();
        if self.settings.model.normalize {
            let sum = column.sum();
            if sum > 0.0 {
                column.mapv_inplace(|x| x / sum);
            }
        }

        let floor = self.probability_floor(minimum_probability);
        Ok(column
            .iter()
            .enumerate()
            .filter(|&(_, &probability)| probability > floor)
            .map(|(topic_id, &probability)| (topic_id, probability))
            .collect())
    }

    /// Topics a term participates in, read from the raw dictionary
    ///
    /// Returns `(topic_id, weight)` pairs for every topic whose weight for
    /// `term_id` is at or above `max(minimum_probability, 1e-8)`.
    pub fn term_topics(
        &self,
        term_id: usize,
        minimum_probability: Option<f64>,
    ) -> Result<Vec<(usize, f64)>> {
        let dictionary = self
            .dictionary
            .as_ref()
            .context("the model has not been trained")?;

        if term_id >= self.n_features {
            return Err(NmfError::UnknownTerm {
                term_id,
                n_features: self.n_features,
            }
            .into());
        }

        let floor = self.probability_floor(minimum_probability);
        Ok(dictionary
            .matrix()
            .row(term_id)
            .iter()
            .enumerate()
            .filter(|&(_, &weight)| weight >= floor)
            .map(|(topic_id, &weight)| (topic_id, weight))
            .collect())
    }

    /// The most significant terms for a selection of topics
    ///
    /// Topics are ranked by the number of non-zero dictionary entries in
    /// their column. When `num_topics` covers all topics they are returned in
    /// id order; a strict subset is balanced between the ⌊n/2⌋ lowest- and
    /// ⌈n/2⌉ highest-ranked topics. Each selected topic carries its top
    /// `num_words` terms by weight.
    pub fn top_topics(
        &self,
        num_topics: usize,
        num_words: usize,
    ) -> Result<Vec<(usize, Vec<(usize, f64)>)>> {
        let dictionary = self
            .dictionary
            .as_ref()
            .context("the model has not been trained")?;

        let total = self.settings.model.num_topics;
        let chosen: Vec<usize> = if num_topics >= total {
            (0..total).collect()
        } else {
            let sparsity = dictionary.sparsity();
            let mut order: Vec<usize> = (0..total).collect();
            order.sort_by_key(|&topic| sparsity[topic]);

            let lower = num_topics / 2;
            let upper = num_topics - lower;
            order[..lower]
                .iter()
                .chain(order[total - upper..].iter())
                .copied()
                .collect()
        };

        let topics = self.topics()?;
        let shown = chosen
            .into_iter()
            .map(|topic_id| {
                let row = topics.row(topic_id);
                let mut ranked: Vec<usize> = (0..self.n_features).collect();
                ranked.sort_by(|&a, &b| {
                    row[b].partial_cmp(&row[a]).unwrap_or(std::cmp::Ordering::Equal)
                });
                let terms = ranked
                    .into_iter()
                    .take(num_words)
                    .map(|term_id| (term_id, row[term_id]))
                    .collect();
                (topic_id, terms)
            })
            .collect();

        Ok(shown)
    }

    fn probability_floor(&self, minimum_probability: Option<f64>) -> f64 {
        minimum_probability
            .unwrap_or(self.settings.model.minimum_probability)
            .max(PROBABILITY_FLOOR)
    }
}
