use ndarray::Array2;
use ndarray_stats::QuantileExt;

use crate::corpus::Document;
use crate::error::NmfError;

/// The batch matrix V for one chunk of documents
///
/// A dense features × batch matrix of term counts, assembled from sparse
/// documents. Immutable once built; discarded after the chunk is solved.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    matrix: Array2<f64>,
}

impl Batch {
    /// Assemble the batch matrix from a chunk of documents
    ///
    /// Counts for repeated term ids are summed. A term id at or beyond
    /// `n_features` is a dimension mismatch against the vocabulary fixed at
    /// model creation.
    pub fn from_documents(documents: &[Document], n_features: usize) -> Result<Self, NmfError> {
        let mut matrix = Array2::zeros((n_features, documents.len()));
        for (sample, document) in documents.iter().enumerate() {
            for &(term_id, count) in document {
                if term_id >= n_features {
                    return Err(NmfError::DimensionMismatch {
                        expected: n_features,
                        term_id,
                    });
                }
                matrix[[term_id, sample]] += count;
            }
        }
        Ok(Batch { matrix })
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn n_features(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_documents(&self) -> usize {
        self.matrix.ncols()
    }

    /// Largest entry in the batch, used to derive the residual cap `v_max`
    /// when it is not configured
    pub fn max(&self) -> f64 {
        self.matrix.max().map(|v| *v).unwrap_or(0.0)
    }
}
