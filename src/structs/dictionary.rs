use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// The dictionary matrix W, shaped features × topics
///
/// The only state shared across the whole run. Entries are non-negative and
/// every column's L2 norm is bounded by 1 after [Dictionary::project], which
/// the updater applies after each gradient step.
#[derive(Debug, Clone, PartialEq)]
pub struct Dictionary {
    matrix: Array2<f64>,
}

impl Dictionary {
    /// Initialize the dictionary from a seeded half-normal draw
    ///
    /// Every entry is `scale * |N(0, 1)|`, where `scale` matches the
    /// dictionary magnitude to the corpus's typical document intensity:
    /// `sqrt(first_document_mean / n_features) / sqrt(num_topics)`.
    pub fn init(n_features: usize, num_topics: usize, scale: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let matrix = Array2::from_shape_fn((n_features, num_topics), |_| {
            let draw: f64 = rng.sample(StandardNormal);
            scale * draw.abs()
        });
        Dictionary { matrix }
    }

    /// Build a dictionary from an existing matrix, e.g. to resume from a
    /// known state
    pub fn from_parts(matrix: Array2<f64>) -> Self {
        Dictionary { matrix }
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn n_features(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn num_topics(&self) -> usize {
        self.matrix.ncols()
    }

    /// One gradient descent step, `W ← W − eta·grad`
    pub(crate) fn gradient_step(&mut self, eta: f64, grad: &Array2<f64>) {
        self.matrix.scaled_add(-eta, grad);
    }

    /// Project onto the constraint set
    ///
    /// Entries are clipped to `[0, v_max]`, then each column is divided by
    /// its L2 norm floored at 1. The floor keeps columns from growing past
    /// unit scale without ever dividing by a near-zero norm.
    pub fn project(&mut self, v_max: f64) {
        self.matrix.mapv_inplace(|x| x.clamp(0.0, v_max));
        for mut column in self.matrix.axis_iter_mut(Axis(1)) {
            let norm = column.iter().map(|x| x * x).sum::<f64>().sqrt().max(1.0);
            column.mapv_inplace(|x| x / norm);
        }
    }

    /// L2 norm of each column
    pub fn column_norms(&self) -> Array1<f64> {
        Array1::from_iter(
            self.matrix
                .axis_iter(Axis(1))
                .map(|column| column.iter().map(|x| x * x).sum::<f64>().sqrt()),
        )
    }

    /// Number of non-zero entries in each column, the sparsity ranking used
    /// by the topic selection in the query layer
    pub fn sparsity(&self) -> Vec<usize> {
        self.matrix
            .axis_iter(Axis(1))
            .map(|column| column.iter().filter(|&&x| x != 0.0).count())
            .collect()
    }
}
