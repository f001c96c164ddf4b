use ndarray::Array2;

/// Running sufficient statistics over all chunks seen
///
/// `A` accumulates `H·Hᵗ` (topics × topics) and `B` accumulates `(V−R)·Hᵗ`
/// (features × topics). The dictionary updater consumes their chunk-count
/// averages, which keeps memory independent of the number of chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct SuffStats {
    a: Array2<f64>,
    b: Array2<f64>,
    chunks: usize,
}

impl SuffStats {
    pub fn new(n_features: usize, num_topics: usize) -> Self {
        SuffStats {
            a: Array2::zeros((num_topics, num_topics)),
            b: Array2::zeros((n_features, num_topics)),
            chunks: 0,
        }
    }

    /// Fold one chunk's solve into the running sums
    ///
    /// `v_minus_r` is the batch matrix with the residual already subtracted;
    /// when residual modeling is disabled it is the batch matrix itself.
    pub fn accumulate(&mut self, h: &Array2<f64>, v_minus_r: &Array2<f64>) {
        self.a += &h.dot(&h.t());
        self.b += &v_minus_r.dot(&h.t());
        self.chunks += 1;
    }

    /// Number of chunks folded in so far
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Chunk-count average of `A`
    ///
    /// Must not be called before the first chunk has been accumulated; the
    /// streaming controller upholds this.
    pub fn average_a(&self) -> Array2<f64> {
        debug_assert!(self.chunks > 0, "no chunks accumulated");
        &self.a / self.chunks as f64
    }

    /// Chunk-count average of `B`
    pub fn average_b(&self) -> Array2<f64> {
        debug_assert!(self.chunks > 0, "no chunks accumulated");
        &self.b / self.chunks as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accumulate_and_average() {
        let mut stats = SuffStats::new(2, 2);

        let h = array![[1.0, 0.0], [0.0, 2.0]];
        let v = array![[1.0, 2.0], [3.0, 4.0]];

        stats.accumulate(&h, &v);
        stats.accumulate(&h, &v);

        assert_eq!(stats.chunks(), 2);
        // Each accumulation adds H·Hᵗ = diag(1, 4)
        assert_eq!(stats.average_a(), array![[1.0, 0.0], [0.0, 4.0]]);
        // Each accumulation adds V·Hᵗ
        assert_eq!(stats.average_b(), array![[1.0, 4.0], [3.0, 8.0]]);
    }

    #[test]
    fn test_a_is_symmetric() {
        let mut stats = SuffStats::new(3, 2);

        let h = array![[1.0, 2.0, 0.5], [0.3, 0.0, 1.0]];
        let v = Array2::ones((3, 3));
        stats.accumulate(&h, &v);

        let a = stats.average_a();
        assert_eq!(a[[0, 1]], a[[1, 0]]);
        assert!(a.iter().all(|&x| x >= 0.0));
    }
}
