use ndarray::Array2;

use crate::structs::dictionary::Dictionary;

/// Frobenius norm
pub fn frobenius_norm(matrix: &Array2<f64>) -> f64 {
    matrix.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Surrogate reconstruction loss implied by the running statistics,
/// `½·tr(WᵗW·A) − tr(Wᵗ·B)`
///
/// Both WᵗW and A are symmetric, so the traces reduce to elementwise sums.
/// Used only for the stopping test, never recomputed against raw V.
fn surrogate_loss(w: &Array2<f64>, a_avg: &Array2<f64>, b_avg: &Array2<f64>) -> f64 {
    0.5 * (w.t().dot(w) * a_avg).sum() - (w * b_avg).sum()
}

/// Projected-gradient descent on the dictionary W
///
/// Steps `W ← W − eta·(W·A − B)` with `eta = kappa / ‖A‖_F`, projecting after
/// every step (entries in `[0, v_max]`, column norms bounded by 1). Stops
/// when the relative change of the surrogate loss falls below
/// `stop_condition`, capped by `max_iter`. A zero-norm A (degenerate, e.g.
/// all-zero activations) skips the update entirely.
///
/// Returns the number of iterations performed.
pub fn solve_w(
    dictionary: &mut Dictionary,
    a_avg: &Array2<f64>,
    b_avg: &Array2<f64>,
    kappa: f64,
    v_max: f64,
    max_iter: usize,
    stop_condition: f64,
) -> usize {
    let a_norm = frobenius_norm(a_avg);
    if a_norm == 0.0 {
        tracing::warn!("Skipping dictionary update: zero-norm topic statistics");
        return 0;
    }
    let eta = kappa / a_norm;

    let mut w_error = surrogate_loss(dictionary.matrix(), a_avg, b_avg);

    for iteration in 0..max_iter {
        let grad = dictionary.matrix().dot(a_avg) - b_avg;
        dictionary.gradient_step(eta, &grad);
        dictionary.project(v_max);

        let error = surrogate_loss(dictionary.matrix(), a_avg, b_avg);
        tracing::debug!("Dictionary iteration {}: loss {:.6e}", iteration, error);

        if ((error - w_error) / w_error).abs() < stop_condition {
            return iteration + 1;
        }
        w_error = error;
    }

    max_iter
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_zero_statistics_skip_update() {
        let mut dictionary = Dictionary::from_parts(array![[0.5, 0.1], [0.2, 0.4]]);
        let before = dictionary.clone();

        let a = Array2::zeros((2, 2));
        let b = Array2::zeros((2, 2));
        let iterations = solve_w(&mut dictionary, &a, &b, 1.0, 10.0, 50, 1e-4);

        assert_eq!(iterations, 0);
        assert_eq!(dictionary, before);
    }

    #[test]
    fn test_update_keeps_constraints() {
        let mut dictionary = Dictionary::from_parts(array![[0.9, 0.1], [0.1, 0.8], [0.3, 0.3]]);

        let a = array![[2.0, 0.5], [0.5, 1.0]];
        let b = array![[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]];
        let iterations = solve_w(&mut dictionary, &a, &b, 1.0, 10.0, 50, 1e-4);

        assert!(iterations >= 1);
        assert!(dictionary.matrix().iter().all(|&x| x >= 0.0));
        for norm in dictionary.column_norms() {
            assert!(norm <= 1.0 + 1e-12);
        }
    }
}
