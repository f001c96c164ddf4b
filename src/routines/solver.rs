use ndarray::{Array2, Axis};
use rayon::prelude::*;

/// Floor for the Hessian diagonal, guards the per-coordinate step division
const DIAG_FLOOR: f64 = 1e-14;

/// Joint solver for the activation matrix H and the residual matrix R
///
/// Given a fixed dictionary W and a batch matrix V, alternates a projected
/// gradient update of H with a soft-threshold update of R, minimizing
///
/// ```text
/// ½‖V − W·H − R‖²_F + λ‖R‖₁
/// ```
///
/// subject to H ≥ 0 and |R| ≤ v_max. Iterations are bounded by `max_iter`
/// and stop early when the relative change of the objective falls below
/// `stop_condition`. Not converging is not an error; the last state reached
/// is returned.
#[derive(Debug, Clone)]
pub struct Solver {
    /// Gradient step scale
    pub kappa: f64,
    /// Weight of the residual L1 penalty
    pub lambda: f64,
    /// Whether to model the residual at all; when false R stays zero
    pub use_r: bool,
    /// Iteration cap
    pub max_iter: usize,
    /// Relative-change threshold on the objective
    pub stop_condition: f64,
}

/// The solved chunk: activations, residuals and the final objective value
#[derive(Debug, Clone)]
pub struct SolverOutput {
    pub h: Array2<f64>,
    pub r: Array2<f64>,
    pub error: f64,
}

impl Solver {
    /// Solve for (H, R) against a fixed dictionary
    ///
    /// `h_init` and `r_init` warm-start the iteration; anything absent or
    /// shape-mismatched is reset to zeros for this batch. `v_max` caps the
    /// residual magnitude; held-out inference passes `f64::INFINITY` to relax
    /// the cap.
    pub fn solve(
        &self,
        v: &Array2<f64>,
        w: &Array2<f64>,
        h_init: Option<Array2<f64>>,
        r_init: Option<Array2<f64>>,
        v_max: f64,
    ) -> SolverOutput {
        let (n_features, num_topics) = w.dim();
        let batch_size = v.ncols();

        let mut h = match h_init {
            Some(h) if h.dim() == (num_topics, batch_size) => h,
            _ => Array2::zeros((num_topics, batch_size)),
        };
        let mut r = match r_init {
            Some(r) if r.dim() == (n_features, batch_size) => r,
            _ => Array2::zeros((n_features, batch_size)),
        };

        // Reused by every inner iteration
        let wtw = w.t().dot(w);

        let mut prev_error: Option<f64> = None;
        let mut error = 0.0;

        for iteration in 0..self.max_iter {
            let wt_v_minus_r = w.t().dot(&(v - &r));

            let h_delta = solve_h(&mut h, &wt_v_minus_r, &wtw, self.kappa);

            let mut r_delta = 0.0;
            let residual = if self.use_r {
                let r_actual = v - &w.dot(&h);
                r_delta = solve_r(&mut r, &r_actual, self.lambda, v_max);
                r_actual - &r
            } else {
                v - &w.dot(&h)
            };

            error = 0.5 * residual.iter().map(|x| x * x).sum::<f64>();
            if self.use_r {
                error += self.lambda * r.iter().map(|x| x.abs()).sum::<f64>();
            }

            tracing::debug!(
                "Solver iteration {}: objective {:.6e}, h step {:.3e}, r step {:.3e}",
                iteration,
                error,
                h_delta,
                r_delta
            );

            // No previous objective on the first iteration
            if let Some(prev) = prev_error {
                if (prev - error).abs() < self.stop_condition * prev.abs() {
                    break;
                }
            }
            prev_error = Some(error);
        }

        SolverOutput { h, r, error }
    }
}

/// One projected-gradient sweep over H
///
/// Coordinate-wise: each activation takes a gradient step scaled by
/// `kappa / WtW[t][t]` and is clipped at zero. Columns (documents) are
/// independent and are swept in parallel. Returns the magnitude of the
/// projected gradient, a partial convergence signal.
pub fn solve_h(
    h: &mut Array2<f64>,
    wt_v_minus_r: &Array2<f64>,
    wtw: &Array2<f64>,
    kappa: f64,
) -> f64 {
    let num_topics = h.nrows();

    let violation: f64 = h
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .zip(wt_v_minus_r.axis_iter(Axis(1)).into_par_iter())
        .map(|(mut h_col, wt_col)| {
            let mut violation = 0.0;
            for topic in 0..num_topics {
                let mut grad = -wt_col[topic];
                for other in 0..num_topics {
                    grad += wtw[[topic, other]] * h_col[other];
                }
                grad *= kappa / wtw[[topic, topic]].max(DIAG_FLOOR);

                let projected = if h_col[topic] == 0.0 {
                    grad.min(0.0)
                } else {
                    grad
                };
                violation += projected * projected;

                h_col[topic] = (h_col[topic] - grad).max(0.0);
            }
            violation
        })
        .sum();

    violation.sqrt()
}

/// One proximal update of R
///
/// Soft-thresholds `r_actual = V − W·H` by `lambda`, then clips every entry
/// to `[−v_max, v_max]`. Returns the magnitude of the change applied to R.
pub fn solve_r(r: &mut Array2<f64>, r_actual: &Array2<f64>, lambda: f64, v_max: f64) -> f64 {
    let mut violation = 0.0;

    ndarray::Zip::from(r).and(r_actual).for_each(|r, &actual| {
        let shrunk = (actual.abs() - lambda).max(0.0) * actual.signum();
        let updated = shrunk.clamp(-v_max, v_max);
        violation += (updated - *r) * (updated - *r);
        *r = updated;
    });

    violation.sqrt()
}
