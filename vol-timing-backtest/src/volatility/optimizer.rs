//! Derivative-free minimizer used for likelihood estimation.
//!
//! Standard Nelder–Mead simplex with the usual coefficients
//! (reflection 1, expansion 2, contraction 0.5, shrink 0.5).

use serde::{Deserialize, Serialize};

/// Nelder–Mead settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NelderMead {
    /// Iteration cap. Hitting it counts as non-convergence.
    pub max_iterations: usize,
    /// Relative tolerance on the spread of objective values in the simplex.
    pub f_tolerance: f64,
    /// Absolute tolerance on the spread of simplex vertices.
    pub x_tolerance: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 2_000,
            f_tolerance: 1e-8,
            x_tolerance: 1e-4,
        }
    }
}

/// Outcome of a minimization.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl NelderMead {
    /// Minimize `objective` starting from `start`, with initial simplex
    /// edges of length `step[i]` along each axis. Non-finite objective
    /// values are treated as `+inf`.
    pub fn minimize<F>(&self, objective: F, start: &[f64], step: &[f64]) -> Minimum
    where
        F: Fn(&[f64]) -> f64,
    {
        let n = start.len();
        let eval = |x: &[f64]| {
            let v = objective(x);
            if v.is_finite() {
                v
            } else {
                f64::INFINITY
            }
        };

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        simplex.push((start.to_vec(), eval(start)));
        for i in 0..n {
            let mut vertex = start.to_vec();
            vertex[i] += step.get(i).copied().unwrap_or(0.1);
            let value = eval(&vertex);
            simplex.push((vertex, value));
        }

        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

            if self.has_converged(&simplex) {
                converged = true;
                break;
            }
            iterations += 1;

            let best = simplex[0].1;
            let second_worst = simplex[n - 1].1;
            let worst = simplex[n].1;

            let centroid: Vec<f64> = (0..n)
                .map(|j| simplex[..n].iter().map(|(x, _)| x[j]).sum::<f64>() / n as f64)
                .collect();

            let reflected = blend(&centroid, &simplex[n].0, -1.0);
            let f_reflected = eval(&reflected);

            if f_reflected < best {
                let expanded = blend(&centroid, &simplex[n].0, -2.0);
                let f_expanded = eval(&expanded);
                simplex[n] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
                continue;
            }

            if f_reflected < second_worst {
                simplex[n] = (reflected, f_reflected);
                continue;
            }

            let accepted = if f_reflected < worst {
                let outside = blend(&centroid, &reflected, 0.5);
                let f_outside = eval(&outside);
                (f_outside <= f_reflected).then_some((outside, f_outside))
            } else {
                let inside = blend(&centroid, &simplex[n].0, 0.5);
                let f_inside = eval(&inside);
                (f_inside < worst).then_some((inside, f_inside))
            };

            match accepted {
                Some(vertex) => simplex[n] = vertex,
                None => {
                    let anchor = simplex[0].0.clone();
                    for vertex in simplex.iter_mut().skip(1) {
                        let shrunk = blend(&anchor, &vertex.0, 0.5);
                        let value = eval(&shrunk);
                        *vertex = (shrunk, value);
                    }
                }
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (point, value) = simplex.swap_remove(0);
        Minimum {
            point,
            value,
            iterations,
            converged: converged && value.is_finite(),
        }
    }

    fn has_converged(&self, simplex: &[(Vec<f64>, f64)]) -> bool {
        let (best_x, best_f) = &simplex[0];
        if !best_f.is_finite() {
            return false;
        }
        let f_spread = simplex
            .iter()
            .map(|(_, f)| (f - best_f).abs())
            .fold(0.0, f64::max);
        let x_spread = simplex
            .iter()
            .flat_map(|(x, _)| x.iter().zip(best_x).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        f_spread <= self.f_tolerance * (1.0 + best_f.abs()) && x_spread <= self.x_tolerance
    }
}

/// `origin + t * (target - origin)`.
fn blend(origin: &[f64], target: &[f64], t: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(target)
        .map(|(o, x)| o + t * (x - o))
        .collect()
}
