//! GARCH(p, q) volatility forecaster.
//!
//! Constant-mean model with Gaussian innovations:
//!
//! ```text
//! r_t      = mu + e_t
//! sigma2_t = omega + sum_i alpha_i * e_{t-i}^2 + sum_j beta_j * sigma2_{t-j}
//! ```
//!
//! Parameters are fitted by maximum likelihood with Nelder–Mead over an
//! unconstrained encoding that keeps `omega > 0`, every coefficient
//! positive, and `sum(alpha) + sum(beta) < 1`. Pre-sample shocks and
//! variances are seeded with an exponentially weighted backcast over the
//! first 75 squared residuals (weights `0.94^k`).

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::analytics::statistics::{mean, std_dev};
use crate::data::TrailingWindow;

use super::forecaster::{
    prepare_window, EstimationError, ModelOrder, VolatilityForecaster, MIN_VARIANCE,
};
use super::optimizer::NelderMead;

/// Settings for GARCH estimation.
///
/// `p` in the model order is the number of ARCH terms and `q` the number
/// of GARCH terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarchSettings {
    /// Observations required on top of the largest lag.
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
    #[serde(default)]
    pub optimizer: NelderMead,
}

fn default_min_observations() -> usize {
    20
}

impl Default for GarchSettings {
    fn default() -> Self {
        Self {
            min_observations: default_min_observations(),
            optimizer: NelderMead::default(),
        }
    }
}

/// A fitted GARCH model.
#[derive(Debug, Clone, Serialize)]
pub struct GarchFit {
    pub order: ModelOrder,
    pub mu: f64,
    pub omega: f64,
    /// ARCH coefficients, lag 1 first.
    pub alpha: Vec<f64>,
    /// GARCH coefficients, lag 1 first.
    pub beta: Vec<f64>,
    pub log_likelihood: f64,
    pub iterations: usize,
    /// One-step-ahead conditional variance.
    pub forecast_variance: f64,
}

impl GarchFit {
    pub fn persistence(&self) -> f64 {
        self.alpha.iter().sum::<f64>() + self.beta.iter().sum::<f64>()
    }

    /// Unconditional variance implied by the fit.
    pub fn long_run_variance(&self) -> Option<f64> {
        let persistence = self.persistence();
        (persistence < 1.0).then(|| self.omega / (1.0 - persistence))
    }

    pub fn forecast_volatility(&self) -> f64 {
        self.forecast_variance.sqrt()
    }
}

/// GARCH(p, q) forecaster.
#[derive(Debug, Clone, Default)]
pub struct GarchForecaster {
    settings: GarchSettings,
}

impl GarchForecaster {
    pub fn new(settings: GarchSettings) -> Self {
        Self { settings }
    }

    /// Fit the model to `returns` (already in percent units).
    pub fn fit(&self, returns: &[f64], order: ModelOrder) -> Result<GarchFit, EstimationError> {
        if order.p == 0 {
            return Err(EstimationError::InvalidOrder {
                p: order.p,
                q: order.q,
                reason: "at least one ARCH term is required".to_string(),
            });
        }

        let required = order.max_lag() + self.settings.min_observations;
        if returns.len() < required {
            return Err(EstimationError::WindowTooShort {
                required,
                actual: returns.len(),
            });
        }

        let sample_mean = mean(returns);
        let sample_sd = std_dev(returns, 1);
        let sample_variance = sample_sd * sample_sd;
        if !sample_variance.is_finite() || sample_variance < MIN_VARIANCE {
            return Err(EstimationError::ZeroVariance);
        }
        let backcast = backcast(returns, sample_mean).max(MIN_VARIANCE);

        let start = initial_guess(sample_mean, sample_variance, order);
        let mut step = vec![0.5; start.len()];
        step[0] = 0.1 * sample_sd;

        let objective = |x: &[f64]| {
            let params = Params::decode(x, order);
            negative_log_likelihood(returns, &params, backcast)
        };
        let minimum = self.settings.optimizer.minimize(objective, &start, &step);

        if !minimum.converged {
            return Err(EstimationError::NotConverged {
                iterations: minimum.iterations,
            });
        }

        let params = Params::decode(&minimum.point, order);
        let residuals: Vec<f64> = returns.iter().map(|r| r - params.mu).collect();
        let variances = conditional_variances(&residuals, &params, backcast);
        let forecast_variance = variances.last().copied().unwrap_or(f64::NAN);

        Ok(GarchFit {
            order,
            mu: params.mu,
            omega: params.omega,
            alpha: params.alpha,
            beta: params.beta,
            log_likelihood: -minimum.value,
            iterations: minimum.iterations,
            forecast_variance,
        })
    }
}

impl VolatilityForecaster for GarchForecaster {
    fn name(&self) -> &str {
        "garch"
    }

    fn forecast(
        &self,
        window: &TrailingWindow<'_>,
        order: ModelOrder,
    ) -> Result<f64, EstimationError> {
        let required = order.max_lag() + self.settings.min_observations;
        let (returns, _) = prepare_window(window, required)?;
        let fit = self.fit(&returns, order)?;
        let volatility = fit.forecast_volatility();
        if volatility.is_finite() {
            Ok(volatility)
        } else {
            Err(EstimationError::InvalidForecast(volatility))
        }
    }
}

/// Decoded model parameters.
struct Params {
    mu: f64,
    omega: f64,
    alpha: Vec<f64>,
    beta: Vec<f64>,
}

impl Params {
    /// Layout: `[mu, ln(omega), w_alpha_1..p, w_beta_1..q]`. Each
    /// coefficient is `exp(w_k) / (1 + sum exp(w))`, which keeps them
    /// positive with a total below one.
    fn decode(x: &[f64], order: ModelOrder) -> Self {
        let weights: Vec<f64> = x[2..].iter().map(|w| w.exp()).collect();
        let denominator = 1.0 + weights.iter().sum::<f64>();
        let coefficients: Vec<f64> = weights.iter().map(|w| w / denominator).collect();
        let (alpha, beta) = coefficients.split_at(order.p);
        Self {
            mu: x[0],
            omega: x[1].exp(),
            alpha: alpha.to_vec(),
            beta: beta.to_vec(),
        }
    }
}

/// Start at persistence 0.95 (alpha 0.05, beta 0.90) with omega matching
/// the sample variance.
fn initial_guess(mu: f64, variance: f64, order: ModelOrder) -> Vec<f64> {
    let (alpha_total, beta_total) = if order.q == 0 { (0.3, 0.0) } else { (0.05, 0.90) };
    let slack = 1.0 - alpha_total - beta_total;

    let mut x = Vec::with_capacity(2 + order.p + order.q);
    x.push(mu);
    x.push((variance * slack).ln());
    x.extend(std::iter::repeat((alpha_total / order.p as f64 / slack).ln()).take(order.p));
    if order.q > 0 {
        x.extend(std::iter::repeat((beta_total / order.q as f64 / slack).ln()).take(order.q));
    }
    x
}

const BACKCAST_LENGTH: usize = 75;
const BACKCAST_DECAY: f64 = 0.94;

/// Exponentially weighted mean of the first squared residuals, newest
/// weight on the first observation.
fn backcast(returns: &[f64], mu: f64) -> f64 {
    let tau = returns.len().min(BACKCAST_LENGTH);
    let (weighted, total) = returns[..tau].iter().enumerate().fold(
        (0.0, 0.0),
        |(weighted, total), (k, r)| {
            let w = BACKCAST_DECAY.powi(k as i32);
            (weighted + w * (r - mu).powi(2), total + w)
        },
    );
    weighted / total
}

/// Conditional variances for every observation plus one trailing entry
/// holding the one-step-ahead forecast.
fn conditional_variances(residuals: &[f64], params: &Params, backcast: f64) -> Vec<f64> {
    let n = residuals.len();
    let mut sigma2: Vec<f64> = Vec::with_capacity(n + 1);

    for t in 0..=n {
        let mut var = params.omega;
        for (i, a) in params.alpha.iter().enumerate() {
            let lag = i + 1;
            let shock = if t >= lag {
                residuals[t - lag].powi(2)
            } else {
                backcast
            };
            var += a * shock;
        }
        for (j, b) in params.beta.iter().enumerate() {
            let lag = j + 1;
            let past = if t >= lag { sigma2[t - lag] } else { backcast };
            var += b * past;
        }
        sigma2.push(var);
    }

    sigma2
}

fn negative_log_likelihood(returns: &[f64], params: &Params, backcast: f64) -> f64 {
    let residuals: Vec<f64> = returns.iter().map(|r| r - params.mu).collect();
    let sigma2 = conditional_variances(&residuals, params, backcast);

    let ln_2pi = (2.0 * PI).ln();
    residuals
        .iter()
        .zip(&sigma2)
        .map(|(e, s2)| {
            if *s2 <= 0.0 {
                f64::INFINITY
            } else {
                0.5 * (ln_2pi + s2.ln() + e * e / s2)
            }
        })
        .sum()
}
