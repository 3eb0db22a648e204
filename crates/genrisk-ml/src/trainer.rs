//! Disease model training.
//!
//! Fits the [`TrainedPipeline`] on a cleaned dataset:
//!
//! 1. median imputation of non-finite values, per column
//! 2. standard scaling (population std; a constant column keeps scale 1)
//! 3. L2-regularised logistic regression, intercept unpenalised, solved
//!    with damped Newton steps
//!
//! When the minority class makes up less than `imbalance_threshold` of the
//! rows, samples are reweighted by `n / (2 * class_count)`.

use genrisk_common::{FeatureVector, ModelScope, Result, RiskError, FEATURE_COLUMNS, FEATURE_DIM};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::cleaner::CleanedDataset;
use crate::diagnostics::ModelDiagnostics;
use crate::pipeline::{sigmoid, ClassWeighting, TrainedPipeline};

// Columns with a spread below this are treated as constant.
const MIN_SCALE: f64 = 1e-12;
// Keeps the Hessian invertible when the intercept is otherwise unpenalised.
const INTERCEPT_RIDGE: f64 = 1e-10;
const MAX_LINE_SEARCH_STEPS: usize = 30;

fn default_c() -> f64 {
    1.0
}

fn default_max_iter() -> usize {
    2000
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_imbalance_threshold() -> f64 {
    0.1
}

/// Solver settings, loaded from the `[training]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Inverse regularisation strength.
    #[serde(default = "default_c")]
    pub c: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// Stop once the largest gradient component falls below this.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Minority fraction below which balanced class weights are used.
    #[serde(default = "default_imbalance_threshold")]
    pub imbalance_threshold: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            c: default_c(),
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
            imbalance_threshold: default_imbalance_threshold(),
        }
    }
}

/// Output of a successful fit.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub pipeline: TrainedPipeline,
    pub feature_names: Vec<String>,
    pub training_rows: usize,
    pub diagnostics: ModelDiagnostics,
}

#[derive(Debug, Clone, Default)]
pub struct DiseaseTrainer {
    config: TrainerConfig,
}

impl DiseaseTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fit on a cleaned dataset.
    pub fn fit_dataset(&self, data: &CleanedDataset, scope: ModelScope) -> Result<FittedModel> {
        self.fit(&feature_matrix(&data.features), &data.labels, scope)
    }

    /// Fit on an `n × 4` matrix and 0/1 labels.
    pub fn fit(&self, x: &Array2<f64>, y: &[u8], scope: ModelScope) -> Result<FittedModel> {
        let (n, d) = x.dim();
        if d != FEATURE_DIM {
            return Err(RiskError::Dimension { expected: FEATURE_DIM, actual: d });
        }
        if y.len() != n {
            return Err(RiskError::Schema(format!(
                "label vector has {} entries for {} feature rows",
                y.len(),
                n
            )));
        }

        let mut classes: Vec<u8> = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(RiskError::InsufficientData { scope, classes: classes.len(), rows: n });
        }
        if classes != [0, 1] {
            return Err(RiskError::Schema(format!("labels must be 0/1, found {classes:?}")));
        }

        let medians = column_medians(x);
        let imputed = impute(x, &medians);
        let (means, scales) = column_moments(&imputed);
        let z = standardise(&imputed, &means, &scales);

        let positives = y.iter().filter(|&&l| l == 1).count();
        let counts = [n - positives, positives];
        let minority = counts[0].min(counts[1]) as f64 / n as f64;
        let weighting = if minority < self.config.imbalance_threshold {
            ClassWeighting::Balanced
        } else {
            ClassWeighting::Uniform
        };
        let sample_weights: Array1<f64> = y
            .iter()
            .map(|&l| match weighting {
                ClassWeighting::Balanced => n as f64 / (2.0 * counts[usize::from(l)] as f64),
                ClassWeighting::Uniform => 1.0,
            })
            .collect();
        let targets: Array1<f64> = y.iter().map(|&l| f64::from(l)).collect();

        tracing::debug!(
            scope = %scope,
            rows = n,
            positives,
            weighting = ?weighting,
            "Fitting logistic model"
        );

        let solution = solve_logistic(&z, &targets, &sample_weights, &self.config);
        if !solution.converged {
            tracing::warn!(
                scope = %scope,
                iterations = solution.n_iter,
                "Logistic solver hit the iteration cap before converging"
            );
        }

        let pipeline = TrainedPipeline {
            medians,
            means,
            scales,
            coefficients: solution.beta.iter().skip(1).copied().collect(),
            intercept: solution.beta[0],
            classes,
            class_weighting: weighting,
            n_iter: solution.n_iter,
            converged: solution.converged,
        };
        let diagnostics = ModelDiagnostics::inspect(&pipeline, x, y)?;

        Ok(FittedModel {
            pipeline,
            feature_names: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            training_rows: n,
            diagnostics,
        })
    }
}

pub fn feature_matrix(rows: &[FeatureVector]) -> Array2<f64> {
    let mut x = Array2::zeros((rows.len(), FEATURE_DIM));
    for (mut out, fv) in x.axis_iter_mut(Axis(0)).zip(rows) {
        for (cell, v) in out.iter_mut().zip(fv.as_slice()) {
            *cell = *v;
        }
    }
    x
}

// ── Preprocessing ────────────────────────────────────────────────────────────

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

fn column_medians(x: &Array2<f64>) -> Vec<f64> {
    x.axis_iter(Axis(1))
        .map(|col| {
            let mut finite: Vec<f64> = col.iter().copied().filter(|v| v.is_finite()).collect();
            median(&mut finite).unwrap_or(0.0)
        })
        .collect()
}

fn impute(x: &Array2<f64>, medians: &[f64]) -> Array2<f64> {
    let mut out = x.clone();
    for (mut col, m) in out.axis_iter_mut(Axis(1)).zip(medians) {
        col.mapv_inplace(|v| if v.is_finite() { v } else { *m });
    }
    out
}

fn column_moments(x: &Array2<f64>) -> (Vec<f64>, Vec<f64>) {
    let n = x.nrows() as f64;
    let mut means = Vec::with_capacity(x.ncols());
    let mut scales = Vec::with_capacity(x.ncols());
    for col in x.axis_iter(Axis(1)) {
        let mean = col.sum() / n;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        means.push(mean);
        scales.push(if std > MIN_SCALE { std } else { 1.0 });
    }
    (means, scales)
}

fn standardise(x: &Array2<f64>, means: &[f64], scales: &[f64]) -> Array2<f64> {
    let mut out = x.clone();
    for ((mut col, m), s) in out.axis_iter_mut(Axis(1)).zip(means).zip(scales) {
        col.mapv_inplace(|v| (v - m) / s);
    }
    out
}

// ── Solver ───────────────────────────────────────────────────────────────────

struct LogisticSolution {
    /// Intercept first, then one coefficient per column.
    beta: Array1<f64>,
    n_iter: usize,
    converged: bool,
}

fn softplus(t: f64) -> f64 {
    if t > 0.0 {
        t + (-t).exp().ln_1p()
    } else {
        t.exp().ln_1p()
    }
}

/// `0.5 * |w|² + C * Σ s_i (log(1 + e^η_i) − y_i η_i)`, intercept excluded from the penalty.
fn objective(xa: &Array2<f64>, y: &Array1<f64>, s: &Array1<f64>, beta: &Array1<f64>, c: f64) -> f64 {
    let eta = xa.dot(beta);
    let loss: f64 = eta
        .iter()
        .zip(y.iter())
        .zip(s.iter())
        .map(|((e, t), w)| w * (softplus(*e) - t * e))
        .sum();
    let penalty: f64 = beta.iter().skip(1).map(|b| b * b).sum::<f64>() * 0.5;
    penalty + c * loss
}

fn solve_logistic(
    z: &Array2<f64>,
    y: &Array1<f64>,
    s: &Array1<f64>,
    config: &TrainerConfig,
) -> LogisticSolution {
    let (n, d) = z.dim();
    let p = d + 1;
    let mut xa: Array2<f64> = Array2::ones((n, p));
    xa.slice_mut(ndarray::s![.., 1..]).assign(z);

    let mut penalty: Array1<f64> = Array1::ones(p);
    penalty[0] = 0.0;

    let mut beta: Array1<f64> = Array1::zeros(p);
    let mut f = objective(&xa, y, s, &beta, config.c);

    for iter in 0..config.max_iter {
        let prob = xa.dot(&beta).mapv(sigmoid);
        let residual = (&prob - y) * s;
        let grad = xa.t().dot(&residual) * config.c + &penalty * &beta;

        if grad.iter().fold(0.0_f64, |m, g| m.max(g.abs())) < config.tolerance {
            return LogisticSolution { beta, n_iter: iter, converged: true };
        }

        let curvature = prob.mapv(|q| q * (1.0 - q)) * s;
        let weighted = &xa * &curvature.view().insert_axis(Axis(1));
        let mut hessian = xa.t().dot(&weighted) * config.c;
        for j in 0..p {
            hessian[[j, j]] += penalty[j] + INTERCEPT_RIDGE;
        }

        let step = solve_linear(&hessian, &grad).unwrap_or_else(|| grad.clone());
        let slope = grad.dot(&step);

        let mut t = 1.0;
        let mut accepted = false;
        for _ in 0..MAX_LINE_SEARCH_STEPS {
            let candidate = &beta - &(&step * t);
            let fc = objective(&xa, y, s, &candidate, config.c);
            if fc <= f - 1e-4 * t * slope {
                beta = candidate;
                f = fc;
                accepted = true;
                break;
            }
            t *= 0.5;
        }
        if !accepted {
            // No descent possible at machine precision: already at the optimum.
            return LogisticSolution { beta, n_iter: iter + 1, converged: true };
        }
    }

    LogisticSolution { beta, n_iter: config.max_iter, converged: false }
}

/// Gaussian elimination with partial pivoting. `None` when singular.
fn solve_linear(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let mut m = a.clone();
    let mut rhs = b.clone();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| m[[i, col]].abs().total_cmp(&m[[j, col]].abs()))?;
        if m[[pivot, col]].abs() < 1e-300 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                m.swap([col, k], [pivot, k]);
            }
            rhs.swap(col, pivot);
        }
        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[[row, k]] -= factor * m[[col, k]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x: Array1<f64> = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| m[[row, k]] * x[k]).sum();
        x[row] = (rhs[row] - tail) / m[[row, row]];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}
