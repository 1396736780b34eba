//! Small dense learners for the soft sensors
//!
//! Both learners standardize their inputs, expand them to degree-2
//! polynomial terms and solve the penalized normal equations with a
//! Cholesky factorization. The intercept is never penalized.

use crate::error::ModelError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Fewer rows than this cannot produce a usable fit
pub const MIN_TRAINING_ROWS: usize = 20;

const IRLS_MAX_ITERATIONS: usize = 50;
const IRLS_TOLERANCE: f64 = 1e-6;

/// A fitted model mapping one input row to one or more outputs
pub trait Model: Send + Sync {
    fn n_inputs(&self) -> usize;

    fn predict_row(&self, x: &[f64]) -> Vec<f64>;
}

/// Per-column z-score scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Standardizer {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let d = rows.first().map(Vec::len).unwrap_or(0);
        let n = rows.len().max(1) as f64;
        let mut mean = vec![0.0; d];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mut std = vec![0.0; d];
        for row in rows {
            for ((s, v), m) in std.iter_mut().zip(row).zip(&mean) {
                *s += (v - m).powi(2) / n;
            }
        }
        // Constant columns pass through centred but unscaled
        let std = std
            .into_iter()
            .map(|var| if var > f64::EPSILON { var.sqrt() } else { 1.0 })
            .collect();
        Self { mean, std }
    }

    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

/// Leading 1 for the intercept, the inputs, then every pairwise product (i <= j)
fn design_row(z: &[f64], degree: u8) -> Vec<f64> {
    let mut row = Vec::with_capacity(1 + z.len() + z.len() * (z.len() + 1) / 2);
    row.push(1.0);
    row.extend_from_slice(z);
    if degree >= 2 {
        for i in 0..z.len() {
            for j in i..z.len() {
                row.push(z[i] * z[j]);
            }
        }
    }
    row
}

fn check_shape(rows: &[Vec<f64>], expected: usize) -> Result<(), ModelError> {
    if rows.len() < MIN_TRAINING_ROWS {
        return Err(ModelError::InsufficientData {
            rows: rows.len(),
            required: MIN_TRAINING_ROWS,
        });
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != expected {
            return Err(ModelError::ShapeMismatch {
                row: i,
                got: row.len(),
                expected,
            });
        }
    }
    Ok(())
}

fn design_matrix(standardizer: &Standardizer, rows: &[Vec<f64>], degree: u8) -> DMatrix<f64> {
    let expanded: Vec<Vec<f64>> = rows
        .iter()
        .map(|r| design_row(&standardizer.transform(r), degree))
        .collect();
    let p = expanded.first().map(Vec::len).unwrap_or(1);
    DMatrix::from_fn(expanded.len(), p, |i, j| expanded[i][j])
}

/// Ridge penalty matrix with a zero in the intercept slot
fn penalty(p: usize, lambda: f64) -> DMatrix<f64> {
    let mut m = DMatrix::<f64>::identity(p, p) * lambda;
    m[(0, 0)] = 0.0;
    m
}

/// Multi-output ridge regression on polynomial features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegressor {
    pub degree: u8,
    pub lambda: f64,
    pub standardizer: Standardizer,
    /// One coefficient vector per output, intercept first
    pub coefficients: Vec<Vec<f64>>,
}

impl RidgeRegressor {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[Vec<f64>],
        degree: u8,
        lambda: f64,
    ) -> Result<Self, ModelError> {
        let d = x.first().map(Vec::len).unwrap_or(0);
        check_shape(x, d)?;
        let k = y.first().map(Vec::len).unwrap_or(0);
        if y.len() != x.len() {
            return Err(ModelError::ShapeMismatch {
                row: y.len().min(x.len()),
                got: y.len(),
                expected: x.len(),
            });
        }
        for (i, row) in y.iter().enumerate() {
            if row.len() != k {
                return Err(ModelError::ShapeMismatch {
                    row: i,
                    got: row.len(),
                    expected: k,
                });
            }
        }

        let standardizer = Standardizer::fit(x);
        let design = design_matrix(&standardizer, x, degree);
        let targets = DMatrix::from_fn(y.len(), k, |i, j| y[i][j]);

        let p = design.ncols();
        let gram = design.transpose() * &design + penalty(p, lambda);
        let rhs = design.transpose() * targets;

        let beta = gram.cholesky().ok_or(ModelError::Singular)?.solve(&rhs);

        let coefficients = (0..k)
            .map(|j| beta.column(j).iter().copied().collect())
            .collect();

        Ok(Self {
            degree,
            lambda,
            standardizer,
            coefficients,
        })
    }

    pub fn n_outputs(&self) -> usize {
        self.coefficients.len()
    }
}

impl Model for RidgeRegressor {
    fn n_inputs(&self) -> usize {
        self.standardizer.mean.len()
    }

    fn predict_row(&self, x: &[f64]) -> Vec<f64> {
        let row = design_row(&self.standardizer.transform(x), self.degree);
        self.coefficients
            .iter()
            .map(|beta| beta.iter().zip(&row).map(|(b, v)| b * v).sum())
            .collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// L2-regularized logistic regression fitted by Newton/IRLS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    pub degree: u8,
    pub lambda: f64,
    pub standardizer: Standardizer,
    pub coefficients: Vec<f64>,
}

impl LogisticClassifier {
    pub fn fit(x: &[Vec<f64>], y: &[bool], degree: u8, lambda: f64) -> Result<Self, ModelError> {
        let d = x.first().map(Vec::len).unwrap_or(0);
        check_shape(x, d)?;
        if y.len() != x.len() {
            return Err(ModelError::ShapeMismatch {
                row: y.len().min(x.len()),
                got: y.len(),
                expected: x.len(),
            });
        }

        let standardizer = Standardizer::fit(x);
        let design = design_matrix(&standardizer, x, degree);
        let (n, p) = design.shape();
        let targets = DVector::from_iterator(n, y.iter().map(|&b| if b { 1.0 } else { 0.0 }));
        let reg = penalty(p, lambda);

        let mut beta = DVector::<f64>::zeros(p);
        for _ in 0..IRLS_MAX_ITERATIONS {
            let probs = (&design * &beta).map(sigmoid);
            let weights = probs.map(|q| (q * (1.0 - q)).max(1e-9));

            let mut weighted = design.clone();
            for (i, w) in weights.iter().enumerate() {
                weighted.row_mut(i).scale_mut(*w);
            }
            let hessian = design.transpose() * weighted + &reg;
            let gradient = design.transpose() * (&targets - &probs) - &reg * &beta;

            let step = hessian
                .cholesky()
                .ok_or(ModelError::Singular)?
                .solve(&gradient);
            beta += &step;

            if step.norm() < IRLS_TOLERANCE {
                break;
            }
        }

        Ok(Self {
            degree,
            lambda,
            standardizer,
            coefficients: beta.iter().copied().collect(),
        })
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        let row = design_row(&self.standardizer.transform(x), self.degree);
        sigmoid(self.coefficients.iter().zip(&row).map(|(b, v)| b * v).sum())
    }
}

impl Model for LogisticClassifier {
    fn n_inputs(&self) -> usize {
        self.standardizer.mean.len()
    }

    fn predict_row(&self, x: &[f64]) -> Vec<f64> {
        vec![self.predict_proba(x)]
    }
}

/// Mean absolute error of the first output over a holdout set
pub fn mean_absolute_error<M: Model + ?Sized>(model: &M, x: &[Vec<f64>], y: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let total: f64 = x
        .iter()
        .zip(y)
        .map(|(row, target)| {
            let predicted = model.predict_row(row).first().copied().unwrap_or(0.0);
            (predicted - target).abs()
        })
        .sum();
    total / x.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(n: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| vec![(i % 10) as f64, (i / 10) as f64])
            .collect()
    }

    #[test]
    fn test_standardizer_zero_mean_unit_variance() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0], vec![5.0, 5.0]];
        let s = Standardizer::fit(&rows);
        assert_relative_eq!(s.mean[0], 3.0);
        assert_eq!(s.std[1], 1.0);
        let z = s.transform(&[3.0, 5.0]);
        assert_relative_eq!(z[0], 0.0);
        assert_relative_eq!(z[1], 0.0);
    }

    #[test]
    fn test_ridge_recovers_quadratic() {
        let x = grid(100);
        let y: Vec<Vec<f64>> = x
            .iter()
            .map(|r| vec![2.0 + 3.0 * r[0] - 0.5 * r[1] * r[1], r[0] + r[1]])
            .collect();
        let model = RidgeRegressor::fit(&x, &y, 2, 1e-6).unwrap();
        assert_eq!(model.n_outputs(), 2);
        assert_eq!(model.n_inputs(), 2);

        let pred = model.predict_row(&[4.0, 3.0]);
        assert_relative_eq!(pred[0], 2.0 + 12.0 - 4.5, epsilon = 1e-4);
        assert_relative_eq!(pred[1], 7.0, epsilon = 1e-4);
    }

    #[test]
    fn test_ridge_rejects_small_or_ragged_input() {
        let x = grid(5);
        let y = vec![vec![0.0]; 5];
        assert!(matches!(
            RidgeRegressor::fit(&x, &y, 2, 1.0),
            Err(ModelError::InsufficientData { rows: 5, .. })
        ));

        let mut x = grid(30);
        x[7] = vec![1.0];
        let y = vec![vec![0.0]; 30];
        assert!(matches!(
            RidgeRegressor::fit(&x, &y, 2, 1.0),
            Err(ModelError::ShapeMismatch { row: 7, .. })
        ));
    }

    #[test]
    fn test_logistic_separates_classes() {
        let x = grid(100);
        let y: Vec<bool> = x.iter().map(|r| r[0] + r[1] > 9.0).collect();
        let model = LogisticClassifier::fit(&x, &y, 1, 0.1).unwrap();

        assert!(model.predict_proba(&[9.0, 9.0]) > 0.9);
        assert!(model.predict_proba(&[0.0, 0.0]) < 0.1);
        let p = model.predict_proba(&[5.0, 4.5]);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_logistic_learns_band_with_quadratic_terms() {
        let x = grid(100);
        // Positive only for mid-range first feature
        let y: Vec<bool> = x.iter().map(|r| (3.0..=6.0).contains(&r[0])).collect();
        let model = LogisticClassifier::fit(&x, &y, 2, 0.1).unwrap();
        assert!(model.predict_proba(&[4.5, 5.0]) > 0.5);
        assert!(model.predict_proba(&[9.0, 5.0]) < 0.5);
        assert!(model.predict_proba(&[0.0, 5.0]) < 0.5);
    }

    #[test]
    fn test_mean_absolute_error() {
        let x = grid(40);
        let y: Vec<Vec<f64>> = x.iter().map(|r| vec![r[0]]).collect();
        let model = RidgeRegressor::fit(&x, &y, 1, 1e-9).unwrap();
        let flat: Vec<f64> = y.iter().map(|r| r[0]).collect();
        assert!(mean_absolute_error(&model, &x, &flat) < 1e-6);
        let shifted: Vec<f64> = flat.iter().map(|v| v + 2.0).collect();
        assert_relative_eq!(mean_absolute_error(&model, &x, &shifted), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_serde_round_trip_preserves_predictions() {
        let x = grid(50);
        let y: Vec<bool> = x.iter().map(|r| r[1] > 2.0).collect();
        let model = LogisticClassifier::fit(&x, &y, 2, 1.0).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let back: LogisticClassifier = serde_json::from_str(&json).unwrap();
        assert_relative_eq!(back.predict_proba(&[1.0, 3.0]), model.predict_proba(&[1.0, 3.0]));
    }
}
