//! Loss functions used to report training progress.
//!
//! The gradients themselves come from the output-layer delta rule in
//! [`crate::layers::DenseLayer::output_delta`]; these values are for
//! reporting only.
use crate::error::{NnError, Result};
use crate::matrix::Matrix;

fn check(op: &'static str, pred: &Matrix, target: &Matrix) -> Result<()> {
    if pred.shape() != target.shape() {
        return Err(NnError::DimensionMismatch {
            op,
            left: pred.shape(),
            right: target.shape(),
        });
    }
    Ok(())
}

/// MSE loss
pub fn mse_loss(pred: &Matrix, target: &Matrix) -> Result<f64> {
    check("mse_loss", pred, target)?;
    let n = pred.as_slice().len() as f64;
    Ok(pred
        .as_slice()
        .iter()
        .zip(target.as_slice())
        .map(|(&p, &t)| (p - t).powi(2))
        .sum::<f64>()
        / n)
}

/// Cross-entropy loss (assumes `pred` is a valid probability distribution)
pub fn cross_entropy_loss(pred: &Matrix, target: &Matrix) -> Result<f64> {
    check("cross_entropy_loss", pred, target)?;
    let eps = 1e-12;
    Ok(pred
        .as_slice()
        .iter()
        .zip(target.as_slice())
        .map(|(&p, &t)| -t * p.clamp(eps, 1.0 - eps).ln())
        .sum())
}
