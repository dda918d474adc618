use crate::error::NnError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Activation applied by a layer, resolved once when the layer is built.
///
/// `Softmax` is an output-only mode: it normalises the whole row and pairs
/// with a cross-entropy loss, so it has no standalone derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// ReLU: max(0, x)
    #[serde(rename = "relu")]
    ReLU,
    /// Sigmoid: 1 / (1 + exp(-x))
    #[serde(alias = "logistic")]
    Sigmoid,
    /// Normalised exponential over the output row.
    Softmax,
}

impl Activation {
    /// Scalar activation. For `Softmax` this is the identity; the row-wise
    /// transform lives in [`softmax_row`].
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::ReLU => x.max(0.0),
            Activation::Sigmoid => sigmoid(x),
            Activation::Softmax => x,
        }
    }

    /// Derivative evaluated at the pre-activation `x`, or `None` for the
    /// softmax output whose derivative is folded into the loss gradient.
    pub fn derivative(self, x: f64) -> Option<f64> {
        match self {
            Activation::ReLU => Some(if x > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => {
                let s = sigmoid(x);
                Some(s * (1.0 - s))
            }
            Activation::Softmax => None,
        }
    }

    /// Starting bias: a small positive value keeps ReLU units alive.
    pub fn initial_bias(self) -> f64 {
        match self {
            Activation::ReLU => 0.01,
            _ => 0.0,
        }
    }

    pub fn is_softmax(self) -> bool {
        matches!(self, Activation::Softmax)
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::ReLU => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Softmax => "softmax",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = NnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relu" => Ok(Activation::ReLU),
            "sigmoid" | "logistic" => Ok(Activation::Sigmoid),
            "softmax" => Ok(Activation::Softmax),
            other => Err(NnError::UnsupportedActivation(other.to_string())),
        }
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Softmax of `z` written into `out` (same length): subtract the maximum,
/// exponentiate, divide by the sum.
pub fn softmax_row(z: &[f64], out: &mut [f64]) {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for (o, &v) in out.iter_mut().zip(z) {
        *o = (v - max).exp();
        sum += *o;
    }
    // The maximum contributes exp(0) = 1, so sum >= 1.
    out.iter_mut().for_each(|o| *o /= sum);
}
