//! Training configuration, loadable from JSON and validated once at startup.
use crate::activations::Activation;
use crate::error::{NnError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Topology and hyperparameters for a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Layer widths from input to output; one more entry than `activations`.
    pub layer_sizes: Vec<usize>,
    /// Activation name per layer (`relu`, `sigmoid`, `softmax`).
    pub activations: Vec<String>,
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    /// Weight-initialisation seed. `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Use at most this many training samples.
    pub train_limit: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            layer_sizes: vec![784, 128, 10],
            activations: vec!["relu".into(), "softmax".into()],
            epochs: 3,
            learning_rate: 0.01,
            batch_size: 32,
            seed: None,
            train_limit: Some(10_000),
        }
    }
}

impl TrainingConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Check the configuration and resolve activation names.
    pub fn validate(&self) -> Result<Vec<Activation>> {
        if self.batch_size == 0 {
            return Err(NnError::InvalidConfig("batch_size must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(NnError::InvalidConfig(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        let activations = self
            .activations
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<Activation>>>()?;
        validate_topology(&self.layer_sizes, &activations)?;
        Ok(activations)
    }
}

/// Shared topology check: at least one layer, no zero widths, one
/// activation per layer, softmax only on the last layer.
pub fn validate_topology(layer_sizes: &[usize], activations: &[Activation]) -> Result<()> {
    if layer_sizes.len() < 2 {
        return Err(NnError::InvalidConfig(
            "need at least an input and an output size".into(),
        ));
    }
    if layer_sizes.contains(&0) {
        return Err(NnError::InvalidConfig(format!(
            "layer sizes must be positive: {:?}",
            layer_sizes
        )));
    }
    if activations.len() != layer_sizes.len() - 1 {
        return Err(NnError::InvalidConfig(format!(
            "{} layer sizes need {} activations, got {}",
            layer_sizes.len(),
            layer_sizes.len() - 1,
            activations.len()
        )));
    }
    let last = activations.len() - 1;
    if activations[..last].iter().any(|a| a.is_softmax()) {
        return Err(NnError::UnsupportedActivation(
            "softmax is only valid on the output layer".into(),
        ));
    }
    Ok(())
}
