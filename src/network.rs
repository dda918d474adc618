//! Feedforward network: an ordered chain of dense layers with mini-batch
//! backpropagation.
use crate::activations::Activation;
use crate::config::{validate_topology, TrainingConfig};
use crate::datasets::Sample;
use crate::error::{NnError, Result};
use crate::layers::DenseLayer;
use crate::loss::{cross_entropy_loss, mse_loss};
use crate::matrix::Matrix;
use crate::metrics::accuracy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use tracing::{debug, trace};

/// Network
#[derive(Debug, Clone)]
pub struct Network {
    /// Ordered list of dense layers from input to output.
    layers: Vec<DenseLayer>,
}

impl Network {
    /// Build a network with `layer_sizes.len() - 1` layers, drawing initial
    /// weights from `rng`.
    ///
    /// - `layer_sizes`: widths from input to output
    /// - `activations`: one per layer; `Softmax` only on the last
    pub fn new<R: Rng + ?Sized>(
        layer_sizes: &[usize],
        activations: &[Activation],
        rng: &mut R,
    ) -> Result<Self> {
        validate_topology(layer_sizes, activations)?;
        let layers = layer_sizes
            .windows(2)
            .zip(activations)
            .map(|(dims, &kind)| DenseLayer::new(dims[0], dims[1], kind, &mut *rng))
            .collect::<Result<Vec<_>>>()?;
        let network = Self { layers };
        debug!(topology = %network, ?activations, "network created");
        Ok(network)
    }

    /// Same as [`Network::new`] with a `StdRng` seeded from `seed`.
    pub fn with_seed(layer_sizes: &[usize], activations: &[Activation], seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new(layer_sizes, activations, &mut rng)
    }

    /// Validate `config` and build the network it describes.
    pub fn from_config(config: &TrainingConfig) -> Result<Self> {
        let activations = config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(&config.layer_sizes, &activations, &mut rng)
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Mutable access, e.g. to load known parameters via
    /// [`DenseLayer::set_parameters`].
    pub fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn output_size(&self) -> usize {
        self.last().output_size()
    }

    fn last(&self) -> &DenseLayer {
        &self.layers[self.layers.len() - 1]
    }

    /// Activation of the output layer from the last forward pass.
    pub fn output(&self) -> &Matrix {
        self.last().activation()
    }

    fn check_input(&self, input: &Matrix) -> Result<()> {
        let expected = (1, self.input_size());
        if input.shape() != expected {
            return Err(NnError::DimensionMismatch {
                op: "network_input",
                left: expected,
                right: input.shape(),
            });
        }
        Ok(())
    }

    fn check_output(&self, op: &'static str, m: &Matrix) -> Result<()> {
        let expected = (1, self.output_size());
        if m.shape() != expected {
            return Err(NnError::DimensionMismatch {
                op,
                left: expected,
                right: m.shape(),
            });
        }
        Ok(())
    }

    /// Run every layer in order; each reads its predecessor's activation.
    fn propagate(&mut self, input: &Matrix) -> Result<()> {
        self.layers[0].forward(input)?;
        for i in 1..self.layers.len() {
            let (before, rest) = self.layers.split_at_mut(i);
            rest[0].forward(before[i - 1].activation())?;
        }
        Ok(())
    }

    /// Forward pass from input to output, copied into `output`.
    pub fn forward(&mut self, input: &Matrix, output: &mut Matrix) -> Result<()> {
        self.check_input(input)?;
        self.check_output("network_output", output)?;
        self.propagate(input)?;
        output.copy_from(self.output())
    }

    /// One training example: forward, backward, gradient accumulation, and a
    /// parameter update when this call completes a batch.
    ///
    /// Returns the counter to pass to the next call: `0` right after an
    /// update, `batch_counter + 1` otherwise.
    pub fn train_step(
        &mut self,
        input: &Matrix,
        target: &Matrix,
        learning_rate: f64,
        batch_size: usize,
        batch_counter: usize,
    ) -> Result<usize> {
        if batch_size == 0 {
            return Err(NnError::InvalidConfig("batch size must be positive".into()));
        }
        self.check_input(input)?;
        self.check_output("train_target", target)?;

        self.propagate(input)?;

        // Output to input: delta, then gradients. A layer's delta reads the
        // next layer's delta and its transpose cache, which only an update
        // can invalidate.
        for i in (0..self.layers.len()).rev() {
            let (upto, after) = self.layers.split_at_mut(i + 1);
            let (before, current) = upto.split_at_mut(i);
            let layer = &mut current[0];
            match after.first() {
                Some(next) => layer.hidden_delta(next)?,
                None => layer.output_delta(target)?,
            }
            let layer_input = before.last().map(DenseLayer::activation).unwrap_or(input);
            layer.accumulate_gradients(layer_input)?;
        }
        trace!(batch_counter, "accumulated gradients");

        let next = batch_counter + 1;
        if next % batch_size != 0 {
            return Ok(next);
        }
        for layer in &mut self.layers {
            layer.apply_gradients(learning_rate, batch_size)?;
        }
        debug!(batch_size, learning_rate, "applied batch update");
        Ok(0)
    }

    /// Greedy label: index of the largest output.
    pub fn predict(&mut self, input: &Matrix) -> Result<usize> {
        self.check_input(input)?;
        self.propagate(input)?;
        Ok(self.output().argmax_row(0))
    }

    /// Loss of the last forward pass against `target`: cross-entropy for a
    /// softmax output, mean squared error otherwise.
    pub fn loss(&self, target: &Matrix) -> Result<f64> {
        if self.last().activation_kind().is_softmax() {
            cross_entropy_loss(self.output(), target)
        } else {
            mse_loss(self.output(), target)
        }
    }

    /// Evaluate accuracy assuming one-hot targets.
    pub fn evaluate(&mut self, samples: &[Sample]) -> Result<f64> {
        accuracy(self, samples)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sizes = vec![self.input_size()];
        sizes.extend(self.layers.iter().map(DenseLayer::output_size));
        write!(f, "Network: {:?}", sizes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn row(values: &[f64]) -> Matrix {
        Matrix::row_vector(values).unwrap()
    }

    fn classifier() -> Network {
        Network::with_seed(&[4, 6, 3], &[Activation::ReLU, Activation::Softmax], 3).unwrap()
    }

    #[test]
    fn test_network_creation() {
        let net = classifier();
        assert_eq!(net.layers().len(), 2);
        assert_eq!(net.input_size(), 4);
        assert_eq!(net.output_size(), 3);
        assert_eq!(net.layers()[1].input_size(), net.layers()[0].output_size());
        assert_eq!(net.to_string(), "Network: [4, 6, 3]");
    }

    #[test]
    fn test_invalid_topologies() {
        assert!(matches!(
            Network::with_seed(&[4], &[], 0),
            Err(NnError::InvalidConfig(_))
        ));
        assert!(matches!(
            Network::with_seed(&[4, 3, 2], &[Activation::Softmax, Activation::Softmax], 0),
            Err(NnError::UnsupportedActivation(_))
        ));
    }

    #[test]
    fn test_forward_copies_output() {
        let mut net = classifier();
        let mut out = Matrix::zeros(1, 3).unwrap();
        net.forward(&row(&[0.1, 0.2, 0.3, 0.4]), &mut out).unwrap();
        assert_eq!(&out, net.output());
        assert_abs_diff_eq!(out.sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_forward_rejects_bad_shapes() {
        let mut net = classifier();
        let mut out = Matrix::zeros(1, 3).unwrap();
        assert!(net.forward(&row(&[0.1, 0.2]), &mut out).is_err());
        let mut wrong_out = Matrix::zeros(1, 2).unwrap();
        assert!(net
            .forward(&row(&[0.1, 0.2, 0.3, 0.4]), &mut wrong_out)
            .is_err());
    }

    #[test]
    fn test_train_step_counter() {
        let mut net = classifier();
        let x = row(&[0.5, -0.2, 0.1, 0.9]);
        let t = row(&[0.0, 1.0, 0.0]);
        let mut counter = 0;
        for expected in [1, 2, 0, 1] {
            counter = net.train_step(&x, &t, 0.1, 3, counter).unwrap();
            assert_eq!(counter, expected);
        }
    }

    #[test]
    fn test_train_step_bad_target_leaves_state() {
        let mut net = classifier();
        let before = net.layers()[0].weight_gradients().clone();
        let err = net.train_step(&row(&[0.5, -0.2, 0.1, 0.9]), &row(&[1.0, 0.0]), 0.1, 1, 0);
        assert!(matches!(err, Err(NnError::DimensionMismatch { .. })));
        assert_eq!(net.layers()[0].weight_gradients(), &before);
    }

    #[test]
    fn test_zero_batch_size() {
        let mut net = classifier();
        let err = net.train_step(&row(&[0.0; 4]), &row(&[1.0, 0.0, 0.0]), 0.1, 0, 0);
        assert!(matches!(err, Err(NnError::InvalidConfig(_))));
    }

    #[test]
    fn test_predict_and_loss() {
        let mut net = classifier();
        let x = row(&[0.3, 0.1, -0.4, 0.8]);
        let label = net.predict(&x).unwrap();
        let mut target = Matrix::zeros(1, 3).unwrap();
        target.set(0, label, 1.0);
        let loss = net.loss(&target).unwrap();
        let p = net.output().get(0, label);
        assert_abs_diff_eq!(loss, -p.ln(), epsilon = 1e-9);
    }

    #[test]
    fn test_softmax_loss_decreases() {
        let mut net = classifier();
        let x = row(&[0.3, 0.1, -0.4, 0.8]);
        let t = row(&[0.0, 0.0, 1.0]);
        let mut out = Matrix::zeros(1, 3).unwrap();
        net.forward(&x, &mut out).unwrap();
        let initial = net.loss(&t).unwrap();
        let mut counter = 0;
        for _ in 0..50 {
            counter = net.train_step(&x, &t, 0.1, 1, counter).unwrap();
        }
        net.forward(&x, &mut out).unwrap();
        assert!(net.loss(&t).unwrap() < initial);
    }

    #[test]
    fn test_from_config() {
        let config = TrainingConfig {
            layer_sizes: vec![2, 3, 1],
            activations: vec!["relu".into(), "sigmoid".into()],
            seed: Some(1),
            ..Default::default()
        };
        let a = Network::from_config(&config).unwrap();
        let b = Network::from_config(&config).unwrap();
        assert_eq!(a.layers()[0].weights(), b.layers()[0].weights());
    }
}
