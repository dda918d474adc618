//! Dense layer with weights, bias, activation, and the cached buffers used
//! by backpropagation.
//!
//! All buffers are allocated once in [`DenseLayer::new`] and reused for
//! every training step. The weight transpose held in [`LayerWorkspace`] is
//! recomputed on every weight mutation, so it is always in sync with
//! `weights` when the previous layer reads it during the backward pass.
use crate::activations::{softmax_row, Activation};
use crate::error::{NnError, Result};
use crate::matrix::{multiply, scalar_multiply, subtract, transpose, Matrix};
use crate::utils::standard_normal;
use rand::Rng;

/// Scratch buffers owned by a layer.
#[derive(Debug, Clone)]
pub struct LayerWorkspace {
    /// `weights` transposed (`out x in`). Valid between weight updates;
    /// refreshed by every method that writes `weights`.
    weights_t: Matrix,
    /// `f'(z)` from the last backward pass (`1 x out`).
    z_prime: Matrix,
    /// Transposed layer input (`in x 1`).
    input_t: Matrix,
    /// Per-example weight gradient, later the scaled update (`in x out`).
    weight_step: Matrix,
    /// Scaled bias update (`1 x out`).
    bias_step: Matrix,
}

impl LayerWorkspace {
    fn new(input_size: usize, output_size: usize) -> Result<Self> {
        Ok(Self {
            weights_t: Matrix::zeros(output_size, input_size)?,
            z_prime: Matrix::zeros(1, output_size)?,
            input_t: Matrix::zeros(input_size, 1)?,
            weight_step: Matrix::zeros(input_size, output_size)?,
            bias_step: Matrix::zeros(1, output_size)?,
        })
    }
}

/// A fully-connected layer: `a = f(input × W + b)`.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    weights: Matrix,
    biases: Matrix,
    kind: Activation,
    z: Matrix,
    activation: Matrix,
    delta: Matrix,
    weight_gradients: Matrix,
    bias_gradients: Matrix,
    workspace: LayerWorkspace,
}

impl DenseLayer {
    /// Create a new dense layer using He initialisation: each weight is a
    /// standard-normal draw scaled by `sqrt(2 / input_size)`.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        kind: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        let scale = (2.0 / input_size as f64).sqrt();
        let weights = Matrix::from_fn(input_size, output_size, |_, _| {
            standard_normal(&mut *rng) * scale
        })?;
        let biases = Matrix::from_vec(1, output_size, vec![kind.initial_bias(); output_size])?;

        let mut layer = Self {
            weights,
            biases,
            kind,
            z: Matrix::zeros(1, output_size)?,
            activation: Matrix::zeros(1, output_size)?,
            delta: Matrix::zeros(1, output_size)?,
            weight_gradients: Matrix::zeros(input_size, output_size)?,
            bias_gradients: Matrix::zeros(1, output_size)?,
            workspace: LayerWorkspace::new(input_size, output_size)?,
        };
        layer.refresh_transpose()?;
        Ok(layer)
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.cols()
    }

    pub fn num_parameters(&self) -> usize {
        self.input_size() * self.output_size() + self.output_size()
    }

    pub fn activation_kind(&self) -> Activation {
        self.kind
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn biases(&self) -> &Matrix {
        &self.biases
    }

    /// Cached transpose of the weights.
    pub fn weights_transposed(&self) -> &Matrix {
        &self.workspace.weights_t
    }

    /// Pre-activation values from the last forward pass.
    pub fn z(&self) -> &Matrix {
        &self.z
    }

    /// Output of the last forward pass.
    pub fn activation(&self) -> &Matrix {
        &self.activation
    }

    pub fn delta(&self) -> &Matrix {
        &self.delta
    }

    pub fn weight_gradients(&self) -> &Matrix {
        &self.weight_gradients
    }

    pub fn bias_gradients(&self) -> &Matrix {
        &self.bias_gradients
    }

    /// Replace weights and biases. Shapes must match the layer's.
    pub fn set_parameters(&mut self, weights: Matrix, biases: Matrix) -> Result<()> {
        check_shape("set_weights", self.weights.shape(), weights.shape())?;
        check_shape("set_biases", self.biases.shape(), biases.shape())?;
        self.weights = weights;
        self.biases = biases;
        self.refresh_transpose()
    }

    fn refresh_transpose(&mut self) -> Result<()> {
        transpose(&self.weights, &mut self.workspace.weights_t)
    }

    /// Forward pass: `z = input × W + b`, then the activation (or the
    /// softmax row for an output layer).
    pub fn forward(&mut self, input: &Matrix) -> Result<()> {
        check_shape("layer_forward", (1, self.input_size()), input.shape())?;
        multiply(input, &self.weights, &mut self.z)?;
        self.z.add_assign(&self.biases)?;

        if self.kind.is_softmax() {
            softmax_row(self.z.as_slice(), self.activation.as_mut_slice());
        } else {
            let kind = self.kind;
            for (a, &z) in self.activation.as_mut_slice().iter_mut().zip(self.z.as_slice()) {
                *a = kind.apply(z);
            }
        }
        Ok(())
    }

    /// Store `f'(z)` for the backward pass. Softmax layers skip this.
    pub fn compute_derivative_cache(&mut self) {
        let kind = self.kind;
        for (zp, &z) in self
            .workspace
            .z_prime
            .as_mut_slice()
            .iter_mut()
            .zip(self.z.as_slice())
        {
            if let Some(d) = kind.derivative(z) {
                *zp = d;
            }
        }
    }

    /// Output-layer delta: `(a - t) ⊙ f'(z)` for squared error, or `a - t`
    /// for softmax paired with cross-entropy.
    pub fn output_delta(&mut self, target: &Matrix) -> Result<()> {
        check_shape("output_delta", self.activation.shape(), target.shape())?;
        subtract(&self.activation, target, &mut self.delta)?;
        if !self.kind.is_softmax() {
            self.compute_derivative_cache();
            self.delta.mul_assign(&self.workspace.z_prime)?;
        }
        Ok(())
    }

    /// Hidden-layer delta: `(delta_next × W_next^T) ⊙ f'(z)`.
    ///
    /// `next` must have run its own delta step first, and its transpose
    /// cache must reflect its current weights.
    pub fn hidden_delta(&mut self, next: &DenseLayer) -> Result<()> {
        if self.kind.is_softmax() {
            return Err(NnError::UnsupportedActivation(
                "softmax is only valid on the output layer".into(),
            ));
        }
        multiply(&next.delta, &next.workspace.weights_t, &mut self.delta)?;
        self.compute_derivative_cache();
        self.delta.mul_assign(&self.workspace.z_prime)
    }

    /// `weight_gradients += input^T × delta`, `bias_gradients += delta`.
    pub fn accumulate_gradients(&mut self, input: &Matrix) -> Result<()> {
        check_shape("accumulate_gradients", (1, self.input_size()), input.shape())?;
        let ws = &mut self.workspace;
        transpose(input, &mut ws.input_t)?;
        multiply(&ws.input_t, &self.delta, &mut ws.weight_step)?;
        self.weight_gradients.add_assign(&ws.weight_step)?;
        self.bias_gradients.add_assign(&self.delta)
    }

    /// Gradient-descent step with the averaged gradient, then reset the
    /// accumulators and refresh the transpose cache.
    pub fn apply_gradients(&mut self, learning_rate: f64, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(NnError::InvalidConfig("batch size must be positive".into()));
        }
        let step = learning_rate / batch_size as f64;
        let ws = &mut self.workspace;
        scalar_multiply(&self.weight_gradients, step, &mut ws.weight_step)?;
        scalar_multiply(&self.bias_gradients, step, &mut ws.bias_step)?;
        self.weights.sub_assign(&ws.weight_step)?;
        self.biases.sub_assign(&ws.bias_step)?;

        self.weight_gradients.reset();
        self.bias_gradients.reset();
        self.refresh_transpose()
    }
}

fn check_shape(op: &'static str, expected: (usize, usize), got: (usize, usize)) -> Result<()> {
    if expected != got {
        return Err(NnError::DimensionMismatch {
            op,
            left: expected,
            right: got,
        });
    }
    Ok(())
}
