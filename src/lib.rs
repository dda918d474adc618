//! A minimal feedforward neural network trainer: dense row-major matrices,
//! fully-connected layers with cached backpropagation buffers, and
//! mini-batch stochastic gradient descent.
//!
//! - `Matrix` primitives that write into caller-owned destinations
//! - Dense layers with ReLU, sigmoid, or a softmax output stage
//! - Backpropagation with gradient accumulation and a caller-threaded
//!   batch counter
//! - MNIST IDX loader and greedy-label evaluation
//!
//! ```no_run
//! use backprop_mlp::{datasets, Activation, Network};
//!
//! # fn main() -> anyhow::Result<()> {
//! let samples = datasets::xor()?;
//! let mut net = Network::with_seed(&[2, 3, 1], &[Activation::ReLU, Activation::Sigmoid], 7)?;
//! let mut counter = 0;
//! for _ in 0..5000 {
//!     for s in &samples {
//!         counter = net.train_step(&s.input, &s.target, 1.0, 4, counter)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod activations;
pub mod config;
pub mod datasets;
pub mod error;
pub mod layers;
pub mod loss;
pub mod matrix;
pub mod metrics;
pub mod network;
pub mod utils;

pub use activations::Activation;
pub use config::TrainingConfig;
pub use datasets::{load_mnist, Sample};
pub use error::{NnError, Result};
pub use layers::DenseLayer;
pub use matrix::{Init, Matrix};
pub use metrics::{accuracy, confusion_matrix};
pub use network::Network;
pub use utils::print_model_summary;
