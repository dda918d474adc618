//! Utility functions for weight initialisation and reporting.
use crate::network::Network;
use rand::Rng;
use std::f64::consts::PI;
use tracing::info;

/// Standard-normal sample via the Box-Muller transform.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // gen::<f64>() is uniform on [0, 1); keep ln() away from zero.
    let u1: f64 = rng.gen::<f64>().max(1e-100);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Log the model summary
pub fn print_model_summary(network: &Network) {
    info!("Model summary: {}", network);
    for (i, layer) in network.layers().iter().enumerate() {
        info!(
            layer = i,
            inputs = layer.input_size(),
            outputs = layer.output_size(),
            activation = %layer.activation_kind(),
            parameters = layer.num_parameters(),
            "dense layer"
        );
    }
}
