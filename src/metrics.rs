//! Metrics for evaluating a trained network by greedy label selection.
use crate::datasets::Sample;
use crate::error::Result;
use crate::network::Network;

/// Accuracy
pub fn accuracy(network: &mut Network, samples: &[Sample]) -> Result<f64> {
    if samples.is_empty() {
        return Ok(0.0);
    }
    let mut correct = 0;
    for sample in samples {
        if network.predict(&sample.input)? == sample.label() {
            correct += 1;
        }
    }
    Ok(correct as f64 / samples.len() as f64)
}

/// Simple confusion matrix, indexed `[true_class][predicted_class]`.
pub fn confusion_matrix(
    network: &mut Network,
    samples: &[Sample],
    num_classes: usize,
) -> Result<Vec<Vec<usize>>> {
    let mut cm = vec![vec![0; num_classes]; num_classes];
    for sample in samples {
        let predicted = network.predict(&sample.input)?;
        let actual = sample.label();
        if predicted < num_classes && actual < num_classes {
            cm[actual][predicted] += 1;
        }
    }
    Ok(cm)
}
