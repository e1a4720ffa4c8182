//! Multi-layer perceptron backend on Candle
//!
//! Weights are stored in safetensors as `layers.{i}.weight` with shape
//! `(out, in)` and `layers.{i}.bias` with shape `(out,)`. Hidden layers use
//! ReLU and the output goes through softmax.

use crate::classifier::{argmax, Classifier};
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::Linear;
use flutevision_core::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

fn candle_err(e: candle_core::Error) -> Error {
    Error::classifier(format!("candle: {}", e))
}

/// Feed-forward classifier evaluated on the CPU
pub struct MlpClassifier {
    layers: Vec<Linear>,
    device: Device,
    n_classes: usize,
    n_features: usize,
}

impl std::fmt::Debug for MlpClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlpClassifier")
            .field("layers", &self.layers.len())
            .field("n_classes", &self.n_classes)
            .field("n_features", &self.n_features)
            .finish()
    }
}

impl MlpClassifier {
    /// Load `layer_count` linear layers from a safetensors file
    pub fn load(
        weights: &Path,
        layer_count: usize,
        n_classes: usize,
        n_features: usize,
    ) -> Result<Self> {
        let device = Device::Cpu;
        let tensors = candle_core::safetensors::load(weights, &device).map_err(candle_err)?;
        Self::from_tensors(tensors, layer_count, n_classes, n_features)
    }

    /// Build from named tensors already in memory
    pub fn from_tensors(
        mut tensors: HashMap<String, Tensor>,
        layer_count: usize,
        n_classes: usize,
        n_features: usize,
    ) -> Result<Self> {
        if layer_count == 0 {
            return Err(Error::classifier("mlp needs at least one layer"));
        }

        let mut layers = Vec::with_capacity(layer_count);
        let mut expected_in = n_features;

        for i in 0..layer_count {
            let weight = tensors
                .remove(&format!("layers.{}.weight", i))
                .ok_or_else(|| Error::classifier(format!("missing tensor layers.{}.weight", i)))?
                .to_dtype(DType::F32)
                .map_err(candle_err)?;
            let bias = tensors
                .remove(&format!("layers.{}.bias", i))
                .map(|b| b.to_dtype(DType::F32))
                .transpose()
                .map_err(candle_err)?;

            let (out_dim, in_dim) = weight.dims2().map_err(candle_err)?;
            if in_dim != expected_in {
                return Err(Error::classifier(format!(
                    "layer {} expects {} inputs, previous layer produces {}",
                    i, in_dim, expected_in
                )));
            }
            if let Some(bias) = &bias {
                if bias.dims1().map_err(candle_err)? != out_dim {
                    return Err(Error::classifier(format!(
                        "layer {} bias does not match {} outputs",
                        i, out_dim
                    )));
                }
            }

            layers.push(Linear::new(weight, bias));
            expected_in = out_dim;
        }

        if expected_in != n_classes {
            return Err(Error::classifier(format!(
                "mlp produces {} outputs but {} classes are labeled",
                expected_in, n_classes
            )));
        }

        Ok(Self {
            layers,
            device: Device::Cpu,
            n_classes,
            n_features,
        })
    }

    fn forward(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.n_features {
            return Err(Error::classifier(format!(
                "mlp expects {} features, got {}",
                self.n_features,
                features.len()
            )));
        }

        let input: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let mut x = Tensor::from_vec(input, (1, self.n_features), &self.device)
            .map_err(candle_err)?;

        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x).map_err(candle_err)?;
            if i < last {
                x = x.relu().map_err(candle_err)?;
            }
        }

        let probs = candle_nn::ops::softmax(&x, D::Minus1)
            .and_then(|p| p.squeeze(0))
            .and_then(|p| p.to_vec1::<f32>())
            .map_err(candle_err)?;

        // Renormalize in f64 so the distribution sums to one at double precision.
        let probs: Vec<f64> = probs.into_iter().map(f64::from).collect();
        let total: f64 = probs.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(Error::classifier("mlp produced a non-finite distribution"));
        }
        Ok(probs.into_iter().map(|p| p / total).collect())
    }
}

impl Classifier for MlpClassifier {
    fn name(&self) -> &str {
        "mlp"
    }

    fn class_count(&self) -> usize {
        self.n_classes
    }

    fn feature_count(&self) -> usize {
        self.n_features
    }

    fn predict_index(&self, features: &[f64]) -> Result<usize> {
        let distribution = self.forward(features)?;
        argmax(&distribution).ok_or_else(|| Error::classifier("empty class distribution"))
    }

    fn predict_distribution(&self, features: &[f64]) -> Result<Vec<f64>> {
        self.forward(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One hidden layer of width 2 over 3 inputs, 2 output classes.
    /// Class 1 wins when the first input is large.
    fn tensors() -> HashMap<String, Tensor> {
        let dev = Device::Cpu;
        let mut map = HashMap::new();
        map.insert(
            "layers.0.weight".to_string(),
            Tensor::new(&[[1.0f32, 0.0, 0.0], [0.0, 1.0, 0.0]], &dev).unwrap(),
        );
        map.insert(
            "layers.0.bias".to_string(),
            Tensor::new(&[0.0f32, 0.0], &dev).unwrap(),
        );
        map.insert(
            "layers.1.weight".to_string(),
            Tensor::new(&[[-4.0f32, 0.0], [4.0, 0.0]], &dev).unwrap(),
        );
        map.insert(
            "layers.1.bias".to_string(),
            Tensor::new(&[0.0f32, 0.0], &dev).unwrap(),
        );
        map
    }

    #[test]
    fn test_forward_prefers_expected_class() {
        let mlp = MlpClassifier::from_tensors(tensors(), 2, 2, 3).unwrap();
        assert_eq!(mlp.predict_index(&[1.0, 0.0, 0.0]).unwrap(), 1);

        let distribution = mlp.predict_distribution(&[1.0, 0.0, 0.0]).unwrap();
        assert_eq!(distribution.len(), 2);
        assert!((distribution.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(distribution[1] > 0.99);
    }

    #[test]
    fn test_relu_clamps_hidden_layer() {
        // Negative first input is zeroed by ReLU, so both logits are 0.
        let mlp = MlpClassifier::from_tensors(tensors(), 2, 2, 3).unwrap();
        let distribution = mlp.predict_distribution(&[-3.0, 0.0, 0.0]).unwrap();
        assert!((distribution[0] - 0.5).abs() < 1e-6);
        assert_eq!(mlp.predict_index(&[-3.0, 0.0, 0.0]).unwrap(), 0);
    }

    #[test]
    fn test_missing_layer() {
        let err = MlpClassifier::from_tensors(tensors(), 3, 2, 3).unwrap_err();
        assert!(err.to_string().contains("layers.2.weight"));
    }

    #[test]
    fn test_shape_mismatch() {
        assert!(MlpClassifier::from_tensors(tensors(), 2, 2, 4).is_err());
        assert!(MlpClassifier::from_tensors(tensors(), 2, 3, 3).is_err());
    }

    #[test]
    fn test_wrong_input_length() {
        let mlp = MlpClassifier::from_tensors(tensors(), 2, 2, 3).unwrap();
        assert!(mlp.predict_distribution(&[1.0]).is_err());
    }
}
