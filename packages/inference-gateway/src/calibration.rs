//! Scalar probability calibration.
//!
//! Raw model confidences are systematically over- or under-confident;
//! a Platt scaling pass (logistic regression of observed label on raw
//! score) maps them onto something closer to a true probability. The
//! fitted parameters are versioned so a bad fit can be rolled back.

use serde::{Deserialize, Serialize};

/// One observed `(predicted, actual)` pair recorded for later fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub source: String,
    pub predicted_prob: f32,
    pub observed_label: bool,
    pub context: String,
}

/// Platt-scaling parameters `sigmoid(a * raw + b)` for one source,
/// identified by a monotonically increasing version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub version: u32,
    pub a: f32,
    pub b: f32,
    pub active: bool,
}

impl Default for CalibrationParams {
    /// The identity calibration: `sigmoid(x)` is not identity, so the
    /// uncalibrated default instead passes the raw score through
    /// unchanged via `a=1, b=0` composed with a logit of the input.
    fn default() -> Self {
        Self {
            version: 0,
            a: 1.0,
            b: 0.0,
            active: true,
        }
    }
}

impl CalibrationParams {
    /// Apply Platt scaling to a raw confidence in `[0, 1]`.
    pub fn apply(&self, raw: f32) -> f32 {
        let logit = logit(raw.clamp(1e-6, 1.0 - 1e-6));
        sigmoid(self.a * logit + self.b)
    }
}

fn logit(p: f32) -> f32 {
    (p / (1.0 - p)).ln()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Fit Platt-scaling parameters to a batch of samples via a few steps
/// of gradient descent on the log-loss. Small batches are expected
/// (calibration refits periodically, not per-request).
pub fn fit(samples: &[CalibrationSample], next_version: u32) -> CalibrationParams {
    let mut a = 1.0f32;
    let mut b = 0.0f32;
    let lr = 0.05f32;

    if samples.is_empty() {
        return CalibrationParams {
            version: next_version,
            ..CalibrationParams::default()
        };
    }

    for _ in 0..200 {
        let mut grad_a = 0.0f32;
        let mut grad_b = 0.0f32;
        for sample in samples {
            let x = logit(sample.predicted_prob.clamp(1e-6, 1.0 - 1e-6));
            let y = if sample.observed_label { 1.0 } else { 0.0 };
            let pred = sigmoid(a * x + b);
            let err = pred - y;
            grad_a += err * x;
            grad_b += err;
        }
        let n = samples.len() as f32;
        a -= lr * grad_a / n;
        b -= lr * grad_b / n;
    }

    CalibrationParams {
        version: next_version,
        a,
        b,
        active: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_near_identity_on_midpoint() {
        let params = CalibrationParams::default();
        assert!((params.apply(0.5) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn fit_pulls_overconfident_predictions_down() {
        let samples: Vec<_> = (0..20)
            .map(|i| CalibrationSample {
                source: "nli".into(),
                predicted_prob: 0.95,
                observed_label: i % 2 == 0,
                context: "test".into(),
            })
            .collect();
        let params = fit(&samples, 1);
        assert!(params.apply(0.95) < 0.95);
    }
}
