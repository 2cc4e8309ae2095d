use serde::{Deserialize, Serialize};

use crate::gate::{AnomalyGate, AnomalyVerdict, OrderCandidate};
use crate::result::AiError;

/// One historical order used as training data.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSample {
    pub quantity: f64,
    pub total_price: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
struct Baseline {
    samples: usize,
    quantity_mean: f64,
    quantity_std: f64,
    price_mean: f64,
    price_std: f64,
}

/// Deterministic anomaly detector for purchase orders.
///
/// Model:
/// - Learn mean and sample stddev of quantity and total price from history.
/// - Flag an order whose quantity or total price sits more than `z_threshold`
///   deviations *above* the baseline (small orders are never suspicious).
/// - Independently, flag an order whose unit price exceeds the reference
///   price by more than `max_price_ratio`.
///
/// With fewer than `min_samples` history rows the detector is untrained and
/// only the price-ratio rule applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAnomalyDetector {
    min_samples: usize,
    z_threshold: f64,
    max_price_ratio: f64,
    baseline: Option<Baseline>,
}

impl Default for OrderAnomalyDetector {
    fn default() -> Self {
        Self {
            min_samples: 10,
            z_threshold: 3.0,
            max_price_ratio: 2.0,
            baseline: None,
        }
    }
}

impl OrderAnomalyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn with_z_threshold(mut self, z_threshold: f64) -> Self {
        self.z_threshold = z_threshold;
        self
    }

    pub fn with_max_price_ratio(mut self, ratio: f64) -> Self {
        self.max_price_ratio = ratio;
        self
    }

    pub fn is_trained(&self) -> bool {
        self.baseline.is_some()
    }

    /// Fit the baseline from `history`. Too little history leaves the
    /// detector untrained; that is not an error.
    pub fn train(&mut self, history: &[OrderSample]) -> Result<(), AiError> {
        if !(self.z_threshold.is_finite() && self.z_threshold > 0.0) {
            return Err(AiError::InvalidInput(
                "z_threshold must be a finite positive number".to_string(),
            ));
        }
        if !(self.max_price_ratio.is_finite() && self.max_price_ratio > 1.0) {
            return Err(AiError::InvalidInput(
                "max_price_ratio must be a finite number above 1".to_string(),
            ));
        }
        if history
            .iter()
            .any(|s| !(s.quantity.is_finite() && s.total_price.is_finite()))
        {
            return Err(AiError::InvalidInput("history contains non-finite values".to_string()));
        }

        if history.len() < self.min_samples.max(2) {
            self.baseline = None;
            tracing::debug!(samples = history.len(), "anomaly detector left untrained");
            return Ok(());
        }

        let quantities: Vec<f64> = history.iter().map(|s| s.quantity).collect();
        let prices: Vec<f64> = history.iter().map(|s| s.total_price).collect();
        let quantity_mean = mean(&quantities);
        let price_mean = mean(&prices);

        self.baseline = Some(Baseline {
            samples: history.len(),
            quantity_mean,
            quantity_std: stddev_sample(&quantities, quantity_mean),
            price_mean,
            price_std: stddev_sample(&prices, price_mean),
        });
        tracing::debug!(samples = history.len(), "anomaly detector trained");
        Ok(())
    }

    fn score(&self, candidate: &OrderCandidate) -> AnomalyVerdict {
        if let Some(reference) = candidate.reference_price.filter(|r| *r > 0.0) {
            if candidate.quantity > 0.0 {
                let unit = candidate.total_price / candidate.quantity;
                let ratio = unit / reference;
                if ratio > self.max_price_ratio {
                    return AnomalyVerdict::flagged(
                        ratio / self.max_price_ratio,
                        format!(
                            "unit price {unit:.2} is {ratio:.2}x the reference {reference:.2} (limit {:.2}x)",
                            self.max_price_ratio
                        ),
                    );
                }
            }
        }

        let Some(b) = self.baseline else {
            return AnomalyVerdict::normal("detector untrained; price check passed");
        };

        let zq = upper_z(candidate.quantity, b.quantity_mean, b.quantity_std);
        let zp = upper_z(candidate.total_price, b.price_mean, b.price_std);
        let z = zq.max(zp);

        if z < self.z_threshold {
            return AnomalyVerdict {
                anomalous: false,
                severity: z.max(0.0) / self.z_threshold,
                explanation: format!("within baseline of {} orders (z={z:.2})", b.samples),
            };
        }

        let (what, value, m, s) = if zq >= zp {
            ("quantity", candidate.quantity, b.quantity_mean, b.quantity_std)
        } else {
            ("total price", candidate.total_price, b.price_mean, b.price_std)
        };
        AnomalyVerdict::flagged(
            z / self.z_threshold,
            format!(
                "{what} {value:.2}; baseline mean={m:.2}, std={s:.2}, z={z:.2} (threshold={:.2})",
                self.z_threshold
            ),
        )
    }
}

impl AnomalyGate for OrderAnomalyDetector {
    fn assess(&self, candidate: &OrderCandidate) -> Result<AnomalyVerdict, AiError> {
        if !(candidate.quantity.is_finite() && candidate.total_price.is_finite()) {
            return Err(AiError::InvalidInput("order features must be finite".to_string()));
        }
        Ok(self.score(candidate))
    }
}

/// One-sided z-score. A constant baseline gets a 10% relative spread so
/// that identical history does not flag every deviation.
fn upper_z(value: f64, mean: f64, std: f64) -> f64 {
    let spread = std.max(mean.abs() * 0.1).max(f64::EPSILON);
    (value - mean) / spread
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / (xs.len() as f64)
}

/// Sample standard deviation (n-1), deterministic.
fn stddev_sample(xs: &[f64], mean: f64) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let var = xs
        .iter()
        .map(|x| {
            let d = x - mean;
            d * d
        })
        .sum::<f64>()
        / ((xs.len() - 1) as f64);
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn history(n: usize) -> Vec<OrderSample> {
        (0..n)
            .map(|i| {
                let q = 40.0 + (i % 5) as f64 * 5.0;
                OrderSample {
                    quantity: q,
                    total_price: q * 10.0,
                }
            })
            .collect()
    }

    fn trained() -> OrderAnomalyDetector {
        let mut d = OrderAnomalyDetector::new();
        d.train(&history(50)).unwrap();
        d
    }

    #[test]
    fn small_history_leaves_detector_untrained() {
        let mut d = OrderAnomalyDetector::new();
        d.train(&history(9)).unwrap();
        assert!(!d.is_trained());
        assert!(!d.is_anomaly(1_000_000.0, 1e9, None).unwrap());
    }

    #[test]
    fn typical_order_passes() {
        assert!(!trained().is_anomaly(50.0, 500.0, Some(10.0)).unwrap());
    }

    #[test]
    fn huge_quantity_is_flagged() {
        let v = trained()
            .assess(&OrderCandidate {
                quantity: 5_000.0,
                total_price: 50_000.0,
                reference_price: Some(10.0),
            })
            .unwrap();
        assert!(v.anomalous);
        assert!(v.severity >= 1.0);
    }

    #[test]
    fn small_orders_are_not_suspicious() {
        assert!(!trained().is_anomaly(1.0, 10.0, Some(10.0)).unwrap());
    }

    #[test]
    fn inflated_unit_price_is_flagged_even_untrained() {
        let d = OrderAnomalyDetector::new();
        let v = d
            .assess(&OrderCandidate {
                quantity: 10.0,
                total_price: 250.0,
                reference_price: Some(10.0),
            })
            .unwrap();
        assert!(v.anomalous);
        assert!(v.explanation.contains("reference"));
    }

    #[test]
    fn expedite_premium_is_within_price_ratio() {
        let d = OrderAnomalyDetector::new();
        assert!(!d.is_anomaly(10.0, 150.0, Some(10.0)).unwrap());
    }

    #[test]
    fn non_finite_input_is_rejected() {
        assert!(matches!(
            trained().is_anomaly(f64::NAN, 1.0, None),
            Err(AiError::InvalidInput(_))
        ));

        let mut d = OrderAnomalyDetector::new();
        let mut h = history(20);
        h[3].total_price = f64::INFINITY;
        assert!(d.train(&h).is_err());
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let mut d = OrderAnomalyDetector::new().with_z_threshold(0.0);
        assert!(matches!(d.train(&history(20)), Err(AiError::InvalidInput(_))));
    }

    #[test]
    fn constant_history_tolerates_small_deviation() {
        let mut d = OrderAnomalyDetector::new();
        let flat: Vec<OrderSample> = (0..20)
            .map(|_| OrderSample {
                quantity: 100.0,
                total_price: 1_000.0,
            })
            .collect();
        d.train(&flat).unwrap();
        assert!(!d.is_anomaly(110.0, 1_100.0, None).unwrap());
        assert!(d.is_anomaly(200.0, 2_000.0, None).unwrap());
    }

    proptest! {
        #[test]
        fn untrained_detector_never_flags_fair_prices(qty in 1.0f64..10_000.0, unit in 0.5f64..19.5) {
            let d = OrderAnomalyDetector::new();
            // reference 10, ratio limit 2 → 20 per unit still passes
            prop_assert!(!d.is_anomaly(qty, qty * unit, Some(10.0)).unwrap());
        }
    }
}
