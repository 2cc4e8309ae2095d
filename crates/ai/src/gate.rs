use serde::{Deserialize, Serialize};

use crate::result::AiError;

/// The order features the gate looks at.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCandidate {
    pub quantity: f64,
    pub total_price: f64,
    /// Expected unit price (e.g. the item's catalogue cost), if known.
    pub reference_price: Option<f64>,
}

/// Gate outcome with a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    pub anomalous: bool,
    /// Model-specific; >= 1.0 means at or beyond the flagging threshold.
    pub severity: f64,
    pub explanation: String,
}

impl AnomalyVerdict {
    pub fn normal(explanation: impl Into<String>) -> Self {
        Self {
            anomalous: false,
            severity: 0.0,
            explanation: explanation.into(),
        }
    }

    pub fn flagged(severity: f64, explanation: impl Into<String>) -> Self {
        Self {
            anomalous: true,
            severity,
            explanation: explanation.into(),
        }
    }
}

/// Fraud/error check consulted before an order is committed.
///
/// Errors are collaborator faults; callers treat them fail-open.
pub trait AnomalyGate: Send + Sync {
    fn assess(&self, candidate: &OrderCandidate) -> Result<AnomalyVerdict, AiError>;

    fn is_anomaly(
        &self,
        quantity: f64,
        total_price: f64,
        reference_price: Option<f64>,
    ) -> Result<bool, AiError> {
        self.assess(&OrderCandidate {
            quantity,
            total_price,
            reference_price,
        })
        .map(|v| v.anomalous)
    }
}

impl<G> AnomalyGate for std::sync::Arc<G>
where
    G: AnomalyGate + ?Sized,
{
    fn assess(&self, candidate: &OrderCandidate) -> Result<AnomalyVerdict, AiError> {
        (**self).assess(candidate)
    }
}

/// Gate that approves everything.
#[derive(Debug, Default, Copy, Clone)]
pub struct PassThroughGate;

impl AnomalyGate for PassThroughGate {
    fn assess(&self, _candidate: &OrderCandidate) -> Result<AnomalyVerdict, AiError> {
        Ok(AnomalyVerdict::normal("gate disabled"))
    }
}
