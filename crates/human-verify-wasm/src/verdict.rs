use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// `{netScore, passed}` as sent alongside the form answers. Snapshotted once
/// when the user is asked to confirm, never recomputed afterwards.
#[wasm_bindgen]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationVerdict {
    pub net_score: u32,
    pub passed: bool,
}

impl VerificationVerdict {
    pub fn from_score(net_score: u32, min_net_score: u32) -> Self {
        let net_score = net_score.min(100);
        Self {
            net_score,
            passed: net_score >= min_net_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(VerificationVerdict::from_score(70, 70).passed);
        assert!(!VerificationVerdict::from_score(69, 70).passed);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(VerificationVerdict::from_score(95, 70)).unwrap();
        assert_eq!(json, serde_json::json!({ "netScore": 95, "passed": true }));
    }
}
