use wasm_bindgen::prelude::*;

use crate::config::{ConfigError, VerificationConfig};
use crate::engine::VerificationEngine;
use crate::face::FaceDetection;
use crate::gate::{GateState, SubmitDecision};
use crate::scorer::{FaceObservation, LiveStats};
use crate::verdict::VerificationVerdict;

/// Browser-facing handle. JavaScript owns the camera, the detector model and
/// the `setTimeout` chain; this type owns everything else.
#[wasm_bindgen]
pub struct HumanVerifier {
    engine: VerificationEngine,
}

#[wasm_bindgen]
impl HumanVerifier {
    /// `config` is an optional partial `VerificationConfig` object;
    /// missing fields take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<HumanVerifier, JsError> {
        let config = if config.is_undefined() || config.is_null() {
            VerificationConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        Ok(Self::with_config(config)?)
    }

    #[wasm_bindgen]
    pub fn on_pointer_move(&mut self, x: f64, y: f64, timestamp: f64, is_trusted: bool) {
        self.engine.on_pointer_move(x, y, timestamp, is_trusted);
    }

    /// `confidences` holds one entry per detected face. Pass
    /// `frame_ready = false` when the video has no decoded frame yet and
    /// `detector_failed = true` when inference threw. Returns `undefined`
    /// when the tick was skipped because sampling is paused.
    #[wasm_bindgen]
    pub fn record_tick(
        &mut self,
        confidences: &[f64],
        frame_ready: bool,
        detector_failed: bool,
    ) -> Option<LiveStats> {
        let observation = if !frame_ready {
            FaceObservation::FrameNotReady
        } else if detector_failed {
            FaceObservation::DetectorFailed
        } else {
            FaceObservation::Detections(
                confidences.iter().map(|&confidence| FaceDetection { confidence }).collect(),
            )
        };
        self.engine.tick(&observation).map(|report| report.stats)
    }

    #[wasm_bindgen]
    pub fn next_delay_ms(&self) -> f64 {
        self.engine.next_delay_ms(js_sys::Math::random()) as f64
    }

    /// Returns the state the gate settled in after evaluating the click.
    #[wasm_bindgen]
    pub fn submit(&mut self) -> Result<GateState, JsError> {
        match self.engine.submit()? {
            SubmitDecision::InsufficientChecks { .. } => Ok(GateState::VerifyingInsufficient),
            SubmitDecision::ScoreTooLow { .. } => Ok(GateState::ScoreTooLow),
            SubmitDecision::AwaitingConfirmation(_) => Ok(GateState::AwaitingConfirmation),
        }
    }

    #[wasm_bindgen]
    pub fn cancel(&mut self) -> Result<(), JsError> {
        Ok(self.engine.cancel()?)
    }

    #[wasm_bindgen]
    pub fn confirm(&self) -> Result<VerificationVerdict, JsError> {
        Ok(self.engine.confirm()?)
    }

    #[wasm_bindgen]
    pub fn finalize_succeeded(&mut self) -> Result<(), JsError> {
        Ok(self.engine.finalize_succeeded()?)
    }

    #[wasm_bindgen]
    pub fn finalize_failed(&mut self, message: String) -> Result<(), JsError> {
        Ok(self.engine.finalize_failed(message)?)
    }

    #[wasm_bindgen]
    pub fn stats(&self) -> LiveStats {
        self.engine.stats()
    }

    #[wasm_bindgen]
    pub fn state(&self) -> GateState {
        self.engine.state()
    }

    #[wasm_bindgen]
    pub fn verdict(&self) -> Option<VerificationVerdict> {
        self.engine.gate().verdict()
    }

    #[wasm_bindgen]
    pub fn last_error(&self) -> Option<String> {
        self.engine.gate().last_error().map(str::to_string)
    }

    #[wasm_bindgen]
    pub fn submit_enabled(&self) -> bool {
        self.engine.submit_enabled()
    }

    #[wasm_bindgen]
    pub fn inputs_enabled(&self) -> bool {
        self.engine.inputs_enabled()
    }

    #[wasm_bindgen]
    pub fn is_sampling(&self) -> bool {
        self.engine.is_sampling()
    }
}

impl HumanVerifier {
    pub fn with_config(config: VerificationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            engine: VerificationEngine::new(config)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_human_tick(verifier: &mut HumanVerifier, start_ms: f64) -> Option<LiveStats> {
        for i in 0..10 {
            verifier.on_pointer_move(100.0 + i as f64 * 3.0, 200.0, start_ms + i as f64 * 10.0, true);
        }
        verifier.record_tick(&[0.95], true, false)
    }

    #[test]
    fn test_record_tick_reports_stats() {
        let mut verifier = HumanVerifier::with_config(VerificationConfig::default()).unwrap();
        let stats = sample_human_tick(&mut verifier, 0.0).unwrap();
        assert_eq!(stats.checks, 1);
        assert_eq!(verifier.state(), GateState::Monitoring);

        let stats = verifier.record_tick(&[], true, true).unwrap();
        assert_eq!(stats.checks, 2);
        assert_eq!(stats.face_detection_rate, 50);
    }

    #[test]
    fn test_record_tick_is_skipped_while_paused() {
        let mut verifier = HumanVerifier::with_config(VerificationConfig::default()).unwrap();
        for tick in 0..5 {
            assert!(sample_human_tick(&mut verifier, tick as f64 * 6000.0).is_some());
        }
        assert_eq!(verifier.submit().ok(), Some(GateState::AwaitingConfirmation));
        assert!(!verifier.is_sampling());

        assert_eq!(sample_human_tick(&mut verifier, 30_000.0), None);
        assert_eq!(verifier.stats().checks, 5);
    }
}
