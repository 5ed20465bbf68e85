use crate::collector::SignalCollector;
use crate::config::{ConfigError, VerificationConfig};
use crate::gate::{Gate, GateError, GateState, SubmitDecision};
use crate::scorer::{CumulativeMetrics, FaceObservation, LiveStats, Scorer, TickReport};
use crate::verdict::VerificationVerdict;

/// Collector, scorer and gate for one form-fill session. Synchronous; the
/// caller owns the timer and the camera.
pub struct VerificationEngine {
    collector: SignalCollector,
    scorer: Scorer,
    gate: Gate,
}

impl VerificationEngine {
    pub fn new(config: VerificationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            collector: SignalCollector::new(config.pointer_buffer_capacity),
            gate: Gate::new(config.min_checks_required, config.min_net_score),
            scorer: Scorer::new(config),
        })
    }

    pub fn config(&self) -> &VerificationConfig {
        self.scorer.config()
    }

    pub fn on_pointer_move(&mut self, x: f64, y: f64, timestamp_ms: f64, trusted: bool) {
        self.collector.on_pointer_move(x, y, timestamp_ms, trusted);
    }

    /// Runs one sampling tick. Returns `None` while sampling is paused
    /// (awaiting confirmation or finalized); pointer input keeps buffering.
    pub fn tick(&mut self, observation: &FaceObservation) -> Option<TickReport> {
        if !self.gate.is_sampling() {
            return None;
        }
        let interval = self.collector.reset_interval();
        let report = self.scorer.score_tick(observation, &interval);
        self.gate.on_tick(report.detection_completed);
        Some(report)
    }

    pub fn next_delay_ms(&self, unit: f64) -> u64 {
        self.config().jittered_delay_ms(unit)
    }

    pub fn submit(&mut self) -> Result<SubmitDecision, GateError> {
        let stats = self.scorer.stats();
        self.gate.request_submit(&stats)
    }

    pub fn cancel(&mut self) -> Result<(), GateError> {
        self.gate.cancel()
    }

    pub fn confirm(&self) -> Result<VerificationVerdict, GateError> {
        self.gate.confirm()
    }

    pub fn finalize_succeeded(&mut self) -> Result<(), GateError> {
        self.gate.finalize_succeeded()
    }

    pub fn finalize_failed(&mut self, message: impl Into<String>) -> Result<(), GateError> {
        self.gate.finalize_failed(message)
    }

    pub fn stats(&self) -> LiveStats {
        self.scorer.stats()
    }

    pub fn state(&self) -> GateState {
        self.gate.state()
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn metrics(&self) -> &CumulativeMetrics {
        self.scorer.metrics()
    }

    pub fn submit_enabled(&self) -> bool {
        self.gate.submit_enabled(&self.scorer.stats())
    }

    pub fn inputs_enabled(&self) -> bool {
        self.gate.inputs_enabled()
    }

    pub fn is_sampling(&self) -> bool {
        self.gate.is_sampling()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::FaceDetection;

    fn engine() -> VerificationEngine {
        VerificationEngine::new(VerificationConfig::default()).unwrap()
    }

    fn move_like_human(engine: &mut VerificationEngine, start_ms: f64) {
        for i in 0..10 {
            engine.on_pointer_move(100.0 + i as f64 * 3.0, 200.0, start_ms + i as f64 * 10.0, true);
        }
    }

    fn face(confidence: f64) -> FaceObservation {
        FaceObservation::Detections(vec![FaceDetection { confidence }])
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = VerificationConfig {
            min_net_score: 101,
            ..VerificationConfig::default()
        };
        assert!(VerificationEngine::new(config).is_err());
    }

    #[test]
    fn test_checks_increase_by_one_per_tick() {
        let mut engine = engine();
        for expected in 1..=8 {
            let report = engine.tick(&FaceObservation::DetectorFailed).unwrap();
            assert_eq!(report.stats.checks, expected);
        }
    }

    #[test]
    fn test_scripted_fill_is_blocked() {
        let mut engine = engine();
        assert_eq!(engine.state(), GateState::Initializing);
        for _ in 0..5 {
            engine.tick(&FaceObservation::Detections(vec![])).unwrap();
        }
        assert_eq!(engine.stats().overall_score, 0);
        assert!(engine.submit_enabled());
        assert_eq!(
            engine.submit().unwrap(),
            SubmitDecision::ScoreTooLow { score: 0, required: 70 }
        );
        assert_eq!(engine.state(), GateState::ScoreTooLow);
        // sampling keeps going after a rejection
        assert!(engine.tick(&FaceObservation::Detections(vec![])).is_some());
    }

    #[test]
    fn test_plausible_human_confirms() {
        let mut engine = engine();
        for tick in 0..5 {
            move_like_human(&mut engine, tick as f64 * 6000.0);
            engine.tick(&face(0.92)).unwrap();
        }
        let decision = engine.submit().unwrap();
        let verdict = VerificationVerdict { net_score: 95, passed: true };
        assert_eq!(decision, SubmitDecision::AwaitingConfirmation(verdict));
        assert_eq!(engine.confirm().unwrap(), verdict);

        // frozen while the dialog is open
        assert!(engine.tick(&face(0.92)).is_none());
        assert_eq!(engine.stats().checks, 5);

        engine.finalize_succeeded().unwrap();
        assert_eq!(engine.state(), GateState::Finalized);
    }

    #[test]
    fn test_cancel_keeps_progress() {
        let mut engine = engine();
        for tick in 0..6 {
            move_like_human(&mut engine, tick as f64 * 6000.0);
            engine.tick(&face(0.9)).unwrap();
        }
        engine.submit().unwrap();
        engine.cancel().unwrap();
        assert_eq!(engine.state(), GateState::Monitoring);
        assert_eq!(engine.stats().checks, 6);
        assert_eq!(engine.metrics().ticks(), 6);
    }

    #[test]
    fn test_early_submit_is_non_fatal() {
        let mut engine = engine();
        engine.tick(&face(0.95)).unwrap();
        assert_eq!(
            engine.submit().unwrap(),
            SubmitDecision::InsufficientChecks { checks: 1, required: 5 }
        );
        engine.cancel().unwrap();
        assert_eq!(engine.stats().checks, 1);
        assert_eq!(engine.state(), GateState::Monitoring);
    }

    #[test]
    fn test_frameless_ticks_do_not_unlock() {
        let mut engine = engine();
        for _ in 0..3 {
            engine.tick(&FaceObservation::FrameNotReady).unwrap();
        }
        assert_eq!(engine.state(), GateState::Initializing);
        assert!(!engine.inputs_enabled());
        engine.tick(&FaceObservation::Detections(vec![])).unwrap();
        assert_eq!(engine.state(), GateState::Monitoring);
        assert_eq!(engine.stats().checks, 4);
    }

    #[test]
    fn test_failed_inference_does_not_unlock() {
        let mut engine = engine();
        for _ in 0..3 {
            engine.tick(&FaceObservation::DetectorFailed).unwrap();
        }
        assert_eq!(engine.state(), GateState::Initializing);
        assert!(!engine.inputs_enabled());
        assert_eq!(engine.stats().checks, 3);

        engine.tick(&face(0.9)).unwrap();
        assert_eq!(engine.state(), GateState::Monitoring);
    }
}
