use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::collector::SamplingInterval;
use crate::config::VerificationConfig;
use crate::face::{FaceDetection, FaceDetectionSample};
use crate::kinematics::{average_velocity, mouse_score};

/// What the detector produced for one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceObservation {
    Detections(Vec<FaceDetection>),
    /// The video element has not decoded a frame yet.
    FrameNotReady,
    DetectorFailed,
}

impl FaceObservation {
    pub fn frame_ready(&self) -> bool {
        !matches!(self, FaceObservation::FrameNotReady)
    }

    /// The detector ran to completion, with or without faces.
    pub fn detection_completed(&self) -> bool {
        matches!(self, FaceObservation::Detections(_))
    }
}

/// Session-wide history. Both sequences always have one entry per tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeMetrics {
    face_detections: Vec<FaceDetectionSample>,
    mouse_velocities: Vec<f64>,
}

impl CumulativeMetrics {
    /// Appends one tick. The only mutation path, so the two sequences can
    /// never drift apart.
    pub fn record(&mut self, sample: FaceDetectionSample, velocity: f64) {
        let velocity = if velocity.is_finite() { velocity.max(0.0) } else { 0.0 };
        self.face_detections.push(sample);
        self.mouse_velocities.push(velocity);
    }

    pub fn ticks(&self) -> usize {
        self.face_detections.len()
    }

    pub fn face_detections(&self) -> &[FaceDetectionSample] {
        &self.face_detections
    }

    pub fn mouse_velocities(&self) -> &[f64] {
        &self.mouse_velocities
    }

    pub fn latest_velocity(&self) -> Option<f64> {
        self.mouse_velocities.last().copied()
    }

    /// Mean confidence over every tick; absent ticks contribute 0.
    pub fn face_score(&self) -> f64 {
        if self.face_detections.is_empty() {
            return 0.0;
        }
        let total: f64 = self.face_detections.iter().map(FaceDetectionSample::score).sum();
        total / self.face_detections.len() as f64
    }

    pub fn face_detection_rate(&self) -> u32 {
        if self.face_detections.is_empty() {
            return 0;
        }
        let present = self.face_detections.iter().filter(|s| s.present).count();
        ((present as f64 / self.face_detections.len() as f64) * 100.0).round() as u32
    }
}

#[wasm_bindgen]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    pub checks: u32,
    pub overall_score: u32,
    pub face_detection_rate: u32,
    pub avg_mouse_activity: u32,
    pub suspicious_events: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub sample: FaceDetectionSample,
    pub velocity: f64,
    pub frame_ready: bool,
    pub detection_completed: bool,
    pub stats: LiveStats,
}

pub struct Scorer {
    config: VerificationConfig,
    metrics: CumulativeMetrics,
    suspicious_events: u32,
    stats: LiveStats,
}

impl Scorer {
    pub fn new(config: VerificationConfig) -> Self {
        Self {
            config,
            metrics: CumulativeMetrics::default(),
            suspicious_events: 0,
            stats: LiveStats::default(),
        }
    }

    /// Folds one finished interval and one face observation into the
    /// cumulative metrics and recomputes the live stats.
    pub fn score_tick(&mut self, observation: &FaceObservation, interval: &SamplingInterval) -> TickReport {
        let sample = match observation {
            FaceObservation::Detections(detections) => {
                FaceDetectionSample::from_detections(detections, self.config.face_confidence_threshold)
            }
            FaceObservation::FrameNotReady | FaceObservation::DetectorFailed => FaceDetectionSample::ABSENT,
        };
        let velocity = average_velocity(&interval.positions);

        self.metrics.record(sample, velocity);
        self.suspicious_events = self
            .suspicious_events
            .saturating_add(interval.suspicious_event_count);
        self.stats = self.compute_stats();

        TickReport {
            sample,
            velocity,
            frame_ready: observation.frame_ready(),
            detection_completed: observation.detection_completed(),
            stats: self.stats,
        }
    }

    pub fn overall_score(&self) -> u32 {
        let Some(velocity) = self.metrics.latest_velocity() else {
            return 0;
        };
        let face = self.metrics.face_score();
        let mouse = mouse_score(velocity, &self.config.mouse);
        let blended = self.config.weights.face * face + self.config.weights.mouse * mouse;
        (blended * 100.0).round().clamp(0.0, 100.0) as u32
    }

    pub fn stats(&self) -> LiveStats {
        self.stats
    }

    pub fn metrics(&self) -> &CumulativeMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    fn compute_stats(&self) -> LiveStats {
        LiveStats {
            checks: self.metrics.ticks() as u32,
            overall_score: self.overall_score(),
            face_detection_rate: self.metrics.face_detection_rate(),
            avg_mouse_activity: self.metrics.latest_velocity().unwrap_or(0.0).round() as u32,
            suspicious_events: self.suspicious_events,
        }
    }
}
