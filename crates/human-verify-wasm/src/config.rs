use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MIN_CHECKS_REQUIRED: u32 = 5;
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 6_000;
pub const DEFAULT_CHECK_JITTER_MS: u64 = 1_000;
pub const DEFAULT_FACE_CONFIDENCE_THRESHOLD: f64 = 0.85;
pub const DEFAULT_MIN_NET_SCORE: u32 = 70;
pub const DEFAULT_POINTER_BUFFER_CAPACITY: usize = 50;
pub const MAX_CHECKS_REQUIRED: u32 = 1_000;

/// Pointer-velocity banding, in units (CSS px) per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MouseBand {
    pub min_velocity: f64,
    pub max_velocity: f64,
    pub reference_velocity: f64,
    pub out_of_band_score: f64,
}

impl Default for MouseBand {
    fn default() -> Self {
        Self {
            min_velocity: 5.0,
            max_velocity: 5_000.0,
            reference_velocity: 200.0,
            out_of_band_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreWeights {
    pub face: f64,
    pub mouse: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            face: 0.6,
            mouse: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationConfig {
    pub min_checks_required: u32,
    pub check_interval_ms: u64,
    pub check_jitter_ms: u64,
    pub face_confidence_threshold: f64,
    pub min_net_score: u32,
    pub pointer_buffer_capacity: usize,
    pub weights: ScoreWeights,
    pub mouse: MouseBand,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            min_checks_required: DEFAULT_MIN_CHECKS_REQUIRED,
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
            check_jitter_ms: DEFAULT_CHECK_JITTER_MS,
            face_confidence_threshold: DEFAULT_FACE_CONFIDENCE_THRESHOLD,
            min_net_score: DEFAULT_MIN_NET_SCORE,
            pointer_buffer_capacity: DEFAULT_POINTER_BUFFER_CAPACITY,
            weights: ScoreWeights::default(),
            mouse: MouseBand::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("checkJitterMs ({jitter}) must be smaller than checkIntervalMs ({interval})")]
    JitterTooLarge { jitter: u64, interval: u64 },
    #[error("mouse band is inverted: min {min} >= max {max}")]
    InvertedMouseBand { min: f64, max: f64 },
    #[error("score weights must sum to 1.0, got {0}")]
    WeightSum(f64),
}

impl VerificationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "faceConfidenceThreshold",
            self.face_confidence_threshold,
            0.0,
            1.0,
        )?;
        check_range("minNetScore", self.min_net_score as f64, 0.0, 100.0)?;
        check_range(
            "minChecksRequired",
            self.min_checks_required as f64,
            1.0,
            MAX_CHECKS_REQUIRED as f64,
        )?;
        check_range(
            "pointerBufferCapacity",
            self.pointer_buffer_capacity as f64,
            2.0,
            10_000.0,
        )?;
        check_range("checkIntervalMs", self.check_interval_ms as f64, 1.0, 600_000.0)?;
        check_range("weights.face", self.weights.face, 0.0, 1.0)?;
        check_range("weights.mouse", self.weights.mouse, 0.0, 1.0)?;
        check_range("mouse.outOfBandScore", self.mouse.out_of_band_score, 0.0, 1.0)?;

        if self.check_jitter_ms >= self.check_interval_ms {
            return Err(ConfigError::JitterTooLarge {
                jitter: self.check_jitter_ms,
                interval: self.check_interval_ms,
            });
        }

        let sum = self.weights.face + self.weights.mouse;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::WeightSum(sum));
        }

        check_range("mouse.minVelocity", self.mouse.min_velocity, 0.0, f64::MAX)?;
        check_range("mouse.maxVelocity", self.mouse.max_velocity, 0.0, f64::MAX)?;
        if self.mouse.min_velocity >= self.mouse.max_velocity {
            return Err(ConfigError::InvertedMouseBand {
                min: self.mouse.min_velocity,
                max: self.mouse.max_velocity,
            });
        }
        check_range(
            "mouse.referenceVelocity",
            self.mouse.reference_velocity,
            f64::MIN_POSITIVE,
            self.mouse.max_velocity,
        )?;

        Ok(())
    }

    /// Delay before the next tick. `unit` is a uniform sample in `[0, 1)`;
    /// it maps linearly onto `interval ± jitter`.
    pub fn jittered_delay_ms(&self, unit: f64) -> u64 {
        let unit = if unit.is_finite() { unit.clamp(0.0, 1.0) } else { 0.5 };
        let jitter = self.check_jitter_ms.min(self.check_interval_ms.saturating_sub(1)) as f64;
        let offset = (unit * 2.0 - 1.0) * jitter;
        (self.check_interval_ms as f64 + offset).round().max(1.0) as u64
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
