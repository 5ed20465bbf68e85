use serde::{Deserialize, Serialize};

/// One box reported by the face detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetectionSample {
    pub present: bool,
    pub confidence: f64,
}

impl FaceDetectionSample {
    pub const ABSENT: FaceDetectionSample = FaceDetectionSample {
        present: false,
        confidence: 0.0,
    };

    /// Keeps the most confident detection; low-confidence boxes count as absent.
    pub fn from_detections(detections: &[FaceDetection], threshold: f64) -> Self {
        let best = detections
            .iter()
            .map(|d| d.confidence)
            .filter(|c| c.is_finite())
            .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.max(c))));

        match best {
            Some(confidence) if confidence > threshold => Self {
                present: true,
                confidence: confidence.min(1.0),
            },
            _ => Self::ABSENT,
        }
    }

    /// Contribution to the rolling face score.
    pub fn score(&self) -> f64 {
        if self.present {
            self.confidence
        } else {
            0.0
        }
    }
}
