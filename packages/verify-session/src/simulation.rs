//! Scripted camera, detector and pointer input for running a session without
//! hardware. Used by the `pohw-session` binary and by the tests.

use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use human_verify_wasm::{FaceDetection, SubmitDecision, VerificationConfig, VerificationVerdict};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::info;

use crate::api::{FormApi, SubmissionReceipt};
use crate::devices::{CameraError, CameraSource, DetectionError, FaceDetector, Frame, VideoStream};
use crate::error::SessionError;
use crate::form::{Answer, FormDefinition, QuestionType};
use crate::session::VerificationSession;

/// Shared counters so a caller can see what the session did to its devices
/// after handing them over.
#[derive(Debug, Clone, Default)]
pub struct DeviceCounters {
    opened: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
    detections: Arc<AtomicUsize>,
}

impl DeviceCounters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of `stop_tracks` calls, including repeats.
    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn detections(&self) -> usize {
        self.detections.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedCamera {
    deny: bool,
    blank_frames: u32,
    counters: DeviceCounters,
}

impl ScriptedCamera {
    pub fn new() -> Self {
        Self {
            deny: false,
            blank_frames: 0,
            counters: DeviceCounters::default(),
        }
    }

    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new()
        }
    }

    /// The first `count` ticks see no decoded frame.
    pub fn with_blank_frames(mut self, count: u32) -> Self {
        self.blank_frames = count;
        self
    }

    pub fn counters(&self) -> DeviceCounters {
        self.counters.clone()
    }
}

impl Default for ScriptedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSource for ScriptedCamera {
    type Stream = ScriptedStream;

    async fn open(&mut self) -> Result<ScriptedStream, CameraError> {
        if self.deny {
            return Err(CameraError::PermissionDenied);
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedStream {
            blank_remaining: self.blank_frames,
            sequence: 0,
            live: true,
            counters: self.counters.clone(),
        })
    }
}

#[derive(Debug)]
pub struct ScriptedStream {
    blank_remaining: u32,
    sequence: u64,
    live: bool,
    counters: DeviceCounters,
}

impl VideoStream for ScriptedStream {
    fn current_frame(&mut self) -> Option<Frame> {
        if !self.live {
            return None;
        }
        if self.blank_remaining > 0 {
            self.blank_remaining -= 1;
            return None;
        }
        self.sequence += 1;
        Some(Frame {
            width: 640,
            height: 480,
            sequence: self.sequence,
            pixels: Vec::new(),
        })
    }

    fn stop_tracks(&mut self) {
        self.live = false;
        self.counters.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorOutcome {
    Face(f64),
    NoFace,
    Fail,
}

/// Replays `outcomes` in a loop, one per detection call.
#[derive(Debug, Clone)]
pub struct ScriptedDetector {
    outcomes: Vec<DetectorOutcome>,
    cursor: usize,
    load_error: Option<String>,
    counters: DeviceCounters,
}

impl ScriptedDetector {
    pub fn cycle(outcomes: Vec<DetectorOutcome>) -> Self {
        Self {
            outcomes,
            cursor: 0,
            load_error: None,
            counters: DeviceCounters::default(),
        }
    }

    pub fn constant(confidence: f64) -> Self {
        Self::cycle(vec![DetectorOutcome::Face(confidence)])
    }

    pub fn no_face() -> Self {
        Self::cycle(vec![DetectorOutcome::NoFace])
    }

    pub fn failing() -> Self {
        Self::cycle(vec![DetectorOutcome::Fail])
    }

    pub fn unloadable(reason: impl Into<String>) -> Self {
        Self {
            load_error: Some(reason.into()),
            ..Self::no_face()
        }
    }

    pub fn counters(&self) -> DeviceCounters {
        self.counters.clone()
    }
}

impl FaceDetector for ScriptedDetector {
    async fn warm_up(&mut self) -> Result<(), DetectionError> {
        match &self.load_error {
            Some(reason) => Err(DetectionError::ModelLoad(reason.clone())),
            None => Ok(()),
        }
    }

    async fn detect_faces(&mut self, _frame: &Frame) -> Result<Vec<FaceDetection>, DetectionError> {
        self.counters.detections.fetch_add(1, Ordering::SeqCst);
        let outcome = match self.outcomes.len() {
            0 => DetectorOutcome::NoFace,
            len => self.outcomes[self.cursor % len],
        };
        self.cursor += 1;

        match outcome {
            DetectorOutcome::Face(confidence) => Ok(vec![FaceDetection { confidence }]),
            DetectorOutcome::NoFace => Ok(Vec::new()),
            DetectorOutcome::Fail => Err(DetectionError::Inference("scripted failure".into())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerMove {
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: f64,
    pub trusted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerProfile {
    /// Wandering movement at roughly `speed` px/s.
    Human { speed: f64 },
    /// Instant jumps across the page from synthetic events.
    Teleport,
    Idle,
}

const MOVE_STEP_MS: f64 = 16.0;
const MOVES_PER_INTERVAL: usize = 12;

impl PointerProfile {
    /// Pointer events for one sampling interval starting at `start_ms`.
    pub fn interval_moves(&self, start_ms: f64, rng: &mut impl Rng) -> Vec<PointerMove> {
        match *self {
            PointerProfile::Human { speed } => {
                let step = speed * MOVE_STEP_MS / 1000.0;
                let mut heading: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
                let (mut x, mut y) = (rng.gen_range(200.0..600.0), rng.gen_range(150.0..450.0));
                (0..MOVES_PER_INTERVAL)
                    .map(|i| {
                        heading += rng.gen_range(-0.3..0.3);
                        x += step * heading.cos();
                        y += step * heading.sin();
                        PointerMove {
                            x,
                            y,
                            timestamp_ms: start_ms + i as f64 * MOVE_STEP_MS,
                            trusted: true,
                        }
                    })
                    .collect()
            }
            PointerProfile::Teleport => (0..4)
                .map(|i| PointerMove {
                    x: if i % 2 == 0 { 0.0 } else { 1900.0 },
                    y: if i % 2 == 0 { 0.0 } else { 1000.0 },
                    timestamp_ms: start_ms + i as f64,
                    trusted: false,
                })
                .collect(),
            PointerProfile::Idle => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimProfile {
    Human,
    Bot,
    NoCamera,
}

impl FromStr for SimProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(SimProfile::Human),
            "bot" => Ok(SimProfile::Bot),
            "no-camera" | "nocamera" | "no_camera" => Ok(SimProfile::NoCamera),
            other => Err(format!("unknown simulation profile: {other}")),
        }
    }
}

impl SimProfile {
    pub fn devices(&self) -> (ScriptedCamera, ScriptedDetector, PointerProfile) {
        match self {
            SimProfile::Human => (
                ScriptedCamera::new().with_blank_frames(1),
                ScriptedDetector::constant(0.93),
                PointerProfile::Human { speed: 300.0 },
            ),
            // A fake video device feeds frames, but there is nobody in them.
            SimProfile::Bot => (
                ScriptedCamera::new(),
                ScriptedDetector::no_face(),
                PointerProfile::Human { speed: 300.0 },
            ),
            SimProfile::NoCamera => (
                ScriptedCamera::denied(),
                ScriptedDetector::no_face(),
                PointerProfile::Idle,
            ),
        }
    }
}

/// Fills every question with something that passes validation.
pub fn sample_answers(form: &FormDefinition) -> Vec<Answer> {
    form.questions
        .iter()
        .filter_map(|q| {
            let answer = match q.kind {
                QuestionType::Text => Answer::text(&q.id, "Simulated respondent"),
                QuestionType::Textarea => Answer::text(&q.id, "Answered during a simulated session."),
                QuestionType::Email => Answer::text(&q.id, "respondent@example.com"),
                QuestionType::Number => Answer::text(&q.id, "42"),
                QuestionType::File => Answer::text(&q.id, "upload.txt"),
                QuestionType::Select | QuestionType::Radio => Answer::text(&q.id, q.options.first()?),
                QuestionType::Checkbox => Answer::many(&q.id, q.options.first().cloned()),
            };
            Some(answer)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationOutcome {
    Submitted {
        verdict: VerificationVerdict,
        receipt: SubmissionReceipt,
    },
    Rejected {
        score: u32,
        checks: u32,
    },
    Interrupted,
}

/// Drives a whole session: pointer input every interval, submit as soon as
/// the button unlocks, confirm when the gate asks. Gives up after three
/// times the required checks.
pub async fn run_simulation<A: FormApi>(
    api: A,
    form_id: &str,
    profile: SimProfile,
    config: VerificationConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<SimulationOutcome, SessionError> {
    let (camera, detector, pointer) = profile.devices();
    let max_checks = config.min_checks_required.max(1).saturating_mul(3);

    let mut handle = VerificationSession::start(api, form_id, camera, detector, config).await?;
    let answers = sample_answers(handle.form());
    info!(form_id, questions = handle.form().questions.len(), ?profile, "simulation started");

    let mut rng = StdRng::from_entropy();
    let clock = Instant::now();
    tokio::pin!(shutdown);

    loop {
        let start_ms = clock.elapsed().as_secs_f64() * 1000.0;
        for m in pointer.interval_moves(start_ms, &mut rng) {
            handle.on_pointer_move(m.x, m.y, m.timestamp_ms, m.trusted);
        }

        let seen = handle.status().stats.checks;
        let status = tokio::select! {
            status = handle.wait_for(|s| s.stats.checks > seen) => status?,
            _ = &mut shutdown => {
                handle.teardown().await;
                return Ok(SimulationOutcome::Interrupted);
            }
        };
        info!(
            checks = status.stats.checks,
            score = status.stats.overall_score,
            face_rate = status.stats.face_detection_rate,
            "live stats"
        );

        if !status.submit_enabled {
            continue;
        }

        match handle.submit(answers.clone()).await? {
            SubmitDecision::AwaitingConfirmation(verdict) => {
                let receipt = handle.confirm().await?;
                return Ok(SimulationOutcome::Submitted { verdict, receipt });
            }
            SubmitDecision::ScoreTooLow { score, .. } if status.stats.checks >= max_checks => {
                handle.teardown().await;
                return Ok(SimulationOutcome::Rejected {
                    score,
                    checks: status.stats.checks,
                });
            }
            _ => {}
        }
    }
}
