use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use human_verify_wasm::{
    FaceObservation, GateState, LiveStats, SubmitDecision, VerificationConfig, VerificationEngine,
    VerificationVerdict,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::api::{FormApi, SubmissionReceipt};
use crate::devices::{CameraSource, FaceDetector, VideoStream};
use crate::error::SessionError;
use crate::finalizer::Finalizer;
use crate::form::{Answer, FormDefinition};

/// What the UI renders: gate state, live stats and whether inputs/submit
/// are usable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: GateState,
    pub stats: LiveStats,
    pub inputs_enabled: bool,
    pub submit_enabled: bool,
    pub verdict: Option<VerificationVerdict>,
    pub last_error: Option<String>,
    pub active: bool,
}

enum Command {
    PointerMove {
        x: f64,
        y: f64,
        timestamp_ms: f64,
        trusted: bool,
    },
    Submit {
        answers: Vec<Answer>,
        reply: oneshot::Sender<Result<SubmitDecision, SessionError>>,
    },
    Confirm {
        reply: oneshot::Sender<Result<SubmissionReceipt, SessionError>>,
    },
    Cancel {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Teardown {
        reply: oneshot::Sender<()>,
    },
}

/// The single task that owns the camera stream, the detector and the
/// engine for one form-fill session. Everything reaches it as a message, so
/// ticks and commands never interleave.
pub struct VerificationSession<A, S, D> {
    form_id: String,
    form: FormDefinition,
    engine: VerificationEngine,
    stream: Option<S>,
    detector: D,
    finalizer: Finalizer<A>,
    pending_answers: Vec<Answer>,
    rng: StdRng,
    next_tick: Option<Instant>,
    active: bool,
    status: watch::Sender<SessionStatus>,
}

impl<A, S, D> VerificationSession<A, S, D>
where
    A: FormApi,
    S: VideoStream + 'static,
    D: FaceDetector,
{
    /// Loads the form, opens the camera and warms up the detector, then
    /// starts sampling. Any failure here is fatal and leaves no camera open.
    pub async fn start<C>(
        api: A,
        form_id: impl Into<String>,
        mut camera: C,
        mut detector: D,
        config: VerificationConfig,
    ) -> Result<SessionHandle, SessionError>
    where
        C: CameraSource<Stream = S>,
    {
        let form_id = form_id.into();

        let form = api.fetch_form(&form_id).await?;
        if !form.is_active {
            warn!(form_id = %form_id, "form is inactive");
            return Err(SessionError::FormInactive);
        }

        let engine = VerificationEngine::new(config)?;

        let mut stream = camera.open().await.map_err(|err| {
            error!(form_id = %form_id, error = %err, "camera initialization failed");
            SessionError::from(err)
        })?;

        if let Err(err) = detector.warm_up().await {
            error!(form_id = %form_id, error = %err, "face model initialization failed");
            stream.stop_tracks();
            return Err(SessionError::ModelLoad(err));
        }

        let (status_tx, status_rx) = watch::channel(initial_status(&engine));
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let session = VerificationSession {
            form_id: form_id.clone(),
            form: form.clone(),
            engine,
            stream: Some(stream),
            detector,
            finalizer: Finalizer::new(api),
            pending_answers: Vec::new(),
            rng: StdRng::from_entropy(),
            next_tick: None,
            active: true,
            status: status_tx,
        };

        let task = tokio::spawn(session.run(command_rx));

        Ok(SessionHandle {
            form_id,
            form,
            commands: command_tx,
            status: status_rx,
            task: Some(task),
        })
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!(form_id = %self.form_id, "verification sampling started");
        self.schedule_next_tick();

        loop {
            let deadline = self.next_tick.filter(|_| self.engine.is_sampling());
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!(form_id = %self.form_id, "session handle dropped");
                        break;
                    };
                    if self.handle(command).await.is_break() {
                        break;
                    }
                }
                _ = wait_for_deadline(deadline) => {
                    self.tick().await;
                    self.schedule_next_tick();
                }
            }
        }

        self.teardown();
    }

    async fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::PointerMove {
                x,
                y,
                timestamp_ms,
                trusted,
            } => {
                self.engine.on_pointer_move(x, y, timestamp_ms, trusted);
            }
            Command::Submit { answers, reply } => {
                let result = self.submit(answers);
                self.publish();
                let _ = reply.send(result);
            }
            Command::Confirm { reply } => {
                let result = self.confirm().await;
                let done = result.is_ok();
                let _ = reply.send(result);
                if done {
                    return ControlFlow::Break(());
                }
            }
            Command::Cancel { reply } => {
                // Notices leave the running timer alone; only a dismissed
                // confirmation needs sampling restarted.
                let was_sampling = self.engine.is_sampling();
                let result = self.engine.cancel().map_err(SessionError::from);
                if result.is_ok() {
                    self.pending_answers.clear();
                    if !was_sampling || self.next_tick.is_none() {
                        self.schedule_next_tick();
                    }
                }
                self.publish();
                let _ = reply.send(result);
            }
            Command::Teardown { reply } => {
                self.teardown();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn tick(&mut self) {
        let frame = self.stream.as_mut().and_then(|stream| stream.current_frame());
        let observation = match frame {
            None => FaceObservation::FrameNotReady,
            Some(frame) => match self.detector.detect_faces(&frame).await {
                Ok(detections) => FaceObservation::Detections(detections),
                Err(err) => {
                    debug!(form_id = %self.form_id, error = %err, "face detection failed, scoring tick as absent");
                    FaceObservation::DetectorFailed
                }
            },
        };

        let was_initializing = self.engine.state() == GateState::Initializing;
        if let Some(report) = self.engine.tick(&observation) {
            debug!(
                checks = report.stats.checks,
                score = report.stats.overall_score,
                face_present = report.sample.present,
                velocity = report.velocity,
                "tick scored"
            );
            if was_initializing && self.engine.state() == GateState::Monitoring {
                info!(form_id = %self.form_id, "first detection completed, form unlocked");
            }
        }
        self.publish();
    }

    fn submit(&mut self, answers: Vec<Answer>) -> Result<SubmitDecision, SessionError> {
        self.form
            .validate_answers(&answers)
            .map_err(SessionError::InvalidAnswers)?;

        let decision = self.engine.submit()?;
        match decision {
            SubmitDecision::InsufficientChecks { checks, required } => {
                debug!(checks, required, "submit before enough checks");
            }
            SubmitDecision::ScoreTooLow { score, required } => {
                info!(form_id = %self.form_id, score, required, "submit rejected, score too low");
            }
            SubmitDecision::AwaitingConfirmation(verdict) => {
                info!(form_id = %self.form_id, net_score = verdict.net_score, "awaiting confirmation");
                self.pending_answers = answers;
            }
        }
        Ok(decision)
    }

    async fn confirm(&mut self) -> Result<SubmissionReceipt, SessionError> {
        let verdict = self.engine.confirm()?;

        match self
            .finalizer
            .finalize(&self.form_id, &self.pending_answers, verdict)
            .await
        {
            Ok(receipt) => {
                if let Err(err) = self.engine.finalize_succeeded() {
                    warn!(error = %err, "gate refused finalization");
                }
                self.teardown();
                Ok(receipt)
            }
            Err(err) => {
                if let Err(gate_err) = self.engine.finalize_failed(err.user_message()) {
                    warn!(error = %gate_err, "gate refused failure report");
                }
                self.publish();
                Err(err)
            }
        }
    }

    fn schedule_next_tick(&mut self) {
        let delay = self.engine.next_delay_ms(self.rng.gen::<f64>());
        self.next_tick = Some(Instant::now() + Duration::from_millis(delay));
    }

    /// Stops the timer and the camera together. Safe to call repeatedly.
    fn teardown(&mut self) {
        self.next_tick = None;
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            info!(form_id = %self.form_id, checks = self.engine.stats().checks, "camera tracks stopped");
        }
        if self.active {
            self.active = false;
            self.publish();
        }
    }

    fn publish(&self) {
        let mut status = initial_status(&self.engine);
        status.active = self.active;
        self.status.send_replace(status);
    }
}

fn initial_status(engine: &VerificationEngine) -> SessionStatus {
    SessionStatus {
        state: engine.state(),
        stats: engine.stats(),
        inputs_enabled: engine.inputs_enabled(),
        submit_enabled: engine.submit_enabled(),
        verdict: engine.gate().verdict(),
        last_error: engine.gate().last_error().map(str::to_string),
        active: true,
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// UI-side handle to a running session. Dropping it tears the session down.
pub struct SessionHandle {
    form_id: String,
    form: FormDefinition,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn form_id(&self) -> &str {
        &self.form_id
    }

    pub fn form(&self) -> &FormDefinition {
        &self.form
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionStatus) -> bool,
    ) -> Result<SessionStatus, SessionError> {
        let mut status = self.status.clone();
        let result = status.wait_for(predicate).await;
        result.map(|s| s.clone()).map_err(|_| SessionError::Closed)
    }

    /// Never blocks; events after teardown are dropped.
    pub fn on_pointer_move(&self, x: f64, y: f64, timestamp_ms: f64, trusted: bool) {
        let _ = self.commands.send(Command::PointerMove {
            x,
            y,
            timestamp_ms,
            trusted,
        });
    }

    pub async fn submit(&self, answers: Vec<Answer>) -> Result<SubmitDecision, SessionError> {
        self.request(|reply| Command::Submit { answers, reply }).await
    }

    pub async fn confirm(&self) -> Result<SubmissionReceipt, SessionError> {
        self.request(|reply| Command::Confirm { reply }).await
    }

    pub async fn cancel(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    /// Stops sampling and releases the camera. Idempotent.
    pub async fn teardown(&mut self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Teardown { reply }).is_ok() {
            let _ = done.await;
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(form_id = %self.form_id, error = %err, "session task ended abnormally");
            }
        }
    }

    fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, SessionError>>) -> Command,
    ) -> impl Future<Output = Result<T, SessionError>> {
        let (reply, response) = oneshot::channel();
        let sent = self.commands.send(make(reply));
        async move {
            sent.map_err(|_| SessionError::Closed)?;
            response.await.map_err(|_| SessionError::Closed)?
        }
    }
}
