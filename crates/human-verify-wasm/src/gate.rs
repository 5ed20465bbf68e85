use serde::{Deserialize, Serialize};
use thiserror::Error;
use wasm_bindgen::prelude::*;

use crate::scorer::LiveStats;
use crate::verdict::VerificationVerdict;

#[wasm_bindgen]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    Initializing,
    Monitoring,
    Evaluating,
    VerifyingInsufficient,
    ScoreTooLow,
    AwaitingConfirmation,
    Finalized,
}

impl GateState {
    pub const fn as_str(self) -> &'static str {
        match self {
            GateState::Initializing => "INITIALIZING",
            GateState::Monitoring => "MONITORING",
            GateState::Evaluating => "EVALUATING",
            GateState::VerifyingInsufficient => "VERIFYING_INSUFFICIENT",
            GateState::ScoreTooLow => "SCORE_TOO_LOW",
            GateState::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            GateState::Finalized => "FINALIZED",
        }
    }

    /// States that show a notice or dialog the user can back out of.
    pub const fn is_reporting(self) -> bool {
        matches!(
            self,
            GateState::VerifyingInsufficient | GateState::ScoreTooLow | GateState::AwaitingConfirmation
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    pub from: GateState,
    pub to: GateState,
    pub reason: String,
}

/// Outcome of a submit click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitDecision {
    InsufficientChecks { checks: u32, required: u32 },
    ScoreTooLow { score: u32, required: u32 },
    AwaitingConfirmation(VerificationVerdict),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: GateState, to: GateState },
    #[error("{action} is not allowed while {state:?}")]
    NotAllowed { action: &'static str, state: GateState },
}

const HISTORY_LIMIT: usize = 100;

#[derive(Debug)]
pub struct Gate {
    current: GateState,
    min_checks_required: u32,
    min_net_score: u32,
    verdict: Option<VerificationVerdict>,
    last_error: Option<String>,
    history: Vec<StateTransition>,
}

impl Gate {
    pub fn new(min_checks_required: u32, min_net_score: u32) -> Self {
        Self {
            current: GateState::Initializing,
            min_checks_required,
            min_net_score,
            verdict: None,
            last_error: None,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> GateState {
        self.current
    }

    pub fn verdict(&self) -> Option<VerificationVerdict> {
        self.verdict
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    pub fn inputs_enabled(&self) -> bool {
        !matches!(self.current, GateState::Initializing | GateState::Finalized)
    }

    pub fn submit_enabled(&self, stats: &LiveStats) -> bool {
        matches!(
            self.current,
            GateState::Monitoring | GateState::ScoreTooLow | GateState::VerifyingInsufficient
        ) && stats.checks >= self.min_checks_required
    }

    /// Ticks keep running everywhere except while a frozen verdict waits
    /// for confirmation and after finalization.
    pub fn is_sampling(&self) -> bool {
        !matches!(
            self.current,
            GateState::AwaitingConfirmation | GateState::Finalized
        )
    }

    pub fn can_transition_to(&self, target: GateState) -> bool {
        matches!(
            (self.current, target),
            (GateState::Initializing, GateState::Monitoring)
                | (GateState::Monitoring, GateState::Evaluating)
                | (GateState::VerifyingInsufficient, GateState::Evaluating)
                | (GateState::ScoreTooLow, GateState::Evaluating)
                | (GateState::Evaluating, GateState::VerifyingInsufficient)
                | (GateState::Evaluating, GateState::ScoreTooLow)
                | (GateState::Evaluating, GateState::AwaitingConfirmation)
                | (GateState::VerifyingInsufficient, GateState::Monitoring)
                | (GateState::ScoreTooLow, GateState::Monitoring)
                | (GateState::AwaitingConfirmation, GateState::Monitoring)
                | (GateState::AwaitingConfirmation, GateState::Finalized)
        )
    }

    fn transition_to(&mut self, target: GateState, reason: impl Into<String>) -> Result<(), GateError> {
        if !self.can_transition_to(target) {
            return Err(GateError::InvalidTransition {
                from: self.current,
                to: target,
            });
        }

        self.history.push(StateTransition {
            from: self.current,
            to: target,
            reason: reason.into(),
        });
        self.current = target;

        if self.history.len() > HISTORY_LIMIT {
            let extra = self.history.len() - HISTORY_LIMIT;
            self.history.drain(0..extra);
        }

        Ok(())
    }

    /// Called after every tick. Unlocks the form on the first tick whose
    /// face detection completed; returns true only on that tick.
    pub fn on_tick(&mut self, detection_completed: bool) -> bool {
        if self.current == GateState::Initializing && detection_completed {
            return self.transition_to(GateState::Monitoring, "first detection completed").is_ok();
        }
        false
    }

    pub fn request_submit(&mut self, stats: &LiveStats) -> Result<SubmitDecision, GateError> {
        if !matches!(
            self.current,
            GateState::Monitoring | GateState::ScoreTooLow | GateState::VerifyingInsufficient
        ) {
            return Err(GateError::NotAllowed {
                action: "submit",
                state: self.current,
            });
        }

        self.transition_to(GateState::Evaluating, "submit requested")?;

        if stats.checks < self.min_checks_required {
            self.transition_to(
                GateState::VerifyingInsufficient,
                format!("{} of {} checks", stats.checks, self.min_checks_required),
            )?;
            return Ok(SubmitDecision::InsufficientChecks {
                checks: stats.checks,
                required: self.min_checks_required,
            });
        }

        if stats.overall_score < self.min_net_score {
            self.transition_to(
                GateState::ScoreTooLow,
                format!("score {} below {}", stats.overall_score, self.min_net_score),
            )?;
            return Ok(SubmitDecision::ScoreTooLow {
                score: stats.overall_score,
                required: self.min_net_score,
            });
        }

        let verdict = VerificationVerdict::from_score(stats.overall_score, self.min_net_score);
        self.transition_to(GateState::AwaitingConfirmation, "verdict snapshotted")?;
        self.verdict = Some(verdict);
        self.last_error = None;
        Ok(SubmitDecision::AwaitingConfirmation(verdict))
    }

    /// Backs out of a notice or the confirmation dialog. Never touches the
    /// collected metrics.
    pub fn cancel(&mut self) -> Result<(), GateError> {
        if !self.current.is_reporting() {
            return Err(GateError::NotAllowed {
                action: "cancel",
                state: self.current,
            });
        }
        self.transition_to(GateState::Monitoring, "dismissed")?;
        self.verdict = None;
        self.last_error = None;
        Ok(())
    }

    /// The verdict the user is confirming.
    pub fn confirm(&self) -> Result<VerificationVerdict, GateError> {
        match (self.current, self.verdict) {
            (GateState::AwaitingConfirmation, Some(verdict)) => Ok(verdict),
            _ => Err(GateError::NotAllowed {
                action: "confirm",
                state: self.current,
            }),
        }
    }

    pub fn finalize_succeeded(&mut self) -> Result<(), GateError> {
        self.transition_to(GateState::Finalized, "response accepted")?;
        self.last_error = None;
        Ok(())
    }

    /// Keeps the verdict so the user can retry without re-verifying.
    pub fn finalize_failed(&mut self, message: impl Into<String>) -> Result<(), GateError> {
        if self.current != GateState::AwaitingConfirmation {
            return Err(GateError::NotAllowed {
                action: "finalize",
                state: self.current,
            });
        }
        self.last_error = Some(message.into());
        Ok(())
    }
}
