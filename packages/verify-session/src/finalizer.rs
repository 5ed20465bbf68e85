use human_verify_wasm::VerificationVerdict;
use tracing::{info, warn};

use crate::api::{FormApi, Submission, SubmissionReceipt};
use crate::error::SessionError;
use crate::form::Answer;

/// Sends the confirmed verdict with the answers. One request per call, no
/// retries, no camera access; teardown belongs to the session.
pub struct Finalizer<A> {
    api: A,
}

impl<A: FormApi> Finalizer<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn finalize(
        &self,
        form_id: &str,
        answers: &[Answer],
        verdict: VerificationVerdict,
    ) -> Result<SubmissionReceipt, SessionError> {
        let submission = Submission {
            answers,
            verification: verdict,
        };

        match self.api.submit_response(form_id, &submission).await {
            Ok(receipt) => {
                info!(
                    form_id,
                    net_score = verdict.net_score,
                    passed = verdict.passed,
                    status = receipt.status,
                    "response submitted"
                );
                Ok(receipt)
            }
            Err(err) => {
                warn!(form_id, error = %err, "response submission failed");
                Err(err)
            }
        }
    }
}
