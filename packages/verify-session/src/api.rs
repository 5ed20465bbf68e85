use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use human_verify_wasm::VerificationVerdict;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::SessionError;
use crate::form::{Answer, FormDefinition};

/// Body of `POST /form-responses/{formId}/submit`.
#[derive(Debug, Clone, Serialize)]
pub struct Submission<'a> {
    pub answers: &'a [Answer],
    pub verification: VerificationVerdict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub status: u16,
    pub message: Option<String>,
    pub response_id: Option<String>,
}

/// Form Data API + Form Response API.
pub trait FormApi: Send + Sync + 'static {
    fn fetch_form(&self, form_id: &str) -> impl Future<Output = Result<FormDefinition, SessionError>> + Send;

    fn submit_response(
        &self,
        form_id: &str,
        submission: &Submission<'_>,
    ) -> impl Future<Output = Result<SubmissionReceipt, SessionError>> + Send;
}

impl<T: FormApi> FormApi for Arc<T> {
    fn fetch_form(&self, form_id: &str) -> impl Future<Output = Result<FormDefinition, SessionError>> + Send {
        T::fetch_form(self, form_id)
    }

    fn submit_response(
        &self,
        form_id: &str,
        submission: &Submission<'_>,
    ) -> impl Future<Output = Result<SubmissionReceipt, SessionError>> + Send {
        T::submit_response(self, form_id, submission)
    }
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: Option<String>,
    response: Option<ResponseRef>,
}

#[derive(Debug, Deserialize)]
struct ResponseRef {
    #[serde(rename = "_id", alias = "id")]
    id: Option<String>,
}

#[derive(Clone)]
pub struct HttpFormApi {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpFormApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(err) => {
                warn!(error = %err, timeout_ms = timeout.as_millis() as u64, "HTTP client build failed, using defaults without timeout");
                reqwest::Client::new()
            }
        };

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            client,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_base.clone(), config.api_token.clone(), config.api_timeout)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl FormApi for HttpFormApi {
    async fn fetch_form(&self, form_id: &str) -> Result<FormDefinition, SessionError> {
        let url = format!("{}/forms/{}", self.base_url, form_id);
        debug!(%url, "fetching form");

        let resp = self.authorized(self.client.get(&url)).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            let message = error_message(status, &bytes);
            warn!(form_id, status = status.as_u16(), %message, "form fetch rejected");
            return Err(SessionError::FormUnavailable {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn submit_response(
        &self,
        form_id: &str,
        submission: &Submission<'_>,
    ) -> Result<SubmissionReceipt, SessionError> {
        let url = format!("{}/form-responses/{}/submit", self.base_url, form_id);
        let resp = self
            .authorized(self.client.post(&url))
            .json(submission)
            .send()
            .await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if status.is_success() {
            let body: Option<MessageBody> = serde_json::from_slice(&bytes).ok();
            let (message, response_id) = match body {
                Some(body) => (body.message, body.response.and_then(|r| r.id)),
                None => (None, None),
            };
            return Ok(SubmissionReceipt {
                status: status.as_u16(),
                message,
                response_id,
            });
        }

        let message = error_message(status, &bytes);
        if status == reqwest::StatusCode::CONFLICT {
            return Err(SessionError::AlreadySubmitted(message));
        }
        Err(SessionError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn error_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<MessageBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}
