#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use pohw_verify_session::form::{Answer, FormDefinition, Question, QuestionType};
use pohw_verify_session::{FormApi, SessionError, SessionHandle, Submission, SubmissionReceipt};
use serde_json::{json, Value};

pub fn signup_form() -> FormDefinition {
    FormDefinition {
        title: "Beta signup".into(),
        description: "Tell us about yourself".into(),
        questions: vec![
            Question {
                id: "q-name".into(),
                label: "Name".into(),
                kind: QuestionType::Text,
                required: true,
                options: Vec::new(),
            },
            Question {
                id: "q-email".into(),
                label: "Email".into(),
                kind: QuestionType::Email,
                required: true,
                options: Vec::new(),
            },
            Question {
                id: "q-plan".into(),
                label: "Plan".into(),
                kind: QuestionType::Radio,
                required: false,
                options: vec!["free".into(), "pro".into()],
            },
        ],
        is_active: true,
    }
}

pub fn signup_answers() -> Vec<Answer> {
    vec![
        Answer::text("q-name", "Ada Lovelace"),
        Answer::text("q-email", "ada@example.com"),
        Answer::text("q-plan", "pro"),
    ]
}

/// In-process form API. Submit failures are queued as HTTP statuses and
/// consumed one per call.
#[derive(Default)]
pub struct MemoryApi {
    form: Option<FormDefinition>,
    submit_failures: Mutex<VecDeque<u16>>,
    submissions: Mutex<Vec<Value>>,
}

impl MemoryApi {
    pub fn with_form(form: FormDefinition) -> Arc<Self> {
        Arc::new(Self {
            form: Some(form),
            ..Self::default()
        })
    }

    pub fn missing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_submit(&self, status: u16) {
        self.submit_failures.lock().unwrap().push_back(status);
    }

    /// Every request body, failed attempts included.
    pub fn submissions(&self) -> Vec<Value> {
        self.submissions.lock().unwrap().clone()
    }
}

impl FormApi for MemoryApi {
    async fn fetch_form(&self, _form_id: &str) -> Result<FormDefinition, SessionError> {
        self.form.clone().ok_or_else(|| SessionError::FormUnavailable {
            status: 404,
            message: "Form not found".into(),
        })
    }

    async fn submit_response(
        &self,
        _form_id: &str,
        submission: &Submission<'_>,
    ) -> Result<SubmissionReceipt, SessionError> {
        self.submissions
            .lock()
            .unwrap()
            .push(serde_json::to_value(submission)?);

        match self.submit_failures.lock().unwrap().pop_front() {
            Some(409) => Err(SessionError::AlreadySubmitted(
                "You have already submitted this form".into(),
            )),
            Some(status) => Err(SessionError::Api {
                status,
                message: "Service unavailable".into(),
            }),
            None => Ok(SubmissionReceipt {
                status: 201,
                message: Some("Response submitted successfully".into()),
                response_id: Some(format!("resp-{}", self.submissions.lock().unwrap().len())),
            }),
        }
    }
}

/// Moves the pointer in a straight line at 300 px/s for one interval.
pub fn feed_pointer(handle: &SessionHandle, start_ms: f64) {
    for i in 0..10 {
        let t = start_ms + i as f64 * 10.0;
        handle.on_pointer_move(100.0 + i as f64 * 3.0, 200.0, t, true);
    }
}

pub async fn wait_for_checks(handle: &SessionHandle, checks: u32) {
    handle
        .wait_for(|s| s.stats.checks >= checks)
        .await
        .expect("session ended before reaching the check count");
}

/// Pointer input before every tick until `checks` ticks have run.
pub async fn sample_ticks(handle: &SessionHandle, checks: u32) {
    let start = handle.status().stats.checks;
    for n in start..checks {
        feed_pointer(handle, n as f64 * 6000.0);
        wait_for_checks(handle, n + 1).await;
    }
}

#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    pub form_id: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct FakeApiState {
    forms: HashMap<String, Value>,
    submit_status: Option<(StatusCode, Value)>,
    submissions: Vec<RecordedSubmission>,
}

/// Form API served over real HTTP on an ephemeral port.
#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<FakeApiState>>,
}

impl FakeApi {
    pub fn add_form(&self, id: &str, form: Value) {
        self.state.lock().unwrap().forms.insert(id.to_string(), form);
    }

    pub fn respond_to_submit(&self, status: StatusCode, body: Value) {
        self.state.lock().unwrap().submit_status = Some((status, body));
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.state.lock().unwrap().submissions.clone()
    }

    /// Returns the `/api` base URL.
    pub async fn serve(&self) -> String {
        let app = Router::new()
            .route("/api/forms/:id", get(get_form))
            .route("/api/form-responses/:id/submit", post(submit_response))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }
}

async fn get_form(State(api): State<FakeApi>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match api.state.lock().unwrap().forms.get(&id) {
        Some(form) => (StatusCode::OK, Json(form.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": "Form not found" }))),
    }
}

async fn submit_response(
    State(api): State<FakeApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut state = api.state.lock().unwrap();
    state.submissions.push(RecordedSubmission {
        form_id: id,
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    match &state.submit_status {
        Some((status, body)) => (*status, Json(body.clone())),
        None => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Response submitted successfully",
                "response": { "_id": format!("resp-{}", state.submissions.len()) }
            })),
        ),
    }
}
