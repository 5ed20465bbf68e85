use std::time::Duration;

use axum::http::StatusCode;
use human_verify_wasm::{VerificationConfig, VerificationVerdict};
use pohw_verify_session::form::QuestionType;
use pohw_verify_session::simulation::{run_simulation, SimProfile, SimulationOutcome};
use pohw_verify_session::{FormApi, HttpFormApi, SessionError, Submission};
use serde_json::json;

mod common;

use common::{signup_answers, FakeApi};

fn form_json(active: bool) -> serde_json::Value {
    json!({
        "_id": "form-1",
        "title": "Beta signup",
        "description": "Tell us about yourself",
        "isActive": active,
        "questions": [
            { "_id": "q-name", "label": "Name", "type": "text", "required": true },
            { "_id": "q-email", "label": "Email", "type": "email", "required": true },
            { "_id": "q-plan", "label": "Plan", "type": "radio", "options": ["free", "pro"] }
        ]
    })
}

fn client(base: String) -> HttpFormApi {
    HttpFormApi::new(base, Some("test-token".into()), Duration::from_secs(5))
}

#[tokio::test]
async fn test_fetch_form_reads_wire_format() {
    let fake = FakeApi::default();
    fake.add_form("form-1", form_json(true));
    let api = client(fake.serve().await);

    let form = api.fetch_form("form-1").await.unwrap();
    assert_eq!(form.title, "Beta signup");
    assert!(form.is_active);
    assert_eq!(form.questions.len(), 3);
    assert_eq!(form.questions[1].id, "q-email");
    assert_eq!(form.questions[1].kind, QuestionType::Email);
    assert_eq!(form.questions[2].options, vec!["free", "pro"]);
    assert!(!form.questions[2].required);
}

#[tokio::test]
async fn test_fetch_missing_form() {
    let fake = FakeApi::default();
    let api = client(fake.serve().await);

    let err = api.fetch_form("nope").await.unwrap_err();
    match err {
        SessionError::FormUnavailable { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Form not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_submit_sends_answers_verdict_and_token() {
    let fake = FakeApi::default();
    let api = client(fake.serve().await);
    let answers = signup_answers();
    let submission = Submission {
        answers: &answers,
        verification: VerificationVerdict { net_score: 88, passed: true },
    };

    let receipt = api.submit_response("form-1", &submission).await.unwrap();
    assert_eq!(receipt.status, 201);
    assert_eq!(receipt.message.as_deref(), Some("Response submitted successfully"));
    assert_eq!(receipt.response_id.as_deref(), Some("resp-1"));

    let recorded = fake.submissions();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].form_id, "form-1");
    assert_eq!(recorded[0].authorization.as_deref(), Some("Bearer test-token"));
    assert_eq!(recorded[0].body["verification"], json!({ "netScore": 88, "passed": true }));
    assert_eq!(recorded[0].body["answers"][0]["questionId"], "q-name");
}

#[tokio::test]
async fn test_submit_conflict_means_already_submitted() {
    let fake = FakeApi::default();
    fake.respond_to_submit(
        StatusCode::CONFLICT,
        json!({ "message": "You have already submitted this form" }),
    );
    let api = client(fake.serve().await);
    let submission = Submission {
        answers: &[],
        verification: VerificationVerdict { net_score: 90, passed: true },
    };

    let err = api.submit_response("form-1", &submission).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadySubmitted(ref m) if m == "You have already submitted this form"));
}

#[tokio::test]
async fn test_submit_server_error_is_not_retried() {
    let fake = FakeApi::default();
    fake.respond_to_submit(StatusCode::INTERNAL_SERVER_ERROR, json!({}));
    let api = client(fake.serve().await);
    let submission = Submission {
        answers: &[],
        verification: VerificationVerdict { net_score: 90, passed: true },
    };

    let err = api.submit_response("form-1", &submission).await.unwrap_err();
    assert!(matches!(err, SessionError::Api { status: 500, ref message } if message == "Internal Server Error"));
    assert_eq!(fake.submissions().len(), 1);
}

fn fast_config() -> VerificationConfig {
    VerificationConfig {
        min_checks_required: 3,
        check_interval_ms: 40,
        check_jitter_ms: 10,
        ..VerificationConfig::default()
    }
}

#[tokio::test]
async fn test_simulated_human_submits_over_http() {
    let fake = FakeApi::default();
    fake.add_form("form-1", form_json(true));
    let api = client(fake.serve().await);

    let outcome = run_simulation(api, "form-1", SimProfile::Human, fast_config(), std::future::pending())
        .await
        .unwrap();

    let SimulationOutcome::Submitted { verdict, receipt } = outcome else {
        panic!("expected a submission, got {outcome:?}");
    };
    assert!(verdict.passed);
    assert!(verdict.net_score >= 70);
    assert_eq!(receipt.status, 201);

    let recorded = fake.submissions();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].body["verification"]["netScore"], verdict.net_score);
}

#[tokio::test]
async fn test_simulated_bot_is_rejected() {
    let fake = FakeApi::default();
    fake.add_form("form-1", form_json(true));
    let api = client(fake.serve().await);

    let outcome = run_simulation(api, "form-1", SimProfile::Bot, fast_config(), std::future::pending())
        .await
        .unwrap();

    match outcome {
        SimulationOutcome::Rejected { score, checks } => {
            assert!(score < 70, "score {score}");
            assert!(checks >= 9);
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert!(fake.submissions().is_empty());
}

#[tokio::test]
async fn test_simulation_stops_on_inactive_form() {
    let fake = FakeApi::default();
    fake.add_form("form-1", form_json(false));
    let api = client(fake.serve().await);

    let err = run_simulation(api, "form-1", SimProfile::Human, fast_config(), std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::FormInactive));
}

#[tokio::test]
async fn test_simulation_without_camera_fails_fast() {
    let fake = FakeApi::default();
    fake.add_form("form-1", form_json(true));
    let api = client(fake.serve().await);

    let err = run_simulation(api, "form-1", SimProfile::NoCamera, fast_config(), std::future::pending())
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, SessionError::Camera(_)));
}

#[tokio::test]
async fn test_simulation_honours_shutdown() {
    let fake = FakeApi::default();
    fake.add_form("form-1", form_json(true));
    let api = client(fake.serve().await);
    let config = VerificationConfig {
        check_interval_ms: 60_000,
        check_jitter_ms: 0,
        ..VerificationConfig::default()
    };

    let outcome = run_simulation(
        api,
        "form-1",
        SimProfile::Human,
        config,
        tokio::time::sleep(Duration::from_millis(50)),
    )
    .await
    .unwrap();
    assert_eq!(outcome, SimulationOutcome::Interrupted);
}

#[tokio::test]
async fn test_request_timeout_is_applied() {
    // accepts connections but never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    let api = HttpFormApi::new(format!("http://{addr}"), None, Duration::from_millis(200));

    let started = std::time::Instant::now();
    let err = tokio::time::timeout(Duration::from_secs(5), api.fetch_form("form-1"))
        .await
        .expect("request should time out on its own")
        .unwrap_err();
    assert!(matches!(err, SessionError::Request(ref e) if e.is_timeout()), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
}
