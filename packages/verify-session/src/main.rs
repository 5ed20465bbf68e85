use std::process::ExitCode;

use pohw_verify_session::logging::init_tracing;
use pohw_verify_session::simulation::{run_simulation, SimProfile, SimulationOutcome};
use pohw_verify_session::{Config, HttpFormApi};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config.log);

    let Some(form_id) = std::env::var("SIM_FORM_ID").ok().filter(|v| !v.trim().is_empty()) else {
        tracing::error!("SIM_FORM_ID is not set");
        return ExitCode::from(2);
    };

    let profile = match std::env::var("SIM_PROFILE") {
        Ok(raw) => match raw.parse::<SimProfile>() {
            Ok(profile) => profile,
            Err(e) => {
                tracing::error!(error = %e, "invalid SIM_PROFILE");
                return ExitCode::from(2);
            }
        },
        Err(_) => SimProfile::Human,
    };

    tracing::info!(
        api_base = %config.api_base,
        form_id = %form_id,
        ?profile,
        min_checks = config.verification.min_checks_required,
        min_net_score = config.verification.min_net_score,
        "starting verification session"
    );

    let api = HttpFormApi::from_config(&config);
    let result = run_simulation(api, &form_id, profile, config.verification, shutdown_signal()).await;

    match result {
        Ok(SimulationOutcome::Submitted { verdict, receipt }) => {
            tracing::info!(
                net_score = verdict.net_score,
                passed = verdict.passed,
                status = receipt.status,
                response_id = receipt.response_id.as_deref().unwrap_or("-"),
                "response submitted"
            );
            ExitCode::SUCCESS
        }
        Ok(SimulationOutcome::Rejected { score, checks }) => {
            tracing::warn!(score, checks, "verification score stayed below the threshold");
            ExitCode::from(1)
        }
        Ok(SimulationOutcome::Interrupted) => {
            tracing::info!("session interrupted, camera released");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, message = %e.user_message(), "verification session failed");
            ExitCode::from(1)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
