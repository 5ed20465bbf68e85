use std::path::PathBuf;
use std::time::Duration;

use human_verify_wasm::VerificationConfig;

use crate::logging::LogConfig;

const DEFAULT_API_BASE: &str = "http://localhost:5000/api";
const DEFAULT_API_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub api_token: Option<String>,
    pub api_timeout: Duration,
    pub log: LogConfig,
    pub verification: VerificationConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparsable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse_u64 = |key: &str| get(key).and_then(|v| v.trim().parse::<u64>().ok());
        let parse_f64 = |key: &str| {
            get(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        let mut verification = VerificationConfig::default();
        if let Some(v) = parse_u64("MIN_CHECKS_REQUIRED") {
            verification.min_checks_required = v.min(u32::MAX as u64) as u32;
        }
        if let Some(v) = parse_u64("CHECK_INTERVAL") {
            verification.check_interval_ms = v;
        }
        if let Some(v) = parse_u64("CHECK_JITTER") {
            verification.check_jitter_ms = v;
        }
        if let Some(v) = parse_f64("FACE_CONFIDENCE_THRESHOLD") {
            verification.face_confidence_threshold = v;
        }
        if let Some(v) = parse_u64("MIN_NET_SCORE") {
            verification.min_net_score = v.min(u32::MAX as u64) as u32;
        }
        if let Some(v) = parse_u64("POINTER_BUFFER_CAPACITY") {
            verification.pointer_buffer_capacity = v as usize;
        }
        if let Some(v) = parse_f64("MOUSE_MIN_VELOCITY") {
            verification.mouse.min_velocity = v;
        }
        if let Some(v) = parse_f64("MOUSE_MAX_VELOCITY") {
            verification.mouse.max_velocity = v;
        }
        if let Some(v) = parse_f64("MOUSE_REFERENCE_VELOCITY") {
            verification.mouse.reference_velocity = v;
        }

        Self {
            api_base: get("FORM_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_token: get("FORM_API_TOKEN"),
            api_timeout: Duration::from_millis(
                parse_u64("FORM_API_TIMEOUT").unwrap_or(DEFAULT_API_TIMEOUT_MS),
            ),
            log: LogConfig {
                level: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
                file_dir: get("ENABLE_FILE_LOGS")
                    .filter(|v| v == "true" || v == "1")
                    .map(|_| PathBuf::from(get("LOG_DIR").unwrap_or_else(|| "./logs".to_string()))),
                json: get("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
            },
            verification,
        }
    }
}
