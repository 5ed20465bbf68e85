pub mod api;
pub mod config;
pub mod devices;
pub mod error;
pub mod finalizer;
pub mod form;
pub mod logging;
pub mod session;
pub mod simulation;

pub use api::{FormApi, HttpFormApi, Submission, SubmissionReceipt};
pub use config::Config;
pub use error::SessionError;
pub use session::{SessionHandle, SessionStatus, VerificationSession};
