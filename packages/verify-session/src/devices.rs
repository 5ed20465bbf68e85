use std::future::Future;

use human_verify_wasm::FaceDetection;
use thiserror::Error;

/// A decoded video frame, RGBA.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera device found")]
    NotFound,
    #[error("camera failed: {0}")]
    Device(String),
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("face model failed to load: {0}")]
    ModelLoad(String),
    #[error("face inference failed: {0}")]
    Inference(String),
}

pub trait CameraSource: Send {
    type Stream: VideoStream + 'static;

    fn open(&mut self) -> impl Future<Output = Result<Self::Stream, CameraError>> + Send;
}

pub trait VideoStream: Send {
    /// `None` until the stream has decoded its first frame.
    fn current_frame(&mut self) -> Option<Frame>;

    fn stop_tracks(&mut self);
}

pub trait FaceDetector: Send + 'static {
    /// Loads model weights. Failure here is fatal to the session.
    fn warm_up(&mut self) -> impl Future<Output = Result<(), DetectionError>> + Send;

    fn detect_faces(
        &mut self,
        frame: &Frame,
    ) -> impl Future<Output = Result<Vec<FaceDetection>, DetectionError>> + Send;
}
