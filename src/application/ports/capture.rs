//! Capture pipeline port interfaces

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Capture pipeline errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("'{0}' not found. Please install it and make sure it is on PATH")]
    ToolNotFound(&'static str),

    #[error("Failed to start capture pipeline: {0}")]
    StartFailed(String),

    #[error("Encoder failed: {0}")]
    EncoderFailed(String),

    #[error("Failed to stop capture process: {0}")]
    SignalFailed(String),
}

/// A running capture process piped into an encoder writing a temp file.
///
/// Implementations own both child processes and the temp file path.
#[async_trait]
pub trait CapturePipeline: Send {
    /// Scratch file the encoder writes to
    fn output_path(&self) -> &Path;

    /// OS process id of the capture process, for diagnostics
    fn capture_pid(&self) -> Option<u32>;

    /// Ask the capture process to exit so the encoder sees end of input.
    ///
    /// Only sends the request; it must not wait for the process.
    async fn stop_capture(&mut self) -> Result<(), CaptureError>;

    /// Reap the stopped capture process, forcing it if it lingers, then wait
    /// until the encoder has flushed and exited. A non-zero exit is an error.
    async fn wait_encoder(&mut self) -> Result<(), CaptureError>;

    /// Kill both processes immediately. Calling it twice is harmless.
    async fn kill(&mut self) -> Result<(), CaptureError>;
}

/// Port for launching capture pipelines on an audio device
#[async_trait]
pub trait CaptureLauncher: Send + Sync {
    /// Start capturing `device` into a fresh temp file.
    async fn launch(&self, device: &str) -> Result<Box<dyn CapturePipeline>, CaptureError>;
}
