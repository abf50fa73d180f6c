//! parec | lame capture pipeline adapter

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::{timeout, Duration as TokioDuration};
use tracing::{debug, warn};

use crate::application::ports::{CaptureError, CaptureLauncher, CapturePipeline};

const CAPTURE_PROGRAM: &str = "parec";
const ENCODER_PROGRAM: &str = "lame";

/// How long the capture process gets to exit after SIGTERM
const TERM_GRACE: TokioDuration = TokioDuration::from_secs(2);

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Fresh scratch path for one recording
fn temp_recording_path(dir: &Path) -> PathBuf {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let seq = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("drainify-{}-{}.mp3", timestamp, seq))
}

/// Raw 16-bit little-endian stereo PCM at 44.1 kHz from `device`
fn capture_args(device: &str) -> Vec<String> {
    vec![
        "--format=s16le".to_string(),
        "--rate=44100".to_string(),
        "--channels=2".to_string(),
        format!("--device={}", device),
    ]
}

/// VBR quality 2 MP3 from the raw PCM on stdin
fn encoder_args(output_path: &Path) -> Vec<String> {
    vec![
        "-r".to_string(), // raw input
        "-s".to_string(),
        "44.1".to_string(),
        "--bitwidth".to_string(),
        "16".to_string(),
        "--signed".to_string(),
        "--little-endian".to_string(),
        "-V".to_string(),
        "2".to_string(),
        "--quiet".to_string(),
        "-".to_string(),
        output_path.to_string_lossy().to_string(),
    ]
}

fn spawn_error(program: &'static str, e: io::Error) -> CaptureError {
    if e.kind() == io::ErrorKind::NotFound {
        CaptureError::ToolNotFound(program)
    } else {
        CaptureError::StartFailed(format!("{}: {}", program, e))
    }
}

/// Send a signal to the process group led by `child`.
///
/// A group that is already gone counts as success.
fn signal_group(child: &Child, sig: Signal) -> Result<(), CaptureError> {
    let Some(id) = child.id() else {
        return Ok(());
    };
    match signal::killpg(Pid::from_raw(id as i32), sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(CaptureError::SignalFailed(format!("{:?} to {}: {}", sig, id, e))),
    }
}

/// Kill a child and reap it. Children that were already reaped are skipped.
async fn kill_and_reap(child: &mut Child) -> Result<(), CaptureError> {
    if child.id().is_none() {
        return Ok(());
    }
    signal_group(child, Signal::SIGKILL)?;
    child
        .wait()
        .await
        .map(|_| ())
        .map_err(|e| CaptureError::SignalFailed(e.to_string()))
}

/// Launches `parec` on a device and pipes it into `lame`
#[derive(Debug, Clone)]
pub struct ParecLameLauncher {
    temp_dir: PathBuf,
}

impl ParecLameLauncher {
    /// Create a launcher writing scratch files to the system temp dir
    pub fn new() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
        }
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}

impl Default for ParecLameLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureLauncher for ParecLameLauncher {
    async fn launch(&self, device: &str) -> Result<Box<dyn CapturePipeline>, CaptureError> {
        let output_path = temp_recording_path(&self.temp_dir);

        // Own process groups so a terminal Ctrl+C only reaches us
        let mut capture = Command::new(CAPTURE_PROGRAM)
            .args(capture_args(device))
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(CAPTURE_PROGRAM, e))?;

        let pcm = capture
            .stdout
            .take()
            .map(|out| -> io::Result<Stdio> { out.try_into() });
        let pcm = match pcm {
            Some(Ok(stdio)) => stdio,
            Some(Err(e)) => {
                let _ = kill_and_reap(&mut capture).await;
                return Err(CaptureError::StartFailed(format!("capture output: {}", e)));
            }
            None => {
                let _ = kill_and_reap(&mut capture).await;
                return Err(CaptureError::StartFailed(
                    "capture output was not piped".to_string(),
                ));
            }
        };

        let encoder = Command::new(ENCODER_PROGRAM)
            .args(encoder_args(&output_path))
            .stdin(pcm)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn();

        let encoder = match encoder {
            Ok(child) => child,
            Err(e) => {
                let _ = kill_and_reap(&mut capture).await;
                return Err(spawn_error(ENCODER_PROGRAM, e));
            }
        };

        debug!(
            device,
            capture_pid = ?capture.id(),
            encoder_pid = ?encoder.id(),
            path = %output_path.display(),
            "capture pipeline launched"
        );

        Ok(Box::new(ParecLamePipeline {
            capture,
            encoder,
            output_path,
        }))
    }
}

/// One running `parec | lame` pair
pub struct ParecLamePipeline {
    capture: Child,
    encoder: Child,
    output_path: PathBuf,
}

impl ParecLamePipeline {
    /// Last stderr line of the encoder, for error messages
    async fn encoder_stderr(&mut self) -> Option<String> {
        let mut stderr = self.encoder.stderr.take()?;
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf)
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .map(|l| l.trim().to_string())
    }
}

#[async_trait]
impl CapturePipeline for ParecLamePipeline {
    fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn capture_pid(&self) -> Option<u32> {
        self.capture.id()
    }

    async fn stop_capture(&mut self) -> Result<(), CaptureError> {
        signal_group(&self.capture, Signal::SIGTERM)
    }

    async fn wait_encoder(&mut self) -> Result<(), CaptureError> {
        match timeout(TERM_GRACE, self.capture.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(CaptureError::SignalFailed(e.to_string())),
            Err(_) => {
                warn!(pid = ?self.capture.id(), "capture ignored SIGTERM, killing");
                kill_and_reap(&mut self.capture).await?;
            }
        }

        let status = self
            .encoder
            .wait()
            .await
            .map_err(|e| CaptureError::EncoderFailed(e.to_string()))?;

        if status.success() {
            return Ok(());
        }

        let detail = self
            .encoder_stderr()
            .await
            .unwrap_or_else(|| status.to_string());
        Err(CaptureError::EncoderFailed(detail))
    }

    async fn kill(&mut self) -> Result<(), CaptureError> {
        let capture = kill_and_reap(&mut self.capture).await;
        let encoder = kill_and_reap(&mut self.encoder).await;
        capture.and(encoder)
    }
}
