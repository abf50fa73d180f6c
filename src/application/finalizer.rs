//! Finalization of completed recordings
//!
//! Waits for the encoder to flush, writes tags and moves the temp file to
//! `<output_dir>/<artist> - <title>.mp3`.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::recording::Duration;
use crate::domain::track::{track_path_candidates, TrackMetadata};

use super::ports::{CaptureError, CapturePipeline, Tagger};
use super::session::CompletedRecording;

/// Errors that cost a single recording
#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("Encoder did not finish within {0}")]
    EncodeTimeout(Duration),

    #[error("Encoder failed: {0}")]
    Encoder(#[from] CaptureError),

    #[error("Failed to move recording to {}: {source}", .path.display())]
    Move {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A recording that made it to its final location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedTrack {
    pub artist: String,
    pub title: String,
    pub path: PathBuf,
    /// False when tagging failed and the file was kept untagged
    pub tagged: bool,
}

/// Turns completed recordings into tagged files in the output directory
pub struct Finalizer<T: Tagger> {
    tagger: T,
    output_dir: PathBuf,
    encode_timeout: Duration,
}

impl<T: Tagger> Finalizer<T> {
    pub fn new(tagger: T, output_dir: impl Into<PathBuf>, encode_timeout: Duration) -> Self {
        Self {
            tagger,
            output_dir: output_dir.into(),
            encode_timeout,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Finish one recording.
    ///
    /// Encoder problems discard the recording. A tagging failure keeps the
    /// audio: the file is moved untagged and `tagged` is false.
    pub async fn finalize(
        &self,
        recording: CompletedRecording,
    ) -> Result<FinishedTrack, FinalizeError> {
        let CompletedRecording {
            id,
            metadata,
            mut pipeline,
        } = recording;
        let temp_path = pipeline.output_path().to_path_buf();

        match timeout(self.encode_timeout.as_std(), pipeline.wait_encoder()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                discard(pipeline.as_mut(), &temp_path).await;
                return Err(FinalizeError::Encoder(e));
            }
            Err(_) => {
                discard(pipeline.as_mut(), &temp_path).await;
                return Err(FinalizeError::EncodeTimeout(self.encode_timeout));
            }
        }
        debug!(session = %id, "encoder drained");

        let tagged = match self.tagger.apply_tags(&temp_path, &metadata).await {
            Ok(()) => true,
            Err(e) => {
                warn!(session = %id, track = %metadata, error = %e, "keeping recording untagged");
                false
            }
        };

        let final_path = match place_file(&temp_path, &self.output_dir, &metadata).await {
            Ok(path) => path,
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        Ok(FinishedTrack {
            artist: metadata.artist().to_string(),
            title: metadata.title().to_string(),
            path: final_path,
            tagged,
        })
    }
}

async fn discard(pipeline: &mut dyn CapturePipeline, temp_path: &Path) {
    if let Err(e) = pipeline.kill().await {
        warn!(error = %e, "failed to kill encoder");
    }
    match fs::remove_file(temp_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %temp_path.display(), error = %e, "failed to remove temp file"),
    }
}

/// Move `from` into `dir` under the first free track name.
///
/// Names are claimed with operations that fail on an existing file, so
/// finalizations running side by side never replace each other's output.
async fn place_file(
    from: &Path,
    dir: &Path,
    metadata: &TrackMetadata,
) -> Result<PathBuf, FinalizeError> {
    let mut last = dir.to_path_buf();

    for candidate in track_path_candidates(dir, metadata) {
        match claim(from, &candidate).await {
            Ok(()) => {
                if let Err(e) = fs::remove_file(from).await {
                    warn!(path = %from.display(), error = %e, "failed to remove temp file");
                }
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => last = candidate,
            Err(source) => {
                return Err(FinalizeError::Move {
                    path: candidate,
                    source,
                })
            }
        }
    }

    Err(FinalizeError::Move {
        path: last,
        source: io::Error::new(ErrorKind::AlreadyExists, "no free file name left"),
    })
}

/// Create `to` with the contents of `from`. Fails with `AlreadyExists`
/// instead of replacing a file.
async fn claim(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to).await {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(e),
        Err(e) => debug!(error = %e, "hard link failed, copying instead"),
    }

    let mut target = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
        .await?;

    let copied = async {
        let mut source = fs::File::open(from).await?;
        tokio::io::copy(&mut source, &mut target).await?;
        target.sync_all().await
    }
    .await;

    if let Err(e) = copied {
        drop(target);
        let _ = fs::remove_file(to).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::TagError;
    use crate::application::session::SessionId;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    enum EncoderBehavior {
        Finishes,
        Fails,
        Hangs,
    }

    struct FilePipeline {
        path: PathBuf,
        behavior: EncoderBehavior,
        killed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl CapturePipeline for FilePipeline {
        fn output_path(&self) -> &Path {
            &self.path
        }

        fn capture_pid(&self) -> Option<u32> {
            None
        }

        async fn stop_capture(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }

        async fn wait_encoder(&mut self) -> Result<(), CaptureError> {
            match self.behavior {
                EncoderBehavior::Finishes => Ok(()),
                EncoderBehavior::Fails => {
                    Err(CaptureError::EncoderFailed("exit status: 1".to_string()))
                }
                EncoderBehavior::Hangs => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
            }
        }

        async fn kill(&mut self) -> Result<(), CaptureError> {
            self.killed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingTagger {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Tagger for CountingTagger {
        async fn apply_tags(&self, path: &Path, _metadata: &TrackMetadata) -> Result<(), TagError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(path.exists(), "tags must be applied before the move");
            if self.fail {
                Err(TagError::WriteFailed("read-only".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        _scratch: tempfile::TempDir,
        output: tempfile::TempDir,
        temp_path: PathBuf,
        killed: Arc<AtomicBool>,
        tag_calls: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let scratch = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let temp_path = scratch.path().join("drainify-1.mp3");
        std::fs::write(&temp_path, b"ID3 not really").unwrap();
        Fixture {
            _scratch: scratch,
            output,
            temp_path,
            killed: Arc::new(AtomicBool::new(false)),
            tag_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn recording(fx: &Fixture, behavior: EncoderBehavior, title: &str) -> CompletedRecording {
        CompletedRecording {
            id: SessionId::new(1),
            metadata: TrackMetadata::new(title, "B", 10_000_000),
            pipeline: Box::new(FilePipeline {
                path: fx.temp_path.clone(),
                behavior,
                killed: Arc::clone(&fx.killed),
            }),
        }
    }

    fn finalizer(fx: &Fixture, fail_tags: bool) -> Finalizer<CountingTagger> {
        Finalizer::new(
            CountingTagger {
                calls: Arc::clone(&fx.tag_calls),
                fail: fail_tags,
            },
            fx.output.path(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn moves_tagged_file_to_artist_title() {
        let fx = fixture();
        let track = finalizer(&fx, false)
            .finalize(recording(&fx, EncoderBehavior::Finishes, "A"))
            .await
            .unwrap();

        assert_eq!(track.artist, "B");
        assert_eq!(track.title, "A");
        assert!(track.tagged);
        assert_eq!(track.path, fx.output.path().join("B - A.mp3"));
        assert!(track.path.exists());
        assert!(!fx.temp_path.exists());
        assert_eq!(fx.tag_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn never_overwrites_existing_file() {
        let fx = fixture();
        let existing = fx.output.path().join("B - A.mp3");
        std::fs::write(&existing, b"older take").unwrap();

        let track = finalizer(&fx, false)
            .finalize(recording(&fx, EncoderBehavior::Finishes, "A"))
            .await
            .unwrap();

        assert_eq!(track.path, fx.output.path().join("B - A (2).mp3"));
        assert_eq!(std::fs::read(&existing).unwrap(), b"older take");
    }

    fn take(fx: &Fixture, name: &str, contents: &[u8]) -> CompletedRecording {
        let path = fx.temp_path.with_file_name(name);
        std::fs::write(&path, contents).unwrap();
        CompletedRecording {
            id: SessionId::new(2),
            metadata: TrackMetadata::new("A", "B", 10_000_000),
            pipeline: Box::new(FilePipeline {
                path,
                behavior: EncoderBehavior::Finishes,
                killed: Arc::clone(&fx.killed),
            }),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn simultaneous_same_name_recordings_both_survive() {
        let fx = fixture();
        let finalizer = finalizer(&fx, false);

        let (first, second) = tokio::join!(
            finalizer.finalize(take(&fx, "take-1.mp3", b"first take")),
            finalizer.finalize(take(&fx, "take-2.mp3", b"second take")),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_ne!(first.path, second.path);
        let mut names: Vec<String> = std::fs::read_dir(fx.output.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["B - A (2).mp3", "B - A.mp3"]);

        let mut contents = vec![
            std::fs::read(&first.path).unwrap(),
            std::fs::read(&second.path).unwrap(),
        ];
        contents.sort();
        assert_eq!(contents, vec![b"first take".to_vec(), b"second take".to_vec()]);
    }

    #[tokio::test]
    async fn claim_refuses_taken_name() {
        let fx = fixture();
        let taken = fx.output.path().join("B - A.mp3");
        std::fs::write(&taken, b"older take").unwrap();

        let err = claim(&fx.temp_path, &taken).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&taken).unwrap(), b"older take");
        assert!(fx.temp_path.exists());
    }

    #[tokio::test]
    async fn tagging_failure_keeps_file_untagged() {
        let fx = fixture();
        let track = finalizer(&fx, true)
            .finalize(recording(&fx, EncoderBehavior::Finishes, "A"))
            .await
            .unwrap();

        assert!(!track.tagged);
        assert!(track.path.exists());
    }

    #[tokio::test]
    async fn sanitizes_path_hostile_titles() {
        let fx = fixture();
        let track = finalizer(&fx, false)
            .finalize(recording(&fx, EncoderBehavior::Finishes, "../../etc/passwd"))
            .await
            .unwrap();

        assert_eq!(track.path.parent(), Some(fx.output.path()));
    }

    #[tokio::test]
    async fn encoder_failure_discards_recording() {
        let fx = fixture();
        let err = finalizer(&fx, false)
            .finalize(recording(&fx, EncoderBehavior::Fails, "A"))
            .await
            .unwrap_err();

        assert!(matches!(err, FinalizeError::Encoder(_)));
        assert!(fx.killed.load(Ordering::SeqCst));
        assert!(!fx.temp_path.exists());
        assert_eq!(fx.tag_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn encoder_timeout_discards_recording() {
        let fx = fixture();
        let err = finalizer(&fx, false)
            .finalize(recording(&fx, EncoderBehavior::Hangs, "A"))
            .await
            .unwrap_err();

        assert!(matches!(err, FinalizeError::EncodeTimeout(_)));
        assert!(fx.killed.load(Ordering::SeqCst));
        assert!(!fx.temp_path.exists());
        assert_eq!(std::fs::read_dir(fx.output.path()).unwrap().count(), 0);
    }
}
