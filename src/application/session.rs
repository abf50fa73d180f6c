//! Track sessions and the registry of active recordings

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::recording::Duration;
use crate::domain::track::TrackMetadata;

use super::orchestrator::Wakeup;
use super::ports::CapturePipeline;

/// Identity of one recording, unique for the lifetime of an orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One-shot timer that posts [`Wakeup::BoundaryReached`] when the track is
/// about to end.
///
/// Dropping or cancelling the timer aborts it; aborting after it fired does
/// nothing.
#[derive(Debug)]
pub struct BoundaryTimer {
    handle: Option<AbortHandle>,
    delay: Duration,
}

impl BoundaryTimer {
    /// Spawn the timer on the current runtime
    pub fn arm(id: SessionId, delay: Duration, wakeups: mpsc::UnboundedSender<Wakeup>) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay.as_std()).await;
            let _ = wakeups.send(Wakeup::BoundaryReached(id));
        });

        Self {
            handle: Some(task.abort_handle()),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for BoundaryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A recording in progress.
///
/// Owns the capture pipeline, its temp file and the boundary timer.
pub struct TrackSession {
    id: SessionId,
    metadata: TrackMetadata,
    pipeline: Box<dyn CapturePipeline>,
    boundary: BoundaryTimer,
    started_at: Instant,
}

impl TrackSession {
    pub fn new(
        id: SessionId,
        metadata: TrackMetadata,
        pipeline: Box<dyn CapturePipeline>,
        boundary: BoundaryTimer,
    ) -> Self {
        Self {
            id,
            metadata,
            pipeline,
            boundary,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    pub fn temp_path(&self) -> &Path {
        self.pipeline.output_path()
    }

    pub fn boundary(&self) -> &BoundaryTimer {
        &self.boundary
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Early stop: kill both processes and delete the temp file.
    pub async fn discard(mut self) {
        self.boundary.cancel();

        if let Err(e) = self.pipeline.kill().await {
            warn!(session = %self.id, error = %e, "failed to kill capture pipeline");
        }

        let path = self.pipeline.output_path().to_path_buf();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(session = %self.id, path = %path.display(), "removed temp file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(session = %self.id, path = %path.display(), error = %e, "failed to remove temp file")
            }
        }
    }

    /// Normal completion: ask the capture process to stop and hand the
    /// pipeline over for finalization, which reaps both processes.
    pub async fn complete(mut self) -> CompletedRecording {
        self.boundary.cancel();

        if let Err(e) = self.pipeline.stop_capture().await {
            warn!(session = %self.id, error = %e, "failed to stop capture cleanly");
        }

        CompletedRecording {
            id: self.id,
            metadata: self.metadata,
            pipeline: self.pipeline,
        }
    }
}

impl fmt::Debug for TrackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackSession")
            .field("id", &self.id)
            .field("metadata", &self.metadata)
            .field("temp_path", &self.pipeline.output_path())
            .field("capture_pid", &self.pipeline.capture_pid())
            .field("boundary", &self.boundary)
            .finish()
    }
}

/// A session whose capture ended at the track boundary; the encoder may
/// still be flushing.
pub struct CompletedRecording {
    pub id: SessionId,
    pub metadata: TrackMetadata,
    pub pipeline: Box<dyn CapturePipeline>,
}

impl CompletedRecording {
    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }
}

/// Active sessions keyed by id. Owned by the orchestrator.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, TrackSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: TrackSession) {
        self.sessions.insert(session.id(), session);
    }

    /// Take a session out of the registry. `None` means someone else got
    /// there first.
    pub fn remove(&mut self, id: SessionId) -> Option<TrackSession> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&TrackSession> {
        self.sessions.get(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of all active sessions, oldest first
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn is_recording(&self, metadata: &TrackMetadata) -> bool {
        self.sessions.values().any(|s| s.metadata() == metadata)
    }
}
