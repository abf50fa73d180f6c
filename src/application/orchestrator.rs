//! Track-boundary recording orchestrator
//!
//! Reacts to player events and internal wakeups, and is the only code that
//! touches the [`SessionRegistry`]. Everything runs on one task: events,
//! boundary timers, the pause grace period and the settle delay are all
//! funnelled through [`RecordingOrchestrator::run`], so whichever of "timer
//! fired" and "early stop" removes a session first wins and the other becomes
//! a no-op.
//!
//! State machine (per registry contents):
//!   IDLE      --Playing+track-->            settle, then RECORDING
//!   RECORDING --Playing+track (skip)-->     discard all, settle, then RECORDING
//!   RECORDING --track only-->               settle, then one more session
//!   RECORDING --Paused-->                   grace, then discard the paused sessions
//!   RECORDING --boundary timer-->           finalize that session
//!   any       --Stopped / Playing alone-->  ignored

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::domain::recording::{boundary_delay, Duration};
use crate::domain::track::{PlaybackEvent, PlaybackStatus, TrackMetadata};

use super::finalizer::{Finalizer, FinishedTrack};
use super::ports::{CaptureError, CaptureLauncher, PlaybackEventSource, Tagger};
use super::session::{BoundaryTimer, SessionId, SessionRegistry, TrackSession};

/// Errors from the orchestrator use case
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Failed to start recording of {track}: {source}")]
    PipelineStart {
        track: String,
        #[source]
        source: CaptureError,
    },
}

/// Timing and device policy for recordings
#[derive(Debug, Clone)]
pub struct RecordingPolicy {
    /// Device the capture process reads from (monitor of the combined sink)
    pub capture_device: String,
    /// How long to wait after a pause before discarding running recordings
    pub pause_grace: Duration,
    /// Delay between a track change and launching its capture
    pub skip_settle: Duration,
    /// How long before the track's end the boundary stop happens
    pub boundary_lead: Duration,
}

impl Default for RecordingPolicy {
    fn default() -> Self {
        Self {
            capture_device: "drainify_combined.monitor".to_string(),
            pause_grace: Duration::default_pause_grace(),
            skip_settle: Duration::default_skip_settle(),
            boundary_lead: Duration::default_boundary_lead(),
        }
    }
}

/// Deferred work scheduled by the orchestrator itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wakeup {
    /// A session's boundary timer elapsed
    BoundaryReached(SessionId),
    /// The grace period after a pause is over; discard these sessions if
    /// they are still running
    PauseGraceElapsed(Vec<SessionId>),
    /// The settle delay for a pending start is over
    SettleElapsed { token: u64, metadata: TrackMetadata },
}

/// Progress reported to the user interface
#[derive(Debug, Clone)]
pub enum RecorderUpdate {
    Started {
        id: SessionId,
        metadata: TrackMetadata,
    },
    StartFailed {
        metadata: TrackMetadata,
        reason: String,
    },
    Discarded {
        id: SessionId,
        metadata: TrackMetadata,
    },
    Saved(FinishedTrack),
    Failed {
        metadata: TrackMetadata,
        reason: String,
    },
}

/// Why [`RecordingOrchestrator::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Shutdown,
    SourceClosed,
}

/// Result of draining the orchestrator on exit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sessions that were still recording and got discarded
    pub discarded: usize,
    /// Finalizations that were in flight and were awaited
    pub awaited: usize,
}

/// Recording orchestrator use case
pub struct RecordingOrchestrator<L, T>
where
    L: CaptureLauncher,
    T: Tagger + 'static,
{
    launcher: L,
    finalizer: Arc<Finalizer<T>>,
    policy: RecordingPolicy,
    registry: SessionRegistry,
    next_session: u64,
    next_token: u64,
    pending_start: Option<(u64, TrackMetadata)>,
    wakeup_tx: mpsc::UnboundedSender<Wakeup>,
    wakeup_rx: mpsc::UnboundedReceiver<Wakeup>,
    updates: mpsc::UnboundedSender<RecorderUpdate>,
    finalizing: JoinSet<()>,
}

impl<L, T> RecordingOrchestrator<L, T>
where
    L: CaptureLauncher,
    T: Tagger + 'static,
{
    /// Create a new orchestrator in idle state.
    ///
    /// Progress is sent to `updates`; a closed receiver is ignored.
    pub fn new(
        launcher: L,
        finalizer: Finalizer<T>,
        policy: RecordingPolicy,
        updates: mpsc::UnboundedSender<RecorderUpdate>,
    ) -> Self {
        let (wakeup_tx, wakeup_rx) = mpsc::unbounded_channel();
        Self {
            launcher,
            finalizer: Arc::new(finalizer),
            policy,
            registry: SessionRegistry::new(),
            next_session: 1,
            next_token: 1,
            pending_start: None,
            wakeup_tx,
            wakeup_rx,
            updates,
            finalizing: JoinSet::new(),
        }
    }

    pub fn policy(&self) -> &RecordingPolicy {
        &self.policy
    }

    /// Sessions currently recording
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    pub fn is_idle(&self) -> bool {
        self.registry.is_empty()
    }

    /// Track waiting for its settle delay, if any
    pub fn pending_track(&self) -> Option<&TrackMetadata> {
        self.pending_start.as_ref().map(|(_, metadata)| metadata)
    }

    /// Finalizations still running in the background
    pub fn finalizing(&self) -> usize {
        self.finalizing.len()
    }

    /// Serialized main loop.
    ///
    /// Handles player events and wakeups one at a time until `shutdown`
    /// resolves or the event source closes. Does not drain sessions; call
    /// [`shutdown`](Self::shutdown) afterwards.
    pub async fn run<S, F>(&mut self, source: &mut S, shutdown: F) -> RunOutcome
    where
        S: PlaybackEventSource + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            self.reap_finalized();

            tokio::select! {
                biased;

                _ = &mut shutdown => return RunOutcome::Shutdown,

                wakeup = self.wakeup_rx.recv() => {
                    if let Some(wakeup) = wakeup {
                        self.handle_wakeup(wakeup).await;
                    }
                }

                event = source.next_event() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => return RunOutcome::SourceClosed,
                },
            }
        }
    }

    /// React to one player event.
    pub async fn handle_event(&mut self, event: PlaybackEvent) {
        debug!(?event, sessions = self.registry.len(), "playback event");

        match event {
            PlaybackEvent::StatusChanged(PlaybackStatus::Paused)
            | PlaybackEvent::StatusAndTrackChanged(PlaybackStatus::Paused, _) => self.on_pause(),

            // Wait for the next Playing or for shutdown
            PlaybackEvent::StatusChanged(PlaybackStatus::Stopped)
            | PlaybackEvent::StatusAndTrackChanged(PlaybackStatus::Stopped, _) => {}

            // Resume without metadata: nothing to start a session with
            PlaybackEvent::StatusChanged(PlaybackStatus::Playing) => {}

            PlaybackEvent::StatusAndTrackChanged(PlaybackStatus::Playing, metadata) => {
                if !self.registry.is_empty() {
                    info!(next = %metadata, "track skipped, discarding running recordings");
                    self.early_stop_all().await;
                }
                self.schedule_start(metadata);
            }

            PlaybackEvent::TrackChanged(metadata) => {
                if self.registry.is_recording(&metadata) || self.pending_track() == Some(&metadata)
                {
                    debug!(track = %metadata, "track already being recorded");
                    return;
                }
                self.schedule_start(metadata);
            }
        }
    }

    /// Wait for the next internally scheduled wakeup
    pub async fn next_wakeup(&mut self) -> Option<Wakeup> {
        self.wakeup_rx.recv().await
    }

    /// Run one scheduled wakeup.
    pub async fn handle_wakeup(&mut self, wakeup: Wakeup) {
        match wakeup {
            Wakeup::BoundaryReached(id) => self.complete_session(id).await,
            Wakeup::PauseGraceElapsed(ids) => {
                for id in ids {
                    self.early_stop(id).await;
                }
            }
            Wakeup::SettleElapsed { token, metadata } => {
                match self.pending_start.take() {
                    Some((pending, _)) if pending == token => {}
                    other => {
                        debug!(track = %metadata, "pending start superseded");
                        self.pending_start = other;
                        return;
                    }
                }
                if let Err(e) = self.start_session(metadata).await {
                    warn!(error = %e, "recording not started");
                }
            }
        }
    }

    /// Launch a capture pipeline for `metadata` and register the session.
    ///
    /// On failure nothing is registered and the orchestrator stays as it was.
    pub async fn start_session(
        &mut self,
        metadata: TrackMetadata,
    ) -> Result<SessionId, OrchestratorError> {
        let pipeline = match self.launcher.launch(&self.policy.capture_device).await {
            Ok(pipeline) => pipeline,
            Err(source) => {
                self.report(RecorderUpdate::StartFailed {
                    metadata: metadata.clone(),
                    reason: source.to_string(),
                });
                return Err(OrchestratorError::PipelineStart {
                    track: metadata.to_string(),
                    source,
                });
            }
        };

        let id = SessionId::new(self.next_session);
        self.next_session += 1;

        let delay = boundary_delay(metadata.length_micros(), self.policy.boundary_lead);
        let timer = BoundaryTimer::arm(id, delay, self.wakeup_tx.clone());
        let session = TrackSession::new(id, metadata.clone(), pipeline, timer);

        info!(
            session = %id,
            track = %metadata,
            temp = %session.temp_path().display(),
            boundary_ms = delay.as_millis(),
            "recording started"
        );

        self.registry.insert(session);
        self.report(RecorderUpdate::Started { id, metadata });
        Ok(id)
    }

    /// Discard a session without producing a file. Unknown ids are ignored.
    pub async fn early_stop(&mut self, id: SessionId) -> bool {
        let Some(session) = self.registry.remove(id) else {
            debug!(session = %id, "early stop for session that already ended");
            return false;
        };

        let metadata = session.metadata().clone();
        session.discard().await;
        info!(session = %id, track = %metadata, "recording discarded");
        self.report(RecorderUpdate::Discarded { id, metadata });
        true
    }

    /// Discard every running session
    pub async fn early_stop_all(&mut self) -> usize {
        let mut stopped = 0;
        for id in self.registry.ids() {
            if self.early_stop(id).await {
                stopped += 1;
            }
        }
        stopped
    }

    /// Drain on exit: cancel a pending start, discard all running sessions
    /// and wait for in-flight finalizations.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        self.pending_start = None;
        let discarded = self.early_stop_all().await;

        let mut awaited = 0;
        while let Some(result) = self.finalizing.join_next().await {
            awaited += 1;
            if let Err(e) = result {
                warn!(error = %e, "finalization task failed");
            }
        }

        ShutdownReport { discarded, awaited }
    }

    fn on_pause(&mut self) {
        if let Some((_, metadata)) = self.pending_start.take() {
            debug!(track = %metadata, "pending start cancelled by pause");
        }

        if self.registry.is_empty() {
            return;
        }

        let ids = self.registry.ids();
        debug!(
            sessions = ids.len(),
            grace_ms = self.policy.pause_grace.as_millis(),
            "paused, waiting before discarding"
        );
        self.schedule(self.policy.pause_grace, Wakeup::PauseGraceElapsed(ids));
    }

    fn schedule_start(&mut self, metadata: TrackMetadata) {
        let token = self.next_token;
        self.next_token += 1;
        self.pending_start = Some((token, metadata.clone()));
        self.schedule(
            self.policy.skip_settle,
            Wakeup::SettleElapsed { token, metadata },
        );
    }

    fn schedule(&self, delay: Duration, wakeup: Wakeup) {
        let tx = self.wakeup_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay.as_std()).await;
            let _ = tx.send(wakeup);
        });
    }

    async fn complete_session(&mut self, id: SessionId) {
        let Some(session) = self.registry.remove(id) else {
            debug!(session = %id, "boundary reached for session that already ended");
            return;
        };

        info!(session = %id, track = %session.metadata(), "track boundary reached");
        let recording = session.complete().await;

        let finalizer = Arc::clone(&self.finalizer);
        let updates = self.updates.clone();
        self.finalizing.spawn(async move {
            let metadata = recording.metadata().clone();
            let update = match finalizer.finalize(recording).await {
                Ok(track) => RecorderUpdate::Saved(track),
                Err(e) => {
                    warn!(track = %metadata, error = %e, "finalization failed");
                    RecorderUpdate::Failed {
                        metadata,
                        reason: e.to_string(),
                    }
                }
            };
            let _ = updates.send(update);
        });
    }

    fn reap_finalized(&mut self) {
        while let Some(result) = self.finalizing.try_join_next() {
            if let Err(e) = result {
                warn!(error = %e, "finalization task failed");
            }
        }
    }

    fn report(&self, update: RecorderUpdate) {
        let _ = self.updates.send(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CapturePipeline, TagError};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{timeout, Instant};

    #[derive(Default)]
    struct Counters {
        launches: AtomicUsize,
        stops: AtomicUsize,
        kills: AtomicUsize,
        tags: AtomicUsize,
    }

    impl Counters {
        fn get(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    struct MockPipeline {
        path: PathBuf,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl CapturePipeline for MockPipeline {
        fn output_path(&self) -> &Path {
            &self.path
        }

        fn capture_pid(&self) -> Option<u32> {
            None
        }

        async fn stop_capture(&mut self) -> Result<(), CaptureError> {
            self.counters.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn wait_encoder(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }

        async fn kill(&mut self) -> Result<(), CaptureError> {
            self.counters.kills.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockLauncher {
        dir: PathBuf,
        counters: Arc<Counters>,
        fail: bool,
    }

    #[async_trait]
    impl CaptureLauncher for MockLauncher {
        async fn launch(&self, device: &str) -> Result<Box<dyn CapturePipeline>, CaptureError> {
            assert_eq!(device, "test.monitor");
            if self.fail {
                return Err(CaptureError::ToolNotFound("parec"));
            }
            let n = self.counters.launches.fetch_add(1, Ordering::SeqCst) + 1;
            let path = self.dir.join(format!("capture-{}.mp3", n));
            std::fs::write(&path, b"audio").unwrap();
            Ok(Box::new(MockPipeline {
                path,
                counters: Arc::clone(&self.counters),
            }))
        }
    }

    struct MockTagger {
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl Tagger for MockTagger {
        async fn apply_tags(&self, _path: &Path, _metadata: &TrackMetadata) -> Result<(), TagError> {
            self.counters.tags.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        orchestrator: RecordingOrchestrator<MockLauncher, MockTagger>,
        updates: mpsc::UnboundedReceiver<RecorderUpdate>,
        counters: Arc<Counters>,
        _scratch: tempfile::TempDir,
        _output: tempfile::TempDir,
    }

    impl Harness {
        fn new(fail_launch: bool) -> Self {
            let scratch = tempfile::tempdir().unwrap();
            let output = tempfile::tempdir().unwrap();
            let counters = Arc::new(Counters::default());
            let (tx, rx) = mpsc::unbounded_channel();

            let orchestrator = RecordingOrchestrator::new(
                MockLauncher {
                    dir: scratch.path().to_path_buf(),
                    counters: Arc::clone(&counters),
                    fail: fail_launch,
                },
                Finalizer::new(
                    MockTagger {
                        counters: Arc::clone(&counters),
                    },
                    output.path(),
                    Duration::from_secs(30),
                ),
                RecordingPolicy {
                    capture_device: "test.monitor".to_string(),
                    ..Default::default()
                },
                tx,
            );

            Self {
                orchestrator,
                updates: rx,
                counters,
                _scratch: scratch,
                _output: output,
            }
        }

        async fn step(&mut self) -> Wakeup {
            let wakeup = self
                .orchestrator
                .next_wakeup()
                .await
                .expect("wakeup channel is open");
            self.orchestrator.handle_wakeup(wakeup.clone()).await;
            wakeup
        }

        async fn no_wakeup_within(&mut self, secs: u64) -> bool {
            timeout(
                std::time::Duration::from_secs(secs),
                self.orchestrator.next_wakeup(),
            )
            .await
            .is_err()
        }

        /// Play a track and wait until its session is registered
        async fn play(&mut self, metadata: TrackMetadata) -> SessionId {
            self.orchestrator
                .handle_event(PlaybackEvent::StatusAndTrackChanged(
                    PlaybackStatus::Playing,
                    metadata,
                ))
                .await;
            match self.step().await {
                Wakeup::SettleElapsed { .. } => {}
                other => panic!("expected settle wakeup, got {:?}", other),
            }
            *self.orchestrator.registry().ids().last().unwrap()
        }

        fn updates(&mut self) -> Vec<RecorderUpdate> {
            let mut out = Vec::new();
            while let Ok(update) = self.updates.try_recv() {
                out.push(update);
            }
            out
        }

        fn saved(&mut self) -> Vec<FinishedTrack> {
            self.updates()
                .into_iter()
                .filter_map(|u| match u {
                    RecorderUpdate::Saved(track) => Some(track),
                    _ => None,
                })
                .collect()
        }
    }

    fn track(title: &str, artist: &str, length_micros: i64) -> TrackMetadata {
        TrackMetadata::new(title, artist, length_micros)
    }

    #[tokio::test(start_paused = true)]
    async fn single_track_reaches_boundary_and_is_finalized() {
        let mut h = Harness::new(false);
        let id = h.play(track("A", "B", 10_000_000)).await;
        let started = Instant::now();
        assert_eq!(h.orchestrator.active_sessions(), 1);

        assert_eq!(h.step().await, Wakeup::BoundaryReached(id));
        assert_eq!(started.elapsed().as_millis(), 9_250);
        assert!(h.orchestrator.is_idle());

        let report = h.orchestrator.shutdown().await;
        assert_eq!(report, ShutdownReport { discarded: 0, awaited: 1 });

        let saved = h.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].title, "A");
        assert_eq!(saved[0].artist, "B");
        assert!(saved[0].path.ends_with("B - A.mp3"));
        assert_eq!(Counters::get(&h.counters.tags), 1);
        assert_eq!(Counters::get(&h.counters.stops), 1);
        assert_eq!(Counters::get(&h.counters.kills), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn boundary_for_three_minute_track() {
        let mut h = Harness::new(false);
        let id = h.play(track("A", "B", 180_000_000)).await;
        let started = Instant::now();

        assert_eq!(h.step().await, Wakeup::BoundaryReached(id));
        assert_eq!(started.elapsed().as_millis(), 179_250);
    }

    #[tokio::test(start_paused = true)]
    async fn track_shorter_than_lead_ends_immediately() {
        let mut h = Harness::new(false);
        let id = h.play(track("Intro", "B", 500_000)).await;
        let started = Instant::now();

        assert_eq!(h.step().await, Wakeup::BoundaryReached(id));
        assert_eq!(started.elapsed().as_millis(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_before_boundary_discards_without_finalizing() {
        let mut h = Harness::new(false);
        h.play(track("A", "B", 180_000_000)).await;

        h.orchestrator
            .handle_event(PlaybackEvent::StatusChanged(PlaybackStatus::Paused))
            .await;
        assert_eq!(h.orchestrator.active_sessions(), 1, "grace period first");

        let started = Instant::now();
        assert!(matches!(h.step().await, Wakeup::PauseGraceElapsed(_)));
        assert_eq!(started.elapsed().as_secs(), 10);
        assert!(h.orchestrator.is_idle());

        assert!(h.no_wakeup_within(300).await, "boundary timer was cancelled");
        h.orchestrator.shutdown().await;
        assert_eq!(Counters::get(&h.counters.kills), 1);
        assert_eq!(Counters::get(&h.counters.tags), 0);
        assert!(h.saved().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_near_track_end_lets_boundary_win() {
        let mut h = Harness::new(false);
        let id = h.play(track("A", "B", 5_000_000)).await;

        h.orchestrator
            .handle_event(PlaybackEvent::StatusChanged(PlaybackStatus::Paused))
            .await;

        assert_eq!(h.step().await, Wakeup::BoundaryReached(id));
        assert_eq!(h.step().await, Wakeup::PauseGraceElapsed(vec![id]));

        h.orchestrator.shutdown().await;
        assert_eq!(Counters::get(&h.counters.kills), 0);
        assert_eq!(Counters::get(&h.counters.tags), 1);
        assert_eq!(h.saved().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_discards_previous_before_starting_next() {
        let mut h = Harness::new(false);
        let first = h.play(track("A", "B", 180_000_000)).await;

        let next = track("C", "D", 200_000_000);
        h.orchestrator
            .handle_event(PlaybackEvent::StatusAndTrackChanged(
                PlaybackStatus::Playing,
                next.clone(),
            ))
            .await;
        assert!(h.orchestrator.is_idle(), "previous session is gone at once");
        assert_eq!(h.orchestrator.pending_track(), Some(&next));
        assert_eq!(Counters::get(&h.counters.kills), 1);

        assert!(matches!(h.step().await, Wakeup::SettleElapsed { .. }));
        let ids = h.orchestrator.registry().ids();
        assert_eq!(ids.len(), 1);
        assert_ne!(ids[0], first);
        let session = h.orchestrator.registry().get(ids[0]).unwrap();
        assert_eq!(session.metadata(), &next);
        assert_eq!(Counters::get(&h.counters.tags), 0);

        let updates = h.updates();
        assert!(updates
            .iter()
            .any(|u| matches!(u, RecorderUpdate::Discarded { id, .. } if *id == first)));
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_skips_start_only_the_latest_track() {
        let mut h = Harness::new(false);
        for title in ["A", "B", "C"] {
            h.orchestrator
                .handle_event(PlaybackEvent::StatusAndTrackChanged(
                    PlaybackStatus::Playing,
                    track(title, "X", 60_000_000),
                ))
                .await;
        }

        for _ in 0..3 {
            assert!(matches!(h.step().await, Wakeup::SettleElapsed { .. }));
        }

        assert_eq!(Counters::get(&h.counters.launches), 1);
        let id = h.orchestrator.registry().ids()[0];
        assert_eq!(
            h.orchestrator.registry().get(id).unwrap().metadata().title(),
            "C"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pause_during_settle_cancels_pending_start() {
        let mut h = Harness::new(false);
        h.orchestrator
            .handle_event(PlaybackEvent::StatusAndTrackChanged(
                PlaybackStatus::Playing,
                track("A", "B", 60_000_000),
            ))
            .await;
        h.orchestrator
            .handle_event(PlaybackEvent::StatusChanged(PlaybackStatus::Paused))
            .await;

        assert!(matches!(h.step().await, Wakeup::SettleElapsed { .. }));
        assert!(h.orchestrator.is_idle());
        assert_eq!(Counters::get(&h.counters.launches), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn early_stop_twice_releases_once() {
        let mut h = Harness::new(false);
        let id = h.play(track("A", "B", 60_000_000)).await;

        assert!(h.orchestrator.early_stop(id).await);
        assert!(!h.orchestrator.early_stop(id).await);
        assert_eq!(Counters::get(&h.counters.kills), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn boundary_after_early_stop_is_noop() {
        let mut h = Harness::new(false);
        let id = h.play(track("A", "B", 60_000_000)).await;

        h.orchestrator.early_stop(id).await;
        h.orchestrator
            .handle_wakeup(Wakeup::BoundaryReached(id))
            .await;

        assert_eq!(h.orchestrator.finalizing(), 0);
        assert_eq!(Counters::get(&h.counters.stops), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_every_session() {
        let mut h = Harness::new(false);
        for title in ["A", "B", "C"] {
            h.orchestrator
                .start_session(track(title, "X", 60_000_000))
                .await
                .unwrap();
        }
        assert_eq!(h.orchestrator.active_sessions(), 3);

        let report = h.orchestrator.shutdown().await;
        assert_eq!(report.discarded, 3);
        assert!(h.orchestrator.is_idle());
        assert_eq!(Counters::get(&h.counters.kills), 3);
        assert_eq!(Counters::get(&h.counters.tags), 0);
        assert!(h.saved().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn launch_failure_stays_idle() {
        let mut h = Harness::new(true);
        h.orchestrator
            .handle_event(PlaybackEvent::StatusAndTrackChanged(
                PlaybackStatus::Playing,
                track("A", "B", 60_000_000),
            ))
            .await;
        h.step().await;

        assert!(h.orchestrator.is_idle());
        assert!(h
            .updates()
            .iter()
            .any(|u| matches!(u, RecorderUpdate::StartFailed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn status_without_metadata_is_ignored() {
        let mut h = Harness::new(false);
        for status in [PlaybackStatus::Playing, PlaybackStatus::Stopped] {
            h.orchestrator
                .handle_event(PlaybackEvent::StatusChanged(status))
                .await;
        }
        assert!(h.no_wakeup_within(60).await);
        assert!(h.orchestrator.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_keeps_recording() {
        let mut h = Harness::new(false);
        h.play(track("A", "B", 60_000_000)).await;
        h.orchestrator
            .handle_event(PlaybackEvent::StatusChanged(PlaybackStatus::Stopped))
            .await;
        assert_eq!(h.orchestrator.active_sessions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn track_change_alone_adds_session_without_stopping() {
        let mut h = Harness::new(false);
        let first = track("A", "B", 60_000_000);
        h.play(first.clone()).await;

        h.orchestrator
            .handle_event(PlaybackEvent::TrackChanged(first))
            .await;
        assert!(h.orchestrator.pending_track().is_none(), "same track ignored");

        h.orchestrator
            .handle_event(PlaybackEvent::TrackChanged(track("C", "D", 60_000_000)))
            .await;
        h.step().await;

        assert_eq!(h.orchestrator.active_sessions(), 2);
        assert_eq!(Counters::get(&h.counters.kills), 0);
    }

    struct ChannelSource(mpsc::UnboundedReceiver<PlaybackEvent>);

    #[async_trait]
    impl PlaybackEventSource for ChannelSource {
        async fn next_event(&mut self) -> Option<PlaybackEvent> {
            self.0.recv().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_drives_events_and_timers() {
        let mut h = Harness::new(false);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut source = ChannelSource(rx);

        tx.send(PlaybackEvent::StatusAndTrackChanged(
            PlaybackStatus::Playing,
            track("A", "B", 10_000_000),
        ))
        .unwrap();

        let outcome = h
            .orchestrator
            .run(&mut source, tokio::time::sleep(std::time::Duration::from_secs(20)))
            .await;
        assert_eq!(outcome, RunOutcome::Shutdown);

        h.orchestrator.shutdown().await;
        assert_eq!(h.saved().len(), 1);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_returns_when_source_closes() {
        let mut h = Harness::new(false);
        let (tx, rx) = mpsc::unbounded_channel::<PlaybackEvent>();
        drop(tx);
        let mut source = ChannelSource(rx);

        let outcome = h
            .orchestrator
            .run(&mut source, std::future::pending::<()>())
            .await;
        assert_eq!(outcome, RunOutcome::SourceClosed);
    }
}
