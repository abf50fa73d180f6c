//! Application layer - Use cases and port interfaces
//!
//! Contains the recording orchestrator, its session bookkeeping, the
//! finalizer and the route setup, plus the trait definitions for external
//! system interactions.

pub mod finalizer;
pub mod orchestrator;
pub mod ports;
pub mod routing;
pub mod session;

// Re-export use cases
pub use finalizer::{FinalizeError, Finalizer, FinishedTrack};
pub use orchestrator::{
    OrchestratorError, RecorderUpdate, RecordingOrchestrator, RecordingPolicy, RunOutcome,
    ShutdownReport, Wakeup,
};
pub use routing::{choose_sink, ActiveRoute, RouteRequest, RouteSetup};
pub use session::{BoundaryTimer, CompletedRecording, SessionId, SessionRegistry, TrackSession};
