//! Reader sessions of the labgate access point.
//!
//! This crate holds the per-door logic and its supervision:
//!
//! - [`state`]: the session lifecycle states and their validated transitions
//! - [`debounce`]: suppression of repeated reads of a card left on the reader
//! - [`escalation`]: error counting, bounded restarts and the one supervisory
//!   reinitialization
//! - [`session`]: [`ReaderSession`], one per door, driving its reader through
//!   the shared multiplexer
//! - [`collaborators`]: the decision service, door strike and event sink a
//!   session reports to, and the feedback shown after a scan
//! - [`display`]: the idle screen refresher
//! - [`orchestrator`]: spawns every session and stops them on shutdown

pub mod collaborators;
pub mod debounce;
pub mod display;
pub mod escalation;
pub mod orchestrator;
pub mod session;
pub mod state;

pub use collaborators::{AccessSettings, Collaborators, Feedback};
pub use debounce::ScanDebouncer;
pub use display::{IdleDisplayRefresher, idle_screen};
pub use escalation::{Escalation, FailureEscalation, Restart};
pub use orchestrator::{Orchestrator, OrchestratorHandle, ShutdownReport};
pub use session::{ReaderSession, SessionReport, SessionStats, Step};
pub use state::{SessionError, SessionState, SessionStateMachine, StateTransition};
