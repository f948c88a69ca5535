//! LEXGEN Executor - Dynamic Graph Supervisor
//!
//! The state-carrying coordinator between request intake and the final
//! audit write. It owns the run state, routes work between the
//! specialised agents from the evolving state rather than a fixed
//! pipeline, enforces the three budgets, re-evaluates tenant policy at
//! every checkpoint, and seals the forensic record on termination.
//!
//! Runs execute in parallel on a pool of workers fed from a bounded
//! queue; within a run the executor is single-writer to the state and
//! subsystems communicate results back by typed return value.

mod engine;
mod ingress;
mod response;
mod routing;
mod supervisor;
pub mod telemetry;

pub use engine::{Engine, RunHandle};
pub use ingress::{build_run_state, SubmitRequest};
pub use response::{ConsumedSource, ContextSummary, RunError, RunOutcome, RunResponse};
pub use routing::{route, NextStep};
pub use supervisor::Supervisor;
