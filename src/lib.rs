//! Client-side tracking of asynchronously processed orders.
//!
//! Orders are submitted to a backend that answers `202 Accepted` and processes
//! them out-of-band. The [`OrderTracker`] records each accepted order, polls its
//! status until it reaches a terminal state, and reports every change to a
//! registered observer.

pub mod cli;
pub mod env;
mod error;
mod order;
mod pending;
mod poller;
mod reconciler;
mod submission;
mod tracker;

pub use env::{Env, LogLevel, setup_tracing};
pub use error::{PollError, ReconciliationAnomaly, SubmissionError, ValidationError};
pub use order::{Order, OrderId, OrderStatus, Outcome, RECEIVED, TerminalMatcher, UNKNOWN};
pub use order_backend::{
    BackendError, HttpBackend, HttpBackendConfig, OrderBackend, RequestFields, StatusLookup,
    StatusReport,
};
pub use pending::PendingSet;
pub use poller::{PollStrategy, PollerConfig};
pub use reconciler::{OrderObserver, RawStatusUpdate, Reconciler};
pub use submission::{IdAssignment, OrderRequest};
pub use tracker::{OrderTracker, TrackerConfig};
