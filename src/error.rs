//! Error taxonomy for the tracker.
//! Validation and submission errors reach the caller; poll errors and
//! reconciliation anomalies are logged and recovered from locally.

use order_backend::{BackendError, OrderId};

/// Bad order input, detected locally or reported by the backend (HTTP 400).
/// Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Product must not be empty")]
    EmptyProduct,
    #[error("Quantity must not be empty")]
    MissingQuantity,
    #[error("Invalid quantity: {0:?} is not an integer")]
    UnparseableQuantity(String),
    #[error("Invalid quantity: {0}. Quantity must be greater than zero")]
    NonPositiveQuantity(i64),
    #[error("Invalid quantity: {0} exceeds the maximum of {max}", max = u32::MAX)]
    QuantityTooLarge(i64),
    #[error("Order rejected by backend: {body}")]
    RejectedByBackend { body: String },
}

/// Failure of a submission. Nothing is recorded when submission fails, so the
/// caller may retry.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Backend error: {0}")]
    Backend(#[source] BackendError),
    #[error("Backend accepted the order but returned no id")]
    MissingOrderId,
    /// The backend handed out an id that is already tracked. The order was
    /// accepted remotely but is not tracked here.
    #[error("Backend accepted the order under id {0}, which is already tracked")]
    DuplicateOrderId(OrderId),
    #[error("Order tracker has been shut down")]
    TrackerStopped,
}

impl SubmissionError {
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<BackendError> for SubmissionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejected { body } => {
                Self::Validation(ValidationError::RejectedByBackend { body })
            }
            other => Self::Backend(other),
        }
    }
}

/// Transient failure of a status query. The order stays pending and is
/// queried again on the next cycle.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Status query for order {order_id} failed: {source}")]
    Query {
        order_id: OrderId,
        #[source]
        source: BackendError,
    },
    #[error("Batched status query for {count} orders failed: {source}")]
    BatchQuery {
        count: usize,
        #[source]
        source: BackendError,
    },
    #[error("Reconciler is no longer accepting status updates")]
    ReconcilerClosed,
}

/// Unexpected but recoverable situations met while reconciling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconciliationAnomaly {
    #[error("Status update for untracked order {0}, creating its record")]
    UntrackedOrder(OrderId),
    #[error("Order {0} was accepted twice, keeping the existing record")]
    DuplicateAcceptance(OrderId),
}
