use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod error;
pub mod http;
pub mod order;
pub mod test;

pub use error::BackendError;
pub use http::{HttpBackend, HttpBackendConfig, RequestFields};
pub use order::{Acceptance, NewOrder, StatusLookup, StatusReport};
pub use test::{ScriptedCreation, ScriptedStatus, TestBackend};

/// Opaque order identifier, either assigned by the backend or generated by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Remote service that accepts orders and reports their processing status.
#[async_trait]
pub trait OrderBackend: Send + Sync + 'static {
    /// Send a creation request. `Ok` means the backend accepted the order (202)
    /// and will process it out-of-band.
    async fn create_order(&self, order: &NewOrder) -> Result<Acceptance, BackendError>;

    /// Look up the current status of a single order.
    async fn order_status(&self, order_id: &OrderId) -> Result<StatusLookup, BackendError>;

    /// Look up several orders with one request. Every requested id gets exactly
    /// one entry in the result; ids the backend did not report are `NotFound`.
    async fn order_statuses(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<(OrderId, StatusLookup)>, BackendError>;
}
