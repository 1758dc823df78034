use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::{
    Acceptance, BackendError, NewOrder, OrderBackend, OrderId, StatusLookup, StatusReport,
};

/// How the next creation request is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedCreation {
    /// 202 with a generated `TEST_<n>` id (or the client-supplied one).
    Accept,
    /// 202 with the given id in the body.
    AcceptWithId(String),
    /// 202 with no id in the body.
    AcceptWithoutId,
    /// 400 with the given body.
    Reject(String),
    /// Transport failure.
    Unavailable(String),
}

/// How status lookups for one order are answered until re-scripted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedStatus {
    Report(StatusReport),
    NotFound,
    Unavailable(String),
}

#[derive(Debug, Default)]
struct TestState {
    order_counter: u64,
    creations: VecDeque<ScriptedCreation>,
    statuses: HashMap<OrderId, ScriptedStatus>,
    created: Vec<NewOrder>,
    status_calls: Vec<OrderId>,
    batch_calls: Vec<Vec<OrderId>>,
}

/// In-memory backend for tests and dry runs. Responses are scripted per call
/// (creation) or per order (status), and every call is recorded.
///
/// Unscripted creations are accepted; unscripted status lookups report
/// `PROCESSING`.
#[derive(Debug, Clone, Default)]
pub struct TestBackend {
    state: Arc<Mutex<TestState>>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TestState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_creation(&self, creation: ScriptedCreation) {
        self.state().creations.push_back(creation);
    }

    pub fn set_status(&self, order_id: impl Into<OrderId>, status: ScriptedStatus) {
        self.state().statuses.insert(order_id.into(), status);
    }

    pub fn report(&self, order_id: impl Into<OrderId>, status: &str) {
        self.set_status(order_id, ScriptedStatus::Report(StatusReport::new(status)));
    }

    /// Orders received by the creation endpoint, in arrival order.
    pub fn created(&self) -> Vec<NewOrder> {
        self.state().created.clone()
    }

    /// Ids looked up, one entry per single lookup and per id in a batch.
    pub fn status_calls(&self) -> Vec<OrderId> {
        self.state().status_calls.clone()
    }

    pub fn batch_calls(&self) -> Vec<Vec<OrderId>> {
        self.state().batch_calls.clone()
    }

    pub fn status_call_count(&self, order_id: &OrderId) -> usize {
        self.state()
            .status_calls
            .iter()
            .filter(|id| *id == order_id)
            .count()
    }

    fn lookup(state: &mut TestState, order_id: &OrderId) -> Result<StatusLookup, BackendError> {
        state.status_calls.push(order_id.clone());

        match state.statuses.get(order_id) {
            Some(ScriptedStatus::Report(report)) => Ok(StatusLookup::Found(report.clone())),
            Some(ScriptedStatus::NotFound) => Ok(StatusLookup::NotFound),
            Some(ScriptedStatus::Unavailable(message)) => Err(BackendError::Unavailable {
                message: message.clone(),
            }),
            None => Ok(StatusLookup::Found(StatusReport::new("PROCESSING"))),
        }
    }
}

#[async_trait]
impl OrderBackend for TestBackend {
    async fn create_order(&self, order: &NewOrder) -> Result<Acceptance, BackendError> {
        let mut state = self.state();
        let creation = state
            .creations
            .pop_front()
            .unwrap_or(ScriptedCreation::Accept);

        warn!(
            "[TEST] Create order: {} x {} ({creation:?})",
            order.quantity, order.product
        );

        match creation {
            ScriptedCreation::Accept => {
                state.created.push(order.clone());
                let id = match &order.id {
                    Some(id) => id.to_string(),
                    None => {
                        state.order_counter += 1;
                        format!("TEST_{}", state.order_counter)
                    }
                };
                Ok(Acceptance::with_id(id))
            }
            ScriptedCreation::AcceptWithId(id) => {
                state.created.push(order.clone());
                Ok(Acceptance::with_id(id))
            }
            ScriptedCreation::AcceptWithoutId => {
                state.created.push(order.clone());
                Ok(Acceptance::without_id())
            }
            ScriptedCreation::Reject(body) => Err(BackendError::Rejected { body }),
            ScriptedCreation::Unavailable(message) => Err(BackendError::Unavailable { message }),
        }
    }

    async fn order_status(&self, order_id: &OrderId) -> Result<StatusLookup, BackendError> {
        Self::lookup(&mut self.state(), order_id)
    }

    async fn order_statuses(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<(OrderId, StatusLookup)>, BackendError> {
        let mut state = self.state();
        state.batch_calls.push(order_ids.to_vec());

        let mut lookups = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            lookups.push((order_id.clone(), Self::lookup(&mut state, order_id)?));
        }

        Ok(lookups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order(product: &str) -> NewOrder {
        NewOrder {
            id: None,
            product: product.to_string(),
            quantity: 1,
        }
    }

    #[tokio::test]
    async fn test_default_creation_generates_ids() {
        let backend = TestBackend::new();

        let first = backend.create_order(&new_order("a")).await.unwrap();
        let second = backend.create_order(&new_order("b")).await.unwrap();

        assert_eq!(first.order_id(), Some(OrderId::from("TEST_1")));
        assert_eq!(second.order_id(), Some(OrderId::from("TEST_2")));
        assert_eq!(backend.created().len(), 2);
    }

    #[tokio::test]
    async fn test_default_creation_echoes_client_id() {
        let backend = TestBackend::new();
        let order = NewOrder {
            id: Some(OrderId::from("client-1")),
            ..new_order("a")
        };

        let acceptance = backend.create_order(&order).await.unwrap();
        assert_eq!(acceptance.order_id(), Some(OrderId::from("client-1")));
    }

    #[tokio::test]
    async fn test_scripted_creations_are_consumed_in_order() {
        let backend = TestBackend::new();
        backend.push_creation(ScriptedCreation::Reject("bad".to_string()));
        backend.push_creation(ScriptedCreation::AcceptWithId("xyz".to_string()));

        let error = backend.create_order(&new_order("a")).await.unwrap_err();
        assert!(matches!(error, BackendError::Rejected { .. }));

        let acceptance = backend.create_order(&new_order("a")).await.unwrap();
        assert_eq!(acceptance.order_id(), Some(OrderId::from("xyz")));
        assert_eq!(backend.created().len(), 1);
    }

    #[tokio::test]
    async fn test_status_scripts_and_call_log() {
        let backend = TestBackend::new();
        backend.report("a", "SUCESSO");
        backend.set_status("b", ScriptedStatus::NotFound);
        backend.set_status("c", ScriptedStatus::Unavailable("down".to_string()));

        assert_eq!(
            backend.order_status(&OrderId::from("a")).await.unwrap(),
            StatusLookup::Found(StatusReport::new("SUCESSO"))
        );
        assert_eq!(
            backend.order_status(&OrderId::from("b")).await.unwrap(),
            StatusLookup::NotFound
        );
        assert!(backend.order_status(&OrderId::from("c")).await.is_err());
        assert_eq!(
            backend.order_status(&OrderId::from("d")).await.unwrap(),
            StatusLookup::Found(StatusReport::new("PROCESSING"))
        );

        assert_eq!(backend.status_calls().len(), 4);
        assert_eq!(backend.status_call_count(&OrderId::from("a")), 1);
    }

    #[tokio::test]
    async fn test_batched_lookup_records_batch() {
        let backend = TestBackend::new();
        backend.report("a", "FALHA");

        let ids = vec![OrderId::from("a"), OrderId::from("b")];
        let lookups = backend.order_statuses(&ids).await.unwrap();

        assert_eq!(lookups.len(), 2);
        assert_eq!(backend.batch_calls(), vec![ids]);
    }
}
