use std::sync::Arc;
use tokio::sync::{
    mpsc::{self, UnboundedSender},
    oneshot, watch,
};
use tracing::{debug, info};

use crate::error::SubmissionError;
use crate::order::{Order, OrderId, TerminalMatcher};
use crate::pending::PendingSet;
use crate::poller::{PollerConfig, StatusPoller};
use crate::reconciler::{OrderObserver, Reconciler, ReconcilerCommand};
use crate::submission::{IdAssignment, OrderRequest, submit_order};
use order_backend::OrderBackend;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerConfig {
    pub poller: PollerConfig,
    pub id_assignment: IdAssignment,
    pub terminal: TerminalMatcher,
}

/// Submits orders to a backend and tracks them until they reach a terminal
/// status. Owns the poll and reconcile tasks; dropping it shuts polling down.
///
/// Must be started inside a tokio runtime.
pub struct OrderTracker<B: OrderBackend + ?Sized> {
    backend: Arc<B>,
    id_assignment: IdAssignment,
    pending: PendingSet,
    commands: UnboundedSender<ReconcilerCommand>,
    shutdown_tx: watch::Sender<bool>,
}

impl<B: OrderBackend + ?Sized> OrderTracker<B> {
    pub fn start(backend: Arc<B>, config: TrackerConfig) -> Self {
        let pending = PendingSet::new();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let reconciler = Reconciler::new(pending.clone(), config.terminal);
        tokio::spawn(reconciler.run(command_rx));

        let poller = StatusPoller::new(
            config.poller,
            Arc::clone(&backend),
            pending.clone(),
            commands.clone(),
            shutdown_rx,
        );
        tokio::spawn(poller.run());

        Self {
            backend,
            id_assignment: config.id_assignment,
            pending,
            commands,
            shutdown_tx,
        }
    }

    /// Registers the observer for every reconciled change, replacing any
    /// previous one. Called on the reconciler task, one change at a time.
    ///
    /// Only changes are reported: a poll result identical to the current
    /// status and detail, or a non-terminal result for a finished order,
    /// produces no call. There is no per-cycle heartbeat.
    pub fn on_order_changed<O: OrderObserver>(&self, observer: O) {
        if self
            .commands
            .send(ReconcilerCommand::Observe(Box::new(observer)))
            .is_err()
        {
            debug!("Reconciler stopped, observer not registered");
        }
    }

    pub async fn submit(&self, product: &str, quantity: i64) -> Result<OrderId, SubmissionError> {
        let request = OrderRequest::new(product, quantity)?;
        self.submit_request(&request).await
    }

    /// On success the order is recorded as `RECEIVED` and pending before this
    /// returns. On failure nothing is recorded; if the backend reuses an id
    /// that is already tracked the existing record is kept and
    /// `DuplicateOrderId` is returned.
    pub async fn submit_request(&self, request: &OrderRequest) -> Result<OrderId, SubmissionError> {
        if self.is_shut_down() {
            return Err(SubmissionError::TrackerStopped);
        }

        let order_id = submit_order(&*self.backend, request, self.id_assignment).await?;

        let (ack, acked) = oneshot::channel();
        self.commands
            .send(ReconcilerCommand::Accepted {
                order: Order::accepted(order_id.clone(), request),
                ack,
            })
            .map_err(|_| SubmissionError::TrackerStopped)?;
        acked
            .await
            .map_err(|_| SubmissionError::TrackerStopped)?
            .map_err(|_| SubmissionError::DuplicateOrderId(order_id.clone()))?;

        info!(
            "Order {order_id} accepted: {} x {}",
            request.quantity(),
            request.product()
        );

        Ok(order_id)
    }

    /// Every record, in the order first seen.
    pub async fn orders(&self) -> Vec<Order> {
        let (reply, snapshot) = oneshot::channel();
        if self.commands.send(ReconcilerCommand::Snapshot(reply)).is_err() {
            return Vec::new();
        }

        snapshot.await.unwrap_or_default()
    }

    pub fn pending_ids(&self) -> Vec<OrderId> {
        self.pending.snapshot()
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Stops polling. Queries in flight are abandoned. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!(
                "Shutting down order tracker with {} pending orders",
                self.pending.len()
            );
        }
    }
}

impl<B: OrderBackend + ?Sized> Drop for OrderTracker<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
