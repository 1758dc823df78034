use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{mpsc::UnboundedReceiver, oneshot};
use tracing::{debug, info, warn};

use crate::error::ReconciliationAnomaly;
use crate::order::{Order, OrderId, OrderStatus, TerminalMatcher};
use crate::pending::PendingSet;
use order_backend::StatusLookup;

/// A status result as it came off the wire, before normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatusUpdate {
    pub order_id: OrderId,
    pub status: Option<String>,
    pub detail: Option<String>,
}

impl RawStatusUpdate {
    pub fn new(order_id: OrderId, status: impl Into<String>) -> Self {
        Self {
            order_id,
            status: Some(status.into()),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// A 404 becomes an `UNKNOWN` update; the order stays pending.
    pub fn from_lookup(order_id: OrderId, lookup: StatusLookup) -> Self {
        match lookup {
            StatusLookup::Found(report) => Self {
                order_id,
                status: report.status,
                detail: report.detail,
            },
            StatusLookup::NotFound => Self::new(order_id, crate::order::UNKNOWN),
        }
    }
}

/// Receives every reconciled change to an order.
pub trait OrderObserver: Send + 'static {
    fn order_changed(&self, order: &Order);
}

impl<F> OrderObserver for F
where
    F: Fn(&Order) + Send + 'static,
{
    fn order_changed(&self, order: &Order) {
        self(order);
    }
}

pub(crate) enum ReconcilerCommand {
    /// Record a freshly accepted order; `ack` fires once it is pending, or
    /// with the anomaly if the id is already taken.
    Accepted {
        order: Order,
        ack: oneshot::Sender<Result<(), ReconciliationAnomaly>>,
    },
    Update(RawStatusUpdate),
    Observe(Box<dyn OrderObserver>),
    Snapshot(oneshot::Sender<Vec<Order>>),
}

/// Sole owner of the order records and sole writer of the pending set once
/// the tracker is running.
pub struct Reconciler {
    orders: Vec<Order>,
    index: HashMap<OrderId, usize>,
    pending: PendingSet,
    matcher: TerminalMatcher,
    observer: Option<Box<dyn OrderObserver>>,
}

impl Reconciler {
    pub fn new(pending: PendingSet, matcher: TerminalMatcher) -> Self {
        Self {
            orders: Vec::new(),
            index: HashMap::new(),
            pending,
            matcher,
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn OrderObserver>) {
        if self.observer.replace(observer).is_some() {
            debug!("Replaced order change observer");
        }
    }

    /// All records in the order they were first seen.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        self.index.get(order_id).map(|&position| &self.orders[position])
    }

    fn notify(&self, position: usize) {
        if let Some(observer) = &self.observer {
            observer.order_changed(&self.orders[position]);
        }
    }

    fn push(&mut self, order: Order) -> usize {
        let position = self.orders.len();
        self.index.insert(order.id.clone(), position);
        self.orders.push(order);
        position
    }

    /// Inserts the record, then makes it pending. Records go in before the id
    /// becomes visible to the poller, so no status update can overtake them.
    /// An id that is already tracked is refused and the existing record kept.
    pub fn record_accepted(&mut self, order: Order) -> Result<(), ReconciliationAnomaly> {
        if self.index.contains_key(&order.id) {
            let anomaly = ReconciliationAnomaly::DuplicateAcceptance(order.id);
            warn!("{anomaly}");
            return Err(anomaly);
        }

        let order_id = order.id.clone();
        let position = self.push(order);
        self.pending.insert(order_id);
        self.notify(position);
        Ok(())
    }

    /// Merges one status result. Returns whether the record changed.
    pub fn apply(&mut self, update: RawStatusUpdate) -> bool {
        let RawStatusUpdate {
            order_id,
            status,
            detail,
        } = update;

        let status = OrderStatus::normalize(status.as_deref());
        let outcome = self.matcher.classify(&status);
        let detail = detail.filter(|detail| !detail.trim().is_empty());

        let position = match self.index.get(&order_id) {
            Some(&position) => {
                let order = &mut self.orders[position];

                if order.is_terminal() && !outcome.is_terminal() {
                    debug!(
                        "Ignoring {status} for order {order_id}, already terminal with {}",
                        order.status
                    );
                    return false;
                }

                if order.status == status && order.detail == detail {
                    debug!("Order {order_id} unchanged at {status}");
                    return false;
                }

                order.status = status;
                order.outcome = outcome;
                order.detail = detail;
                order.updated_at = Utc::now();
                position
            }
            None => {
                warn!("{}", ReconciliationAnomaly::UntrackedOrder(order_id.clone()));
                self.push(Order::untracked(
                    order_id.clone(),
                    status,
                    outcome,
                    detail,
                ))
            }
        };

        if outcome.is_terminal() && self.pending.remove(&order_id) {
            info!(
                "Order {order_id} reached terminal status {}, no longer polling",
                self.orders[position].status
            );
        } else {
            debug!(
                "Order {order_id} now {}",
                self.orders[position].status
            );
        }

        self.notify(position);
        true
    }

    fn handle(&mut self, command: ReconcilerCommand) {
        match command {
            ReconcilerCommand::Accepted { order, ack } => {
                let recorded = self.record_accepted(order);
                if ack.send(recorded).is_err() {
                    debug!("Submitter went away before acceptance was acknowledged");
                }
            }
            ReconcilerCommand::Update(update) => {
                self.apply(update);
            }
            ReconcilerCommand::Observe(observer) => self.set_observer(observer),
            ReconcilerCommand::Snapshot(reply) => {
                if reply.send(self.orders.clone()).is_err() {
                    debug!("Snapshot requester went away");
                }
            }
        }
    }

    /// Applies commands one at a time until every sender is gone.
    pub(crate) async fn run(mut self, mut commands: UnboundedReceiver<ReconcilerCommand>) {
        info!("Starting order reconciler");

        while let Some(command) = commands.recv().await {
            self.handle(command);
        }

        info!("Order reconciler stopped");
    }
}
