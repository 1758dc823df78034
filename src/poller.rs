use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc::UnboundedSender, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::error::PollError;
use crate::order::OrderId;
use crate::pending::PendingSet;
use crate::reconciler::{RawStatusUpdate, ReconcilerCommand};
use order_backend::OrderBackend;

/// How pending orders are queried each cycle.
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollStrategy {
    /// One `GET <base>/status/{id}` per pending order, each on its own task.
    #[default]
    PerOrder,
    /// One `GET <base>/status?ids=...` covering every pending order.
    Batched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub polling_interval: Duration,
    /// Upper bound of the random delay before each per-order query.
    pub max_jitter: Duration,
    pub strategy: PollStrategy,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_secs(3),
            max_jitter: Duration::ZERO,
            strategy: PollStrategy::PerOrder,
        }
    }
}

/// Periodically queries the status of every pending order and forwards the
/// raw results to the reconciler. Never mutates order state itself.
pub(crate) struct StatusPoller<B: OrderBackend + ?Sized> {
    config: PollerConfig,
    backend: Arc<B>,
    pending: PendingSet,
    updates: UnboundedSender<ReconcilerCommand>,
    interval: Interval,
    shutdown_rx: watch::Receiver<bool>,
    in_flight: JoinSet<()>,
}

impl<B: OrderBackend + ?Sized> StatusPoller<B> {
    pub(crate) fn new(
        config: PollerConfig,
        backend: Arc<B>,
        pending: PendingSet,
        updates: UnboundedSender<ReconcilerCommand>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let period = config.polling_interval.max(Duration::from_millis(1));
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            config,
            backend,
            pending,
            updates,
            interval,
            shutdown_rx,
            in_flight: JoinSet::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        info!(
            "Starting order status poller with interval: {:?} ({:?})",
            self.config.polling_interval, self.config.strategy
        );

        loop {
            if *self.shutdown_rx.borrow() {
                info!("Received shutdown signal, stopping order poller");
                break;
            }

            tokio::select! {
                biased;
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() {
                        info!("Shutdown handle dropped, stopping order poller");
                        break;
                    }
                }
                _ = self.interval.tick() => self.poll_pending_orders(),
            }

            self.reap_finished_queries();
        }

        if !self.in_flight.is_empty() {
            debug!("Abandoning {} in-flight status queries", self.in_flight.len());
        }
        self.in_flight.abort_all();
    }

    fn reap_finished_queries(&mut self) {
        while let Some(result) = self.in_flight.try_join_next() {
            if let Some(e) = result.err().filter(JoinError::is_panic) {
                error!("Status query task panicked: {e}");
            }
        }
    }

    fn poll_pending_orders(&mut self) {
        let order_ids = self.pending.snapshot();

        if order_ids.is_empty() {
            debug!("No pending orders to poll");
            return;
        }

        debug!("Polling {} pending orders", order_ids.len());

        match self.config.strategy {
            PollStrategy::PerOrder => {
                for order_id in order_ids {
                    let delay = self.jitter();
                    let backend = Arc::clone(&self.backend);
                    let updates = self.updates.clone();

                    self.in_flight.spawn(async move {
                        if let Err(e) = query_order(&*backend, order_id, delay, &updates).await {
                            warn!("{e}, retrying next cycle");
                        }
                    });
                }
            }
            PollStrategy::Batched => {
                let backend = Arc::clone(&self.backend);
                let updates = self.updates.clone();

                self.in_flight.spawn(async move {
                    if let Err(e) = query_batch(&*backend, &order_ids, &updates).await {
                        warn!("{e}, retrying next cycle");
                    }
                });
            }
        }
    }

    fn jitter(&self) -> Duration {
        let max_millis = u64::try_from(self.config.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_millis == 0 {
            return Duration::ZERO;
        }

        Duration::from_millis(rand::thread_rng().gen_range(0..max_millis))
    }
}

fn forward(
    updates: &UnboundedSender<ReconcilerCommand>,
    update: RawStatusUpdate,
) -> Result<(), PollError> {
    updates
        .send(ReconcilerCommand::Update(update))
        .map_err(|_| PollError::ReconcilerClosed)
}

async fn query_order<B: OrderBackend + ?Sized>(
    backend: &B,
    order_id: OrderId,
    delay: Duration,
    updates: &UnboundedSender<ReconcilerCommand>,
) -> Result<(), PollError> {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let lookup = match backend.order_status(&order_id).await {
        Ok(lookup) => lookup,
        Err(source) => return Err(PollError::Query { order_id, source }),
    };

    forward(updates, RawStatusUpdate::from_lookup(order_id, lookup))
}

async fn query_batch<B: OrderBackend + ?Sized>(
    backend: &B,
    order_ids: &[OrderId],
    updates: &UnboundedSender<ReconcilerCommand>,
) -> Result<(), PollError> {
    let lookups = backend
        .order_statuses(order_ids)
        .await
        .map_err(|source| PollError::BatchQuery {
            count: order_ids.len(),
            source,
        })?;

    for (order_id, lookup) in lookups {
        forward(updates, RawStatusUpdate::from_lookup(order_id, lookup))?;
    }

    Ok(())
}
