//! Poll-cycle coordinator: discovers trackable orders, fans tasks out to the
//! worker pool and batches status updates back into the store.

use super::backoff::BackoffGate;
use super::worker::Worker;
use crate::accrual::AccrualClient;
use crate::models::WatchedOrder;
use crate::service::{OrderService, OrderServiceError};
use crossbeam_queue::ArrayQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Idempotent stop switch, callable from any task.
#[derive(Clone)]
pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.0.send(true);
    }
}

pub struct Dispatcher {
    orders: OrderService,
    client: Arc<AccrualClient>,
    pool_size: usize,
    ping_interval: Duration,
    tasks: Arc<ArrayQueue<WatchedOrder>>,
    results: Arc<ArrayQueue<WatchedOrder>>,
    gate: Arc<BackoffGate>,
    stop_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(
        orders: OrderService,
        client: AccrualClient,
        pool_size: usize,
        ping_interval: Duration,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            orders,
            client: Arc::new(client),
            pool_size,
            ping_interval,
            tasks: Arc::new(ArrayQueue::new(pool_size)),
            results: Arc::new(ArrayQueue::new(pool_size)),
            gate: Arc::new(BackoffGate::new()),
            stop_tx,
            workers: Vec::new(),
        }
    }

    /// The shared backoff gate; workers engage it on a rate-limit directive.
    pub fn gate(&self) -> Arc<BackoffGate> {
        self.gate.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop_tx.clone())
    }

    /// Drive the poll cycle until stopped. Per tick, in priority order:
    /// shutdown, drain pending results, discover new tasks. Only discovery
    /// is suspended while the backoff gate is engaged: committing a batch
    /// never touches the accrual service, so results collected before the
    /// rate-limit hit still land without waiting out the rest period.
    pub async fn run(mut self) {
        info!(
            workers = self.pool_size,
            interval_ms = self.ping_interval.as_millis() as u64,
            "accrual dispatcher starting"
        );
        self.hire_workers();
        let mut stop_rx = self.stop_tx.subscribe();

        loop {
            if *stop_rx.borrow() {
                break;
            }

            // Results before new work, so a busy accrual service cannot
            // pile updates up unreservedly.
            if let Some(first) = self.results.pop() {
                let batch = self.collect_batch(first);
                self.commit(&batch).await;
            } else if let Some(until) = self.gate.active_until() {
                // No discovery against a resting pool. Keep ticking at the
                // usual interval so results from probes that were already
                // in flight still drain.
                let tick = Instant::now() + self.ping_interval;
                tokio::select! {
                    _ = tokio::time::sleep_until(until.min(tick)) => {}
                    _ = stop_rx.wait_for(|stopped| *stopped) => {}
                }
                continue;
            } else if let Err(err) = self.discover().await {
                error!(error = %err, "discovery sweep failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.ping_interval) => {}
                _ = stop_rx.wait_for(|stopped| *stopped) => {}
            }
        }

        self.shutdown().await;
    }

    fn hire_workers(&mut self) {
        for id in 0..self.pool_size {
            let worker = Worker::new(
                id,
                self.client.clone(),
                self.tasks.clone(),
                self.results.clone(),
                self.gate.clone(),
                self.stop_tx.subscribe(),
            );
            self.workers.push(tokio::spawn(worker.run()));
        }
    }

    /// Fetch every trackable order and enqueue as many as the task queue
    /// takes. Orders that do not fit are re-fetched next cycle.
    async fn discover(&self) -> Result<(), OrderServiceError> {
        let watched = self.orders.trackable_orders().await?;
        let mut queued = 0usize;
        for order in watched {
            if self.tasks.push(order).is_err() {
                break;
            }
            queued += 1;
        }
        if queued > 0 {
            debug!(queued, "enqueued poll tasks");
        }
        Ok(())
    }

    /// Drain whatever is immediately available behind `first`, capped at the
    /// pool size.
    fn collect_batch(&self, first: WatchedOrder) -> Vec<WatchedOrder> {
        let mut batch = Vec::with_capacity(self.pool_size);
        batch.push(first);
        while batch.len() < self.pool_size {
            match self.results.pop() {
                Some(order) => batch.push(order),
                None => break,
            }
        }
        batch
    }

    async fn commit(&self, batch: &[WatchedOrder]) {
        debug!(count = batch.len(), "committing status updates");
        if let Err(err) = self.orders.apply_updates(batch).await {
            // The affected orders stay trackable and retry next sweep.
            error!(error = %err, count = batch.len(), "failed to commit update batch");
        }
    }

    /// Stop every worker, wait for in-flight probes to finish, then flush
    /// results that made it into the queue. Queued tasks are dropped; they
    /// are re-discovered on the next start.
    async fn shutdown(&mut self) {
        let _ = self.stop_tx.send(true);
        for handle in self.workers.drain(..) {
            if let Err(err) = handle.await {
                error!(error = %err, "worker task failed");
            }
        }

        let mut batch = Vec::new();
        while let Some(order) = self.results.pop() {
            batch.push(order);
        }
        if !batch.is_empty() {
            info!(count = batch.len(), "flushing final update batch");
            self.commit(&batch).await;
        }
        info!("accrual dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccrualStatus;
    use crate::store::Store;
    use sqlx::postgres::PgPoolOptions;

    fn test_dispatcher(pool_size: usize) -> Dispatcher {
        // Lazy pool: never connects unless a query runs.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let store = Arc::new(Store::new(pool, Duration::from_secs(1)));
        Dispatcher::new(
            OrderService::new(store),
            AccrualClient::new("http://localhost:8080"),
            pool_size,
            Duration::from_millis(500),
        )
    }

    fn watched(n: u32) -> WatchedOrder {
        WatchedOrder {
            id: n as i64,
            order_number: format!("order-{n}"),
            user_id: 1,
            last_status: AccrualStatus::Processing,
            last_accrual: None,
        }
    }

    #[tokio::test]
    async fn batch_is_capped_at_pool_size() {
        let dispatcher = test_dispatcher(4);
        for n in 0..4 {
            dispatcher.results.push(watched(n)).unwrap();
        }

        let first = dispatcher.results.pop().unwrap();
        let batch = dispatcher.collect_batch(first);
        assert_eq!(batch.len(), 4);
        assert_eq!(batch[0].order_number, "order-0");
        assert_eq!(batch[3].order_number, "order-3");
    }

    #[tokio::test]
    async fn batch_takes_only_what_is_ready() {
        let dispatcher = test_dispatcher(8);
        dispatcher.results.push(watched(0)).unwrap();
        dispatcher.results.push(watched(1)).unwrap();

        let first = dispatcher.results.pop().unwrap();
        let batch = dispatcher.collect_batch(first);
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_joins_workers() {
        let dispatcher = test_dispatcher(2);
        let stop = dispatcher.stop_handle();
        let task = tokio::spawn(dispatcher.run());

        stop.stop();
        stop.stop();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("dispatcher should stop promptly")
            .unwrap();
    }
}
