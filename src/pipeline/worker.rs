//! Accrual poll worker: consumes one task, probes the external service,
//! emits a result when the status moved.

use crate::accrual::{AccrualClient, ProbeReply};
use crate::models::WatchedOrder;
use crate::pipeline::backoff::BackoffGate;
use crossbeam_queue::ArrayQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Nap between queue polls when no task is ready.
const POLL_TICK: Duration = Duration::from_millis(50);

pub struct Worker {
    id: usize,
    client: Arc<AccrualClient>,
    tasks: Arc<ArrayQueue<WatchedOrder>>,
    results: Arc<ArrayQueue<WatchedOrder>>,
    gate: Arc<BackoffGate>,
    stop: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        id: usize,
        client: Arc<AccrualClient>,
        tasks: Arc<ArrayQueue<WatchedOrder>>,
        results: Arc<ArrayQueue<WatchedOrder>>,
        gate: Arc<BackoffGate>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            client,
            tasks,
            results,
            gate,
            stop,
        }
    }

    pub async fn run(mut self) {
        loop {
            // Honor the global gate before taking new work; a stop signal
            // cuts through an active backoff.
            tokio::select! {
                _ = self.gate.ready() => {}
                _ = self.stop.wait_for(|stopped| *stopped) => break,
            }
            if *self.stop.borrow() {
                break;
            }

            match self.tasks.pop() {
                Some(task) => self.handle(task).await,
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(POLL_TICK) => {}
                        _ = self.stop.wait_for(|stopped| *stopped) => break,
                    }
                }
            }
        }
        debug!(worker = self.id, "worker stopped");
    }

    async fn handle(&self, mut task: WatchedOrder) {
        match self.client.probe(&task.order_number).await {
            Ok(ProbeReply::Status { status, accrual }) => {
                if status == task.last_status && accrual == task.last_accrual {
                    // Nothing moved since the last sweep.
                    return;
                }
                task.last_status = status;
                task.last_accrual = accrual;
                debug!(
                    worker = self.id,
                    order = %task.order_number,
                    status = status.as_str(),
                    "status changed, queueing update"
                );
                if self.results.push(task).is_err() {
                    // Full result queue: the order stays trackable and the
                    // next discovery sweep retries it.
                    debug!(worker = self.id, "result queue full, dropping update");
                }
            }
            Ok(ProbeReply::RateLimited(period)) => {
                debug!(
                    worker = self.id,
                    secs = period.as_secs(),
                    "rate limited by accrual service, engaging backoff"
                );
                self.gate.engage(period);
            }
            Ok(ProbeReply::NotFound) => {
                debug!(
                    worker = self.id,
                    order = %task.order_number,
                    "order not known to accrual service yet"
                );
            }
            Err(err) => {
                warn!(
                    worker = self.id,
                    order = %task.order_number,
                    error = %err,
                    "probe failed, order will be re-discovered"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccrualStatus;
    use rust_decimal::Decimal;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn watched(number: &str, last_status: AccrualStatus) -> WatchedOrder {
        WatchedOrder {
            id: 1,
            order_number: number.to_string(),
            user_id: 7,
            last_status,
            last_accrual: None,
        }
    }

    struct Rig {
        tasks: Arc<ArrayQueue<WatchedOrder>>,
        results: Arc<ArrayQueue<WatchedOrder>>,
        gate: Arc<BackoffGate>,
        stop_tx: watch::Sender<bool>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn spawn_worker(server: &MockServer) -> Rig {
        let tasks = Arc::new(ArrayQueue::new(4));
        let results = Arc::new(ArrayQueue::new(4));
        let gate = Arc::new(BackoffGate::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let worker = Worker::new(
            0,
            Arc::new(AccrualClient::new(server.uri())),
            tasks.clone(),
            results.clone(),
            gate.clone(),
            stop_rx,
        );
        let handle = tokio::spawn(worker.run());

        Rig {
            tasks,
            results,
            gate,
            stop_tx,
            handle,
        }
    }

    async fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if done() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn forwards_a_changed_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/12345678903"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "order": "12345678903",
                "status": "PROCESSED",
                "accrual": 150
            })))
            .mount(&server)
            .await;

        let rig = spawn_worker(&server);
        rig.tasks
            .push(watched("12345678903", AccrualStatus::Registered))
            .unwrap();

        assert!(wait_until(|| !rig.results.is_empty()).await);
        let update = rig.results.pop().unwrap();
        assert_eq!(update.last_status, AccrualStatus::Processed);
        assert_eq!(update.last_accrual, Some(Decimal::from(150)));

        rig.stop_tx.send(true).unwrap();
        rig.handle.await.unwrap();
    }

    #[tokio::test]
    async fn drops_an_unchanged_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/12345678903"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "order": "12345678903",
                "status": "PROCESSING"
            })))
            .mount(&server)
            .await;

        let rig = spawn_worker(&server);
        rig.tasks
            .push(watched("12345678903", AccrualStatus::Processing))
            .unwrap();

        assert!(wait_until(|| rig.tasks.is_empty()).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rig.results.is_empty());

        rig.stop_tx.send(true).unwrap();
        rig.handle.await.unwrap();
    }

    #[tokio::test]
    async fn rate_limit_engages_the_gate_without_a_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/12345678903"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&server)
            .await;

        let rig = spawn_worker(&server);
        rig.tasks
            .push(watched("12345678903", AccrualStatus::Registered))
            .unwrap();

        assert!(wait_until(|| rig.gate.active_until().is_some()).await);
        assert!(rig.results.is_empty());

        // Stop cuts through the engaged backoff.
        rig.stop_tx.send(true).unwrap();
        rig.handle.await.unwrap();
    }

    #[tokio::test]
    async fn transient_failure_drops_the_task() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/12345678903"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let rig = spawn_worker(&server);
        rig.tasks
            .push(watched("12345678903", AccrualStatus::Registered))
            .unwrap();

        assert!(wait_until(|| rig.tasks.is_empty()).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rig.results.is_empty());
        assert!(rig.gate.active_until().is_none());

        rig.stop_tx.send(true).unwrap();
        rig.handle.await.unwrap();
    }
}
