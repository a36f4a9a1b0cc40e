//! The asynchronous accrual pipeline.
//!
//! A dispatcher owns a bounded pool of workers plus two bounded FIFO
//! hand-off queues. Each cycle it either drains probe results into one
//! transactional store batch or discovers trackable orders and fans them
//! out; a global backoff gate parks the whole pool when the accrual
//! service asks for a pause.

pub mod backoff;
pub mod dispatcher;
pub mod worker;

pub use backoff::BackoffGate;
pub use dispatcher::{Dispatcher, StopHandle};
pub use worker::Worker;
