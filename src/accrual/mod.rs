//! Single-order probes of the external accrual service.

mod client;

pub use client::{AccrualClient, ProbeError, ProbeReply};
