//! loyaltyd — loyalty-points backend.
//!
//! Users register order numbers; an external accrual service computes reward
//! points asynchronously; accrued points can be withdrawn against further
//! orders. The interesting part is the accrual pipeline: a bounded worker
//! pool driven by a dispatcher that polls the external service until every
//! order reaches a terminal status, crediting points transactionally.
//!
//! # Modules
//!
//! - [`config`] - CLI/env configuration
//! - [`logging`] - tracing setup
//! - [`db`] - Postgres pool and migrations
//! - [`models`] - domain types (orders, balances, watch rows)
//! - [`luhn`] - order-number checksum
//! - [`auth`] - password hashing and session tokens
//! - [`store`] - transactional persistence
//! - [`accrual`] - probe client for the external accrual service
//! - [`pipeline`] - dispatcher, worker pool and backoff gate
//! - [`service`] - facades used by handlers and the dispatcher
//! - [`gateway`] - axum HTTP surface

pub mod accrual;
pub mod auth;
pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod luhn;
pub mod models;
pub mod pipeline;
pub mod service;
pub mod store;

pub use config::Config;
pub use models::{AccrualStatus, Balance, Order, OrderStatus, User, WatchedOrder, WithdrawalEntry};
