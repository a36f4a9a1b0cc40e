use crate::db::Database;
use crate::service::{BalanceService, OrderService, UserService};
use std::sync::Arc;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub users: UserService,
    pub orders: OrderService,
    pub balances: BalanceService,
}
