//! Domain types shared across the store, the pipeline and the HTTP surface.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle of an order on our side.
///
/// INVALID and PROCESSED are terminal: once reached, the order leaves the
/// polling watch-list and its accrual (if any) has been credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(OrderStatus::New),
            "PROCESSING" => Some(OrderStatus::Processing),
            "INVALID" => Some(OrderStatus::Invalid),
            "PROCESSED" => Some(OrderStatus::Processed),
            _ => None,
        }
    }
}

/// Status vocabulary of the external accrual service.
///
/// REGISTERED never reaches the order table: an order only leaves NEW through
/// the pipeline, so REGISTERED maps to NEW there. The watch row keeps the
/// external value verbatim so change detection sees REGISTERED → PROCESSING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl AccrualStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AccrualStatus::Invalid | AccrualStatus::Processed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccrualStatus::Registered => "REGISTERED",
            AccrualStatus::Processing => "PROCESSING",
            AccrualStatus::Invalid => "INVALID",
            AccrualStatus::Processed => "PROCESSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            // NEW shows up here because watched_order.last_status defaults
            // to it before the first probe answers.
            "NEW" | "REGISTERED" => Some(AccrualStatus::Registered),
            "PROCESSING" => Some(AccrualStatus::Processing),
            "INVALID" => Some(AccrualStatus::Invalid),
            "PROCESSED" => Some(AccrualStatus::Processed),
            _ => None,
        }
    }

    /// Projection onto the order-table vocabulary.
    pub fn as_order_status(self) -> OrderStatus {
        match self {
            AccrualStatus::Registered => OrderStatus::New,
            AccrualStatus::Processing => OrderStatus::Processing,
            AccrualStatus::Invalid => OrderStatus::Invalid,
            AccrualStatus::Processed => OrderStatus::Processed,
        }
    }
}

/// A registered user. The password field carries the argon2 PHC string.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
}

/// Per-user points pair. `current` never goes negative; `withdrawn` only grows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Balance {
    pub current: Decimal,
    pub withdrawn: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    #[serde(skip)]
    pub id: i64,
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip)]
    pub user_id: i64,
}

/// Polling-state projection of an order, as it travels
/// dispatcher → worker → dispatcher. The fields mirror the watch row; the
/// last-seen pair is what a worker diffs a probe reply against.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchedOrder {
    pub id: i64,
    pub order_number: String,
    pub user_id: i64,
    pub last_status: AccrualStatus,
    pub last_accrual: Option<Decimal>,
}

/// Append-only withdrawal ledger row.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalEntry {
    #[serde(rename = "order")]
    pub order_number: String,
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
    #[serde(skip)]
    pub user_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Invalid.is_terminal());
        assert!(OrderStatus::Processed.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
    }

    #[test]
    fn registered_maps_to_new() {
        assert_eq!(
            AccrualStatus::Registered.as_order_status(),
            OrderStatus::New
        );
        assert_eq!(
            AccrualStatus::Processed.as_order_status(),
            OrderStatus::Processed
        );
    }

    #[test]
    fn status_text_round_trip() {
        for s in [
            OrderStatus::New,
            OrderStatus::Processing,
            OrderStatus::Invalid,
            OrderStatus::Processed,
        ] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::parse("REGISTERED"), None);
        assert_eq!(AccrualStatus::parse("NEW"), Some(AccrualStatus::Registered));
    }

    #[test]
    fn order_json_omits_null_accrual() {
        let order = Order {
            id: 1,
            number: "12345678903".into(),
            status: OrderStatus::New,
            accrual: None,
            uploaded_at: Utc::now(),
            user_id: 7,
        };
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("accrual").is_none());
        assert_eq!(json["status"], "NEW");
        assert_eq!(json["number"], "12345678903");

        let order = Order {
            accrual: Some(Decimal::new(1505, 1)),
            status: OrderStatus::Processed,
            ..order
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["accrual"], serde_json::json!(150.5));
    }
}
