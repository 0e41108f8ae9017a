use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("could not decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },
    /// The exchange answered with a non-zero code; the raw response is kept as-is.
    #[error("exchange rejected the request: {0}")]
    Rejected(Value),
    #[error("request signing failed: {0}")]
    Signing(String),
}

/// Answer to an order submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitAck {
    pub success: bool,
    pub order_id: Option<String>,
    /// Exchange time at which the order was accepted.
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub raw: Value,
}

/// Order details as reported by the exchange. Side fields stay in wire form so the
/// caller can validate the pair.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFill {
    pub order_id: String,
    pub avg_price: Decimal,
    pub fee: Decimal,
    pub leverage: Decimal,
    pub side: String,
    pub position_side: String,
    pub size: Decimal,
    pub filled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPosition {
    pub market: String,
    pub type_code: String,
    pub realized_pnl: Decimal,
    pub fee: Decimal,
    pub pnl: Decimal,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyBalance {
    pub currency: String,
    pub available: Decimal,
    pub equity: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountBalance {
    pub total_equity: Decimal,
    pub currencies: Vec<CurrencyBalance>,
}
