use std::sync::Arc;

use chrono::Utc;
use common::config::TradingConfig;
use common::models::{ExecutionRequest, MarginMode, OrderRecord, OrderType, TradeIntent};
use exchange::{Exchange, ExchangeError};
use rust_decimal::Decimal;
use serde_json::Value;
use signal::{IntentNormalizer, NormalizationError};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Rejected(Value),
    #[error("order size {quantity} x {multiplier} is out of range")]
    SizeOverflow {
        quantity: Decimal,
        multiplier: Decimal,
    },
    #[error("order accepted without an order id: {0}")]
    MissingOrderId(Value),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

/// Places market orders and confirms them with a follow-up order query.
pub struct OrderExecutor {
    exchange: Arc<dyn Exchange>,
    normalizer: IntentNormalizer,
    margin_mode: MarginMode,
    size_multiplier: Decimal,
}

impl OrderExecutor {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        normalizer: IntentNormalizer,
        trading: &TradingConfig,
    ) -> Self {
        Self {
            exchange,
            normalizer,
            margin_mode: trading.margin_mode,
            size_multiplier: trading.size_multiplier,
        }
    }

    /// Order size is the signal quantity times the configured multiplier.
    pub fn request_for(&self, intent: &TradeIntent) -> Result<ExecutionRequest, ExecutionError> {
        let (side, position_side) = self.normalizer.forward(intent.action)?;
        let size = intent
            .quantity
            .checked_mul(self.size_multiplier)
            .ok_or(ExecutionError::SizeOverflow {
                quantity: intent.quantity,
                multiplier: self.size_multiplier,
            })?;
        Ok(ExecutionRequest {
            market: intent.market.clone(),
            margin_mode: self.margin_mode,
            side,
            position_side,
            order_type: OrderType::Market,
            size,
        })
    }

    /// One submission, no retries. A rejection comes back with the exchange payload untouched.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<OrderRecord, ExecutionError> {
        let ack = self.exchange.submit_order(request).await?;

        if !ack.success {
            error!("Order rejected by {}: {}", self.exchange.name(), ack.raw);
            return Err(ExecutionError::Rejected(ack.raw));
        }
        let Some(order_id) = ack.order_id.clone() else {
            error!("Order accepted without an order id: {}", ack.raw);
            return Err(ExecutionError::MissingOrderId(ack.raw));
        };

        let fill = self.exchange.fetch_order(&request.market, &order_id).await?;

        let mapping = self
            .normalizer
            .reverse_wire(&fill.side, &fill.position_side)
            .inspect_err(|e| {
                error!(
                    order_id = %order_id,
                    market = %request.market,
                    side = %fill.side,
                    pos_side = %fill.position_side,
                    requested_side = %request.side,
                    requested_pos_side = %request.position_side,
                    "Exchange contract drift: {}",
                    e
                )
            })?;

        let filled_at = match fill.filled_at.or(ack.acknowledged_at) {
            Some(t) => t,
            None => {
                warn!(order_id = %order_id, "No fill or acknowledgement time, using local clock");
                Utc::now()
            }
        };

        info!(
            "Order confirmed: id={} avgPx={} sz={} fee={}",
            order_id, fill.avg_price, fill.size, fill.fee
        );

        Ok(OrderRecord {
            order_id,
            action: mapping.action,
            avg_price: fill.avg_price,
            filled_at,
            fee: fill.fee,
            leverage: fill.leverage,
            side: mapping.side,
            position_side: mapping.position_side,
            size: fill.size,
            signal_time: None,
        })
    }
}
