use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use common::config::TradingConfig;
use common::models::{
    ExecutionRequest, InstrumentType, MarginMode, PositionMode, TradeAction, TradeIntent,
};
use exchange::{AccountBalance, ClosedPosition, Exchange, ExchangeError, OrderFill, SubmitAck};
use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use crate::services::notifier::Notifier;

mock! {
    pub Exchange {}

    #[async_trait]
    impl Exchange for Exchange {
        fn name(&self) -> &'static str;
        async fn submit_order(&self, request: &ExecutionRequest) -> Result<SubmitAck, ExchangeError>;
        async fn fetch_order(&self, market: &str, order_id: &str) -> Result<OrderFill, ExchangeError>;
        async fn fetch_closed_positions(
            &self,
            instrument_type: InstrumentType,
        ) -> Result<Vec<ClosedPosition>, ExchangeError>;
        async fn set_leverage(
            &self,
            market: &str,
            margin_mode: MarginMode,
            leverage: u32,
        ) -> Result<(), ExchangeError>;
        async fn set_position_mode(&self, mode: PositionMode) -> Result<(), ExchangeError>;
        async fn get_balance(&self) -> Result<AccountBalance, ExchangeError>;
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, destination: i64, text: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((destination, text.to_string()));
        Ok(())
    }
}

pub const NOTIFY_CHAT: i64 = -1002143229912;

pub fn millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

pub fn trading_config() -> TradingConfig {
    TradingConfig::default()
}

pub fn intent(action: TradeAction, quantity: Decimal) -> TradeIntent {
    TradeIntent {
        action,
        quantity,
        market: "BTC-USDT-SWAP".to_string(),
        source_payload: json!({"data": [{"ts": "1700000000000"}]}),
        message_id: 1,
        observed_at: millis(1_700_000_000_400),
        captured_at: millis(1_700_000_000_500),
    }
}

pub fn accepted(order_id: &str) -> SubmitAck {
    SubmitAck {
        success: true,
        order_id: Some(order_id.to_string()),
        acknowledged_at: Some(millis(1_700_000_001_000)),
        raw: json!({"code": "0", "data": [{"ordId": order_id, "sCode": "0"}]}),
    }
}

pub fn fill(order_id: &str, side: &str, position_side: &str) -> OrderFill {
    OrderFill {
        order_id: order_id.to_string(),
        avg_price: dec!(43000),
        fee: dec!(-0.258),
        leverage: dec!(50),
        side: side.to_string(),
        position_side: position_side.to_string(),
        size: dec!(12),
        filled_at: Some(millis(1_700_000_001_500)),
    }
}

pub fn closed_position(type_code: &str) -> ClosedPosition {
    ClosedPosition {
        market: "BTC-USDT-SWAP".to_string(),
        type_code: type_code.to_string(),
        realized_pnl: dec!(10.5),
        fee: dec!(-0.5),
        pnl: dec!(11),
        updated_at: Some(millis(1_700_000_020_000)),
    }
}
