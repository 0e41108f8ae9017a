use async_trait::async_trait;
use common::models::{ExecutionRequest, InstrumentType, MarginMode, PositionMode};

use crate::types::{AccountBalance, ClosedPosition, ExchangeError, OrderFill, SubmitAck};

/// Conversion of a decoded wire record into its exchange-neutral form.
pub trait RemoteResponse<T> {
    fn to_domain(&self) -> Result<T, ExchangeError>;
}

/// Request executor for one derivatives exchange account.
///
/// Calls are single round-trips; timeouts belong to the implementation's HTTP client
/// and nothing is retried at this level.
#[async_trait]
pub trait Exchange: Send + Sync {
    fn name(&self) -> &'static str;

    /// A rejected order is still `Ok`, with `success == false` and the raw answer attached.
    async fn submit_order(&self, request: &ExecutionRequest) -> Result<SubmitAck, ExchangeError>;

    async fn fetch_order(&self, market: &str, order_id: &str) -> Result<OrderFill, ExchangeError>;

    /// Most recent first.
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
