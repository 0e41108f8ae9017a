use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::config::TradingConfig;
use common::models::{PositionMode, RawSignal};
use exchange::Exchange;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::services::trade_orchestrator::{FlowOutcome, TradeOrchestrator};

/// Feeds signals from the channel into the orchestrator, one at a time.
pub struct ExecutionService {
    id: Uuid,
    orchestrator: Arc<TradeOrchestrator>,
    signal_rx: broadcast::Receiver<Arc<RawSignal>>,
}

#[async_trait]
impl Actor for ExecutionService {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::OrchestratorActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        info!("Starting Execution Service ({})", self.id);

        loop {
            match self.signal_rx.recv().await {
                Ok(raw) => match self.orchestrator.handle(&raw).await {
                    FlowOutcome::Dropped(_) => {}
                    FlowOutcome::Failed => {
                        warn!("Signal {} did not result in an order", raw.message_id);
                    }
                    FlowOutcome::Filled { record, .. } => {
                        info!("Signal {} filled as order {}", raw.message_id, record.order_id);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Execution service lagged: missed {} signals", n);
                    supervisor_tx
                        .send(ControlMessage::Error(
                            self.name(),
                            format!("missed {} signals", n),
                        ))
                        .await?;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    bail!("Signal channel closed. Stopping service.");
                }
            }
        }
    }
}

impl ExecutionService {
    pub fn new(
        orchestrator: Arc<TradeOrchestrator>,
        signal_rx: broadcast::Receiver<Arc<RawSignal>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            orchestrator,
            signal_rx,
        }
    }
}

/// One-time account setup: hedge position mode, leverage per market, balance log.
/// Failures are logged; the bot still starts.
pub async fn prepare_account(exchange: &dyn Exchange, trading: &TradingConfig) {
    if let Err(e) = exchange.set_position_mode(PositionMode::LongShort).await {
        warn!("Failed to set position mode: {}", e);
    }

    for market in &trading.leverage_markets {
        if let Err(e) = exchange
            .set_leverage(market, trading.margin_mode, trading.leverage)
            .await
        {
            error!("Failed to set leverage {}x on {}: {}", trading.leverage, market, e);
        }
    }

    match exchange.get_balance().await {
        Ok(balance) => {
            info!("{} account connected. Total equity: {}", exchange.name(), balance.total_equity);
            for b in balance
                .currencies
                .iter()
                .filter(|b| !b.available.is_zero())
            {
                info!("Balance: {} Available={} Equity={}", b.currency, b.available, b.equity);
            }
        }
        Err(e) => error!("Failed to fetch account balance: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{MockExchange, trading_config};
    use common::models::MarginMode;
    use exchange::{AccountBalance, CurrencyBalance, ExchangeError};
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[tokio::test]
    async fn test_prepare_account_continues_after_failures() {
        let mut exchange = MockExchange::new();
        exchange.expect_name().return_const("OKX");
        exchange
            .expect_set_position_mode()
            .with(eq(PositionMode::LongShort))
            .times(1)
            .returning(|_| Err(ExchangeError::Rejected(json!({"code": "59000"}))));
        exchange
            .expect_set_leverage()
            .withf(|market, mode, lever| {
                market == "BTC-USDT-SWAP" && *mode == MarginMode::Cross && *lever == 50
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        exchange.expect_get_balance().times(1).returning(|| {
            Ok(AccountBalance {
                total_equity: dec!(1520.3),
                currencies: vec![CurrencyBalance {
                    currency: "USDT".to_string(),
                    available: dec!(1200.1),
                    equity: dec!(1520.3),
                }],
            })
        });

        prepare_account(&exchange, &trading_config()).await;
    }
}
