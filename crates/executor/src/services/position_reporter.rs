use std::sync::Arc;

use common::models::{InstrumentType, SettlementState, SettlementSummary};
use exchange::{Exchange, ExchangeError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error("no closed {0} positions in history")]
    NoHistory(InstrumentType),
}

/// Reads the latest closed position and summarizes how it settled.
pub struct PositionReporter {
    exchange: Arc<dyn Exchange>,
    instrument_type: InstrumentType,
}

impl PositionReporter {
    pub fn new(exchange: Arc<dyn Exchange>) -> Self {
        Self {
            exchange,
            instrument_type: InstrumentType::Swap,
        }
    }

    pub async fn latest_settlement(&self) -> Result<SettlementSummary, ReportError> {
        let positions = self
            .exchange
            .fetch_closed_positions(self.instrument_type)
            .await?;

        let latest = positions
            .first()
            .ok_or(ReportError::NoHistory(self.instrument_type))?;
        debug!(
            "Latest closed position: {} type={}",
            latest.market, latest.type_code
        );

        Ok(SettlementSummary {
            state: SettlementState::from_type_code(&latest.type_code),
            realized_pnl: latest.realized_pnl,
            fee: latest.fee,
            close_pnl: latest.pnl,
        })
    }
}

pub fn render_settlement(summary: &SettlementSummary) -> String {
    format!(
        "Settlement: {}\nRealized PnL: {}\nFee: {}\nClose PnL: {}\n",
        summary.state.describe(),
        summary.realized_pnl,
        summary.fee,
        summary.close_pnl
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{MockExchange, closed_position};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_latest_settlement_uses_first_record() {
        let mut exchange = MockExchange::new();
        exchange
            .expect_fetch_closed_positions()
            .withf(|instrument_type| *instrument_type == InstrumentType::Swap)
            .times(1)
            .returning(|_| Ok(vec![closed_position("1"), closed_position("2")]));

        let reporter = PositionReporter::new(Arc::new(exchange));
        let summary = reporter.latest_settlement().await.unwrap();

        assert_eq!(summary.state, SettlementState::PartialClose);
        assert_eq!(summary.realized_pnl, dec!(10.5));
        assert_eq!(summary.fee, dec!(-0.5));
        assert_eq!(summary.close_pnl, dec!(11));
    }

    #[tokio::test]
    async fn test_empty_history() {
        let mut exchange = MockExchange::new();
        exchange
            .expect_fetch_closed_positions()
            .returning(|_| Ok(vec![]));

        let reporter = PositionReporter::new(Arc::new(exchange));

        assert!(matches!(
            reporter.latest_settlement().await,
            Err(ReportError::NoHistory(InstrumentType::Swap))
        ));
    }

    #[test]
    fn test_render_settlement() {
        let text = render_settlement(&SettlementSummary {
            state: SettlementState::FullClose,
            realized_pnl: dec!(10.5),
            fee: dec!(-0.5),
            close_pnl: dec!(11),
        });

        assert_eq!(
            text,
            "Settlement: full close\nRealized PnL: 10.5\nFee: -0.5\nClose PnL: 11\n"
        );
    }
}
