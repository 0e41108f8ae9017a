use std::sync::Arc;

use common::config::{ExchangeConfig, ExchangeKind};
use tracing::info;

use crate::{remote::OkxClient, traits::Exchange, types::ExchangeError};

/// Picks the exchange implementation named by the configuration.
pub fn build_exchange(config: &ExchangeConfig) -> Result<Arc<dyn Exchange>, ExchangeError> {
    let exchange: Arc<dyn Exchange> = match config.kind {
        ExchangeKind::Okx => Arc::new(OkxClient::new(config)?),
    };
    info!(
        "Using {} ({:?} trading) at {}",
        exchange.name(),
        config.environment,
        config.base_url
    );
    Ok(exchange)
}
