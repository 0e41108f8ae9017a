pub mod execution_service;
pub mod notifier;
pub mod order_executor;
pub mod position_reporter;
pub mod signal_listener;
pub mod telegram_service;
pub mod trade_orchestrator;

#[cfg(test)]
pub mod test_support;
