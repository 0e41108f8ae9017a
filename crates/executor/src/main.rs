use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use common::actors::{Actor, ActorType};
use common::config::AppConfig;
use common::logger;
use common::models::RawSignal;
use exchange::build_exchange;
use signal::IntentNormalizer;

use crate::actors::supervisor::Supervisor;
use crate::services::execution_service::{ExecutionService, prepare_account};
use crate::services::notifier::Notifier;
use crate::services::order_executor::OrderExecutor;
use crate::services::position_reporter::PositionReporter;
use crate::services::signal_listener::SignalListener;
use crate::services::telegram_service::TelegramService;
use crate::services::trade_orchestrator::TradeOrchestrator;

mod actors;
mod services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::setup_logger();
    debug!("System starting up...");

    let config = AppConfig::from_env()?;
    debug!("Loaded config: {:?}", config);

    // A broken action table must stop the bot before any order is sent.
    let normalizer = IntentNormalizer::new()?;

    let exchange = build_exchange(&config.exchange)?;
    prepare_account(exchange.as_ref(), &config.trading).await;

    let telegram = Arc::new(TelegramService::new(&config.telegram));
    let notifier: Arc<dyn Notifier> = telegram.clone();

    let reporter = Arc::new(PositionReporter::new(exchange.clone()));
    let executor = OrderExecutor::new(exchange.clone(), normalizer, &config.trading);
    let orchestrator = Arc::new(TradeOrchestrator::new(
        executor,
        reporter,
        notifier,
        config.telegram.notify_chat_id,
        &config.trading,
    ));

    let (signal_tx, _) = broadcast::channel::<Arc<RawSignal>>(1_024);

    let mut supervisor = Supervisor::new();

    let bot = telegram.bot();
    let signal_chat_id = config.telegram.signal_chat_id;
    let tx_for_listener = signal_tx.clone();
    supervisor.register_actor(
        ActorType::SignalListenerActor,
        Box::new(move || -> Box<dyn Actor> {
            Box::new(SignalListener::new(
                bot.clone(),
                signal_chat_id,
                tx_for_listener.clone(),
            ))
        }),
    );

    let rx_for_execution = signal_tx.subscribe();
    supervisor.register_actor(
        ActorType::OrchestratorActor,
        Box::new(move || -> Box<dyn Actor> {
            Box::new(ExecutionService::new(
                orchestrator.clone(),
                rx_for_execution.resubscribe(),
            ))
        }),
    );

    info!("Bot started on {}", exchange.name());
    supervisor.start().await;
    Ok(())
}
