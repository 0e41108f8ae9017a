use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use common::config::TradingConfig;
use common::models::{OrderRecord, RawSignal, TradeAction, TradeIntent};
use rust_decimal::Decimal;
use signal::{ParseError, parse_signal};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::services::notifier::{Notifier, notify};
use crate::services::order_executor::{ExecutionError, OrderExecutor};
use crate::services::position_reporter::{PositionReporter, render_settlement};

/// Stages one signal passes through; every signal starts over from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Idle,
    Parsing,
    Normalizing,
    Executing,
    Reporting,
    Notifying,
}

#[derive(Debug)]
pub enum FlowOutcome {
    /// Not a signal; nothing was sent.
    Dropped(ParseError),
    /// The order did not go through; the failure was reported.
    Failed,
    Filled {
        record: OrderRecord,
        /// Delayed settlement report, present for close actions.
        settlement: Option<JoinHandle<()>>,
    },
}

/// Time between the upstream trade and the two local milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyReport {
    pub source_at: DateTime<Utc>,
    pub captured_at: DateTime<Utc>,
    pub filled_at: DateTime<Utc>,
    pub source_to_capture: TimeDelta,
    pub source_to_fill: TimeDelta,
}

impl LatencyReport {
    pub fn new(
        source_at: DateTime<Utc>,
        captured_at: DateTime<Utc>,
        filled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_at,
            captured_at,
            filled_at,
            source_to_capture: captured_at - source_at,
            source_to_fill: filled_at - source_at,
        }
    }
}

pub struct TradeOrchestrator {
    executor: OrderExecutor,
    reporter: Arc<PositionReporter>,
    notifier: Arc<dyn Notifier>,
    notify_chat_id: i64,
    settling_delay: Duration,
    display_divisor: Decimal,
}

impl TradeOrchestrator {
    pub fn new(
        executor: OrderExecutor,
        reporter: Arc<PositionReporter>,
        notifier: Arc<dyn Notifier>,
        notify_chat_id: i64,
        trading: &TradingConfig,
    ) -> Self {
        Self {
            executor,
            reporter,
            notifier,
            notify_chat_id,
            settling_delay: trading.settling_delay,
            display_divisor: trading.display_divisor,
        }
    }

    /// Runs one signal to completion. The settlement report of a close action is left
    /// running in the background so the caller can take the next signal.
    pub async fn handle(&self, raw: &RawSignal) -> FlowOutcome {
        let message_id = raw.message_id;
        debug!(message_id, stage = ?FlowStage::Parsing);

        let parsed = match parse_signal(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(message_id, stage = ?FlowStage::Idle, "Skipping message: {}", e);
                return FlowOutcome::Dropped(e);
            }
        };
        let intent = parsed.intent;
        info!(
            message_id,
            "Signal [{}] qty={} market={}", intent.action, intent.quantity, intent.market
        );

        debug!(message_id, stage = ?FlowStage::Normalizing);
        let request = match self.executor.request_for(&intent) {
            Ok(request) => request,
            Err(e) => {
                error!(message_id, "Cannot build order for {:?}: {}", intent.action, e);
                self.send(&format!("[{}] order not placed: {}", intent.action, e))
                    .await;
                return FlowOutcome::Failed;
            }
        };

        debug!(message_id, stage = ?FlowStage::Executing);
        let record = match self.executor.execute(&request).await {
            Ok(record) => record.with_signal_time(intent.source_time()),
            Err(e) => {
                debug!(message_id, stage = ?FlowStage::Notifying);
                self.send(&failure_text(intent.action, &e)).await;
                return FlowOutcome::Failed;
            }
        };

        let latency = record
            .signal_time
            .map(|source_at| LatencyReport::new(source_at, intent.captured_at, record.filled_at));
        if let Some(l) = &latency {
            info!(
                message_id,
                order_id = %record.order_id,
                source_to_capture_ms = l.source_to_capture.num_milliseconds(),
                source_to_fill_ms = l.source_to_fill.num_milliseconds(),
                "Order filled"
            );
        }

        debug!(message_id, stage = ?FlowStage::Notifying);
        let report =
            render_order_report(&record, &intent, latency.as_ref(), self.display_divisor);
        self.send(&report).await;

        let settlement = record.action.is_close().then(|| self.schedule_settlement(message_id));
        FlowOutcome::Filled { record, settlement }
    }

    /// The position history needs a moment to include a fresh close.
    fn schedule_settlement(&self, message_id: i64) -> JoinHandle<()> {
        let reporter = self.reporter.clone();
        let notifier = self.notifier.clone();
        let chat_id = self.notify_chat_id;
        let delay = self.settling_delay;

        info!(message_id, "Settlement report in {:?}", delay);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(message_id, stage = ?FlowStage::Reporting);

            let text = match reporter.latest_settlement().await {
                Ok(summary) => render_settlement(&summary),
                Err(e) => {
                    warn!(message_id, "Settlement query failed: {}", e);
                    format!("Settlement summary unavailable: {}", e)
                }
            };
            notify(notifier.as_ref(), chat_id, &text).await;
        })
    }

    async fn send(&self, text: &str) {
        notify(self.notifier.as_ref(), self.notify_chat_id, text).await;
    }
}

/// An exchange rejection is forwarded verbatim.
fn failure_text(action: TradeAction, error: &ExecutionError) -> String {
    match error {
        ExecutionError::Rejected(raw) => raw.to_string(),
        other => format!("[{}] order failed: {}", action, other),
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    format!("{} ({})", t.timestamp_millis(), t.format("%Y-%m-%d %H:%M:%S"))
}

fn format_delta(delta: TimeDelta) -> String {
    format!("{}s", Decimal::new(delta.num_milliseconds(), 3))
}

pub fn render_order_report(
    record: &OrderRecord,
    intent: &TradeIntent,
    latency: Option<&LatencyReport>,
    display_divisor: Decimal,
) -> String {
    let timing = match latency {
        Some(l) => format!(
            "Signal time: {}\nCaptured at: {}\nFilled at: {}\nSignal to capture: {}\nSignal to fill: {}\n",
            format_time(l.source_at),
            format_time(l.captured_at),
            format_time(l.filled_at),
            format_delta(l.source_to_capture),
            format_delta(l.source_to_fill),
        ),
        None => format!(
            "Signal time: n/a\nCaptured at: {}\nFilled at: {}\n",
            format_time(intent.captured_at),
            format_time(record.filled_at),
        ),
    };

    format!(
        "[{}]\nOrder id: {}\nPosition size: {}\nAvg price: {}\n{}Fee: {}\nLeverage: {}\n",
        record.action,
        record.order_id,
        (record.size / display_divisor).normalize(),
        record.avg_price,
        timing,
        record.fee,
        record.leverage,
    )
}
