use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A chat message as it arrived from the signal channel.
#[derive(Debug, Clone)]
pub struct RawSignal {
    pub text: String,
    pub message_id: i64,
    pub received_at: DateTime<Utc>,
}

impl RawSignal {
    pub fn new(text: impl Into<String>, message_id: i64, received_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            message_id,
            received_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeAction {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
}

impl TradeAction {
    pub const ALL: [TradeAction; 4] = [
        TradeAction::OpenLong,
        TradeAction::OpenShort,
        TradeAction::CloseLong,
        TradeAction::CloseShort,
    ];

    /// The label used for this action inside signal messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OpenLong => "开多",
            Self::OpenShort => "开空",
            Self::CloseLong => "平多",
            Self::CloseShort => "平空",
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Self::CloseLong | Self::CloseShort)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown trade action label: {0}")]
pub struct UnknownActionLabel(pub String);

impl FromStr for TradeAction {
    type Err = UnknownActionLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Self::ALL
            .into_iter()
            .find(|action| action.label() == label)
            .ok_or_else(|| UnknownActionLabel(label.to_string()))
    }
}

/// A parsed trade request, owned by a single signal flow.
#[derive(Debug, Clone)]
pub struct TradeIntent {
    pub action: TradeAction,
    pub quantity: Decimal,
    pub market: String,
    /// Upstream response embedded in the message. `Value::Object` even when the
    /// payload could not be decoded.
    pub source_payload: Value,
    pub message_id: i64,
    /// When the chat platform says the message was posted.
    pub observed_at: DateTime<Utc>,
    /// When the parser noticed the message.
    pub captured_at: DateTime<Utc>,
}

impl TradeIntent {
    /// Execution time of the upstream trade, read from `data[0].ts` (epoch millis,
    /// either a string or a number).
    pub fn source_time(&self) -> Option<DateTime<Utc>> {
        let ts = self.source_payload.get("data")?.get(0)?.get("ts")?;
        let millis = match ts {
            Value::String(s) => s.trim().parse::<i64>().ok()?,
            Value::Number(n) => n.as_i64()?,
            _ => return None,
        };
        Utc.timestamp_millis_opt(millis).single()
    }
}
