use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use common::models::{RawSignal, TradeAction, TradeIntent};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

// [开多] 数量:6 市场:BTC-USDT-SWAP 返回{'code':'0','data':[{'ts':'1700000000000'}]}
static SIGNAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*\[([^\]]+)\]\s*数量[:：]\s*(\d+(?:\.\d+)?)\s+市场[:：]\s*(\S+)\s+返回\s*(\{.*\})\s*$")
        .expect("signal pattern compiles")
});

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("message does not look like a trade signal")]
    NoMatch,
    #[error("unknown action label [{0}]")]
    UnknownAction(String),
    #[error("invalid quantity {0:?}")]
    InvalidQuantity(String),
    #[error("embedded payload is not valid JSON: {0}")]
    MalformedPayload(String),
}

#[derive(Debug, Clone)]
pub struct ParsedSignal {
    pub intent: TradeIntent,
    /// Set when the payload could not be decoded; the intent then carries an empty object.
    pub payload_error: Option<ParseError>,
}

pub fn parse_signal(raw: &RawSignal) -> Result<ParsedSignal, ParseError> {
    parse_signal_at(raw, Utc::now())
}

/// Parses a signal message; `captured_at` is recorded as the moment the signal was noticed.
pub fn parse_signal_at(
    raw: &RawSignal,
    captured_at: DateTime<Utc>,
) -> Result<ParsedSignal, ParseError> {
    let caps = SIGNAL_PATTERN.captures(&raw.text).ok_or(ParseError::NoMatch)?;

    let label = &caps[1];
    let action = label
        .parse::<TradeAction>()
        .map_err(|_| ParseError::UnknownAction(label.to_string()))?;

    let quantity = caps[2]
        .parse::<Decimal>()
        .ok()
        .filter(|q| *q > Decimal::ZERO)
        .ok_or_else(|| ParseError::InvalidQuantity(caps[2].to_string()))?;

    let market = caps[3].to_string();

    let (source_payload, payload_error) = match decode_payload(&caps[4]) {
        Ok(payload) => (payload, None),
        Err(e) => {
            warn!(message_id = raw.message_id, "{}", e);
            (Value::Object(Map::new()), Some(e))
        }
    };

    debug!(
        message_id = raw.message_id,
        %action,
        %quantity,
        market = %market,
        "Parsed signal"
    );

    Ok(ParsedSignal {
        intent: TradeIntent {
            action,
            quantity,
            market,
            source_payload,
            message_id: raw.message_id,
            observed_at: raw.received_at,
            captured_at,
        },
        payload_error,
    })
}

/// The payload is written with single quotes; swap them before decoding.
fn decode_payload(fragment: &str) -> Result<Value, ParseError> {
    let normalized = fragment.replace('\'', "\"");
    serde_json::from_str::<Value>(&normalized).map_err(|e| ParseError::MalformedPayload(e.to_string()))
}
