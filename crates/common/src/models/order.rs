use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TradeAction;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Wire-string enums shared with the exchange layer.
macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s.trim();
                $(
                    if value.eq_ignore_ascii_case($wire) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(UnknownVariant {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }
    };
}

wire_enum!(Side, "side", { Buy => "buy", Sell => "sell" });
wire_enum!(PositionSide, "position side", { Long => "long", Short => "short" });
wire_enum!(MarginMode, "margin mode", { Cross => "cross", Isolated => "isolated" });
wire_enum!(OrderType, "order type", { Market => "market", Limit => "limit" });
wire_enum!(InstrumentType, "instrument type", { Swap => "SWAP", Futures => "FUTURES" });
wire_enum!(PositionMode, "position mode", { LongShort => "long_short_mode", Net => "net_mode" });

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub market: String,
    pub margin_mode: MarginMode,
    pub side: Side,
    pub position_side: PositionSide,
    pub order_type: OrderType,
    pub size: Decimal,
}

/// A confirmed order with its fill details.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub order_id: String,
    /// Action derived back from the filled side and position side.
    pub action: TradeAction,
    pub avg_price: Decimal,
    pub filled_at: DateTime<Utc>,
    pub fee: Decimal,
    pub leverage: Decimal,
    pub side: Side,
    pub position_side: PositionSide,
    pub size: Decimal,
    /// Upstream execution time of the signal that caused this order.
    pub signal_time: Option<DateTime<Utc>>,
}

impl OrderRecord {
    pub fn with_signal_time(mut self, signal_time: Option<DateTime<Utc>>) -> Self {
        self.signal_time = signal_time;
        self
    }
}
