use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::traits::RemoteResponse;
use crate::types::{AccountBalance, ClosedPosition, CurrencyBalance, ExchangeError, OrderFill};

#[derive(Deserialize, Debug)]
pub struct OkxEnvelope<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Unwraps `{"code":"0","data":[...]}`; any other code comes back as `Rejected` with the raw body.
pub fn into_data<T: DeserializeOwned>(
    raw: Value,
    what: &'static str,
) -> Result<Vec<T>, ExchangeError> {
    if raw.get("code").and_then(Value::as_str) != Some("0") {
        return Err(ExchangeError::Rejected(raw));
    }
    let envelope: OkxEnvelope<T> =
        serde_json::from_value(raw).map_err(|e| ExchangeError::Decode {
            what,
            reason: e.to_string(),
        })?;
    Ok(envelope.data)
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct OkxOrderAck {
    #[serde(rename(deserialize = "ordId"))]
    pub order_id: String,
    #[serde(rename(deserialize = "sCode"))]
    pub status_code: String,
    #[serde(rename(deserialize = "sMsg"))]
    pub status_msg: String,
    pub ts: String,
}

#[derive(Deserialize, Debug)]
pub struct OkxOrderDetail {
    #[serde(rename(deserialize = "ordId"))]
    pub order_id: String,
    #[serde(rename(deserialize = "avgPx"), default)]
    pub avg_price: String,
    #[serde(default)]
    pub fee: String,
    #[serde(rename(deserialize = "lever"), default)]
    pub leverage: String,
    pub side: String,
    #[serde(rename(deserialize = "posSide"))]
    pub position_side: String,
    pub sz: String,
    #[serde(rename(deserialize = "fillTime"), default)]
    pub fill_time: String,
}

impl RemoteResponse<OrderFill> for OkxOrderDetail {
    fn to_domain(&self) -> Result<OrderFill, ExchangeError> {
        Ok(OrderFill {
            order_id: self.order_id.clone(),
            avg_price: decimal("avgPx", &self.avg_price)?,
            fee: decimal("fee", &self.fee)?,
            leverage: decimal("lever", &self.leverage)?,
            side: self.side.clone(),
            position_side: self.position_side.clone(),
            size: decimal("sz", &self.sz)?,
            filled_at: millis_to_utc(&self.fill_time),
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct OkxPositionHistory {
    #[serde(rename(deserialize = "instId"), default)]
    pub market: String,
    #[serde(rename(deserialize = "type"), default)]
    pub type_code: String,
    #[serde(rename(deserialize = "realizedPnl"), default)]
    pub realized_pnl: String,
    #[serde(default)]
    pub fee: String,
    #[serde(default)]
    pub pnl: String,
    #[serde(rename(deserialize = "uTime"), default)]
    pub updated_time: String,
}

impl RemoteResponse<ClosedPosition> for OkxPositionHistory {
    fn to_domain(&self) -> Result<ClosedPosition, ExchangeError> {
        Ok(ClosedPosition {
            market: self.market.clone(),
            type_code: self.type_code.clone(),
            realized_pnl: decimal("realizedPnl", &self.realized_pnl)?,
            fee: decimal("fee", &self.fee)?,
            pnl: decimal("pnl", &self.pnl)?,
            updated_at: millis_to_utc(&self.updated_time),
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct OkxBalance {
    #[serde(rename(deserialize = "totalEq"), default)]
    pub total_equity: String,
    #[serde(default)]
    pub details: Vec<OkxBalanceDetail>,
}

#[derive(Deserialize, Debug)]
pub struct OkxBalanceDetail {
    pub ccy: String,
    #[serde(rename(deserialize = "availBal"), default)]
    pub available: String,
    #[serde(default)]
    pub eq: String,
}

impl RemoteResponse<AccountBalance> for OkxBalance {
    fn to_domain(&self) -> Result<AccountBalance, ExchangeError> {
        let currencies = self
            .details
            .iter()
            .map(|d| {
                Ok(CurrencyBalance {
                    currency: d.ccy.clone(),
                    available: decimal("availBal", &d.available)?,
                    equity: decimal("eq", &d.eq)?,
                })
            })
            .collect::<Result<Vec<_>, ExchangeError>>()?;

        Ok(AccountBalance {
            total_equity: decimal("totalEq", &self.total_equity)?,
            currencies,
        })
    }
}

/// OKX sends numbers as strings and leaves unknown values empty.
pub fn decimal(what: &'static str, value: &str) -> Result<Decimal, ExchangeError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Decimal::ZERO);
    }
    value
        .parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| ExchangeError::Decode {
            what,
            reason: format!("{:?}: {}", value, e),
        })
}

pub fn millis_to_utc(value: &str) -> Option<DateTime<Utc>> {
    let millis = value.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
