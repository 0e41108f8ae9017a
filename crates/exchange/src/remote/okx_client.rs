use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use common::config::{ExchangeConfig, TradingEnvironment};
use common::models::{ExecutionRequest, InstrumentType, MarginMode, PositionMode};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use serde_json::{Value, json};
use sha2::Sha256;
use tracing::{debug, error, info};
use url::form_urlencoded;

use crate::remote::okx_response::{
    OkxBalance, OkxOrderAck, OkxOrderDetail, OkxPositionHistory, into_data, millis_to_utc,
};
use crate::traits::{Exchange, RemoteResponse};
use crate::types::{AccountBalance, ClosedPosition, ExchangeError, OrderFill, SubmitAck};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct OkxClient {
    client: Client,
    base_url: String,
    api_key: String,
    secret_key: String,
    passphrase: String,
    simulated: bool,
}

impl OkxClient {
    pub fn new(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .user_agent("signal_executor/0.1.0")
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            passphrase: config.passphrase.clone(),
            simulated: config.environment == TradingEnvironment::Demo,
        })
    }

    /// Sends a signed request and returns the decoded body, whatever its `code`.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, ExchangeError> {
        let request_path = if query.is_empty() {
            path.to_string()
        } else {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query)
                .finish();
            format!("{}?{}", path, encoded)
        };
        let body = body.map(Value::to_string).unwrap_or_default();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let signature = sign(
            &self.secret_key,
            &timestamp,
            method.as_str(),
            &request_path,
            &body,
        )?;

        let url = format!("{}{}", self.base_url, request_path);
        debug!("{} {}", method, request_path);

        let mut builder = self
            .client
            .request(method, &url)
            .header("OK-ACCESS-KEY", &self.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", &self.passphrase)
            .header("Content-Type", "application/json");
        if self.simulated {
            builder = builder.header("x-simulated-trading", "1");
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => {
                error!("OKX {} failed with HTTP {}: {}", request_path, status, text);
                Err(ExchangeError::Http {
                    status: status.as_u16(),
                    body: text,
                })
            }
            Err(e) => Err(ExchangeError::Decode {
                what: "response body",
                reason: e.to_string(),
            }),
        }
    }
}

/// `base64(hmac_sha256(secret, timestamp + METHOD + requestPath + body))`
pub fn sign(
    secret_key: &str,
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|e| ExchangeError::Signing(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(request_path.as_bytes());
    mac.update(body.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl Exchange for OkxClient {
    fn name(&self) -> &'static str {
        "OKX"
    }

    async fn submit_order(&self, request: &ExecutionRequest) -> Result<SubmitAck, ExchangeError> {
        let body = json!({
            "instId": request.market,
            "tdMode": request.margin_mode.as_str(),
            "side": request.side.as_str(),
            "posSide": request.position_side.as_str(),
            "ordType": request.order_type.as_str(),
            "sz": request.size.normalize().to_string(),
        });

        info!(
            "Placing order: {} {} {} sz={}",
            request.side, request.position_side, request.market, request.size
        );

        let raw = self
            .request(Method::POST, "/api/v5/trade/order", &[], Some(&body))
            .await?;

        let ack = match into_data::<OkxOrderAck>(raw.clone(), "order acknowledgement") {
            Ok(mut data) if !data.is_empty() => data.swap_remove(0),
            Ok(_) | Err(ExchangeError::Rejected(_)) => {
                return Ok(SubmitAck {
                    success: false,
                    order_id: None,
                    acknowledged_at: None,
                    raw,
                });
            }
            Err(e) => return Err(e),
        };

        let order_id = Some(ack.order_id.clone()).filter(|id| !id.is_empty());
        Ok(SubmitAck {
            success: ack.status_code == "0",
            order_id,
            acknowledged_at: millis_to_utc(&ack.ts),
            raw,
        })
    }

    async fn fetch_order(&self, market: &str, order_id: &str) -> Result<OrderFill, ExchangeError> {
        let raw = self
            .request(
                Method::GET,
                "/api/v5/trade/order",
                &[("instId", market), ("ordId", order_id)],
                None,
            )
            .await?;

        into_data::<OkxOrderDetail>(raw, "order detail")?
            .first()
            .ok_or_else(|| ExchangeError::Decode {
                what: "order detail",
                reason: format!("no data for order {}", order_id),
            })?
            .to_domain()
    }

    async fn fetch_closed_positions(
        &self,
        instrument_type: InstrumentType,
    ) -> Result<Vec<ClosedPosition>, ExchangeError> {
        let raw = self
            .request(
                Method::GET,
                "/api/v5/account/positions-history",
                &[("instType", instrument_type.as_str())],
                None,
            )
            .await?;

        into_data::<OkxPositionHistory>(raw, "positions history")?
            .iter()
            .map(|p| p.to_domain())
            .collect()
    }

    async fn set_leverage(
        &self,
        market: &str,
        margin_mode: MarginMode,
        leverage: u32,
    ) -> Result<(), ExchangeError> {
        let body = json!({
            "instId": market,
            "lever": leverage.to_string(),
            "mgnMode": margin_mode.as_str(),
        });
        let raw = self
            .request(Method::POST, "/api/v5/account/set-leverage", &[], Some(&body))
            .await?;

        for item in into_data::<Value>(raw, "set leverage")? {
            info!(
                "Leverage set: instId={} lever={} mgnMode={} posSide={}",
                item["instId"], item["lever"], item["mgnMode"], item["posSide"]
            );
        }
        Ok(())
    }

    async fn set_position_mode(&self, mode: PositionMode) -> Result<(), ExchangeError> {
        let body = json!({ "posMode": mode.as_str() });
        let raw = self
            .request(Method::POST, "/api/v5/account/set-position-mode", &[], Some(&body))
            .await?;
        into_data::<Value>(raw, "set position mode")?;
        info!("Position mode set to {}", mode);
        Ok(())
    }

    async fn get_balance(&self) -> Result<AccountBalance, ExchangeError> {
        let raw = self
            .request(Method::GET, "/api/v5/account/balance", &[], None)
            .await?;

        into_data::<OkxBalance>(raw, "balance")?
            .first()
            .ok_or(ExchangeError::Decode {
                what: "balance",
                reason: "empty data".to_string(),
            })?
            .to_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::ExchangeKind;
    use common::models::{OrderType, PositionSide, Side};
    use mockito::{Matcher, Server, ServerGuard};
    use rust_decimal_macros::dec;

    fn client_for(server: &ServerGuard, environment: TradingEnvironment) -> OkxClient {
        OkxClient::new(&ExchangeConfig {
            kind: ExchangeKind::Okx,
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            passphrase: "phrase".to_string(),
            environment,
            base_url: server.url(),
        })
        .unwrap()
    }

    fn open_long(size: rust_decimal::Decimal) -> ExecutionRequest {
        ExecutionRequest {
            market: "BTC-USDT-SWAP".to_string(),
            margin_mode: MarginMode::Cross,
            side: Side::Buy,
            position_side: PositionSide::Long,
            order_type: OrderType::Market,
            size,
        }
    }

    #[test]
    fn test_sign_matches_reference_vectors() {
        let secret = "22582BD0CFF14C41EDBF1AB98506286D";
        let ts = "2020-12-08T09:08:57.715Z";

        assert_eq!(
            sign(secret, ts, "GET", "/api/v5/account/balance?ccy=BTC", "").unwrap(),
            "HiZhvSfMtWJA3uUIVXV3a/bSXNPCWvYFXoGCVS8V4zY="
        );
        assert_eq!(
            sign(
                secret,
                ts,
                "POST",
                "/api/v5/trade/order",
                r#"{"instId":"BTC-USDT-SWAP"}"#
            )
            .unwrap(),
            "jJaDvhTo9Th18z7EibpnZ4RawxPiL4Py1Gj/bjkEvp4="
        );
    }

    #[tokio::test]
    async fn test_submit_order_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v5/trade/order")
            .match_header("ok-access-key", "key")
            .match_header("ok-access-passphrase", "phrase")
            .match_header("ok-access-sign", Matcher::Any)
            .match_header("x-simulated-trading", "1")
            .match_body(Matcher::PartialJson(json!({
                "instId": "BTC-USDT-SWAP",
                "tdMode": "cross",
                "side": "buy",
                "posSide": "long",
                "ordType": "market",
                "sz": "12"
            })))
            .with_status(200)
            .with_body(
                r#"{"code":"0","msg":"","data":[{"ordId":"777","clOrdId":"","sCode":"0","sMsg":"Order placed","ts":"1700000001000"}]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server, TradingEnvironment::Demo);
        let ack = client.submit_order(&open_long(dec!(12))).await.unwrap();

        mock.assert_async().await;
        assert!(ack.success);
        assert_eq!(ack.order_id.as_deref(), Some("777"));
        assert_eq!(ack.acknowledged_at, millis_to_utc("1700000001000"));
    }

    #[tokio::test]
    async fn test_submit_order_rejection_keeps_raw_payload() {
        let mut server = Server::new_async().await;
        let body = r#"{"code":"1","msg":"All operations failed","data":[{"ordId":"","sCode":"51008","sMsg":"Order failed. Insufficient USDT margin in account","ts":"1700000001000"}]}"#;
        server
            .mock("POST", "/api/v5/trade/order")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = client_for(&server, TradingEnvironment::Live);
        let ack = client.submit_order(&open_long(dec!(2))).await.unwrap();

        assert!(!ack.success);
        assert_eq!(ack.order_id, None);
        assert_eq!(ack.raw, serde_json::from_str::<Value>(body).unwrap());
    }

    #[tokio::test]
    async fn test_fetch_order() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v5/trade/order")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("instId".into(), "BTC-USDT-SWAP".into()),
                Matcher::UrlEncoded("ordId".into(), "777".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"code":"0","msg":"","data":[{"ordId":"777","avgPx":"43000","fee":"-0.258","lever":"50","side":"sell","posSide":"short","sz":"12","fillTime":"1700000001500"}]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server, TradingEnvironment::Live);
        let fill = client.fetch_order("BTC-USDT-SWAP", "777").await.unwrap();

        assert_eq!(fill.avg_price, dec!(43000));
        assert_eq!(fill.fee, dec!(-0.258));
        assert_eq!(fill.side, "sell");
        assert_eq!(fill.position_side, "short");
        assert_eq!(fill.filled_at, millis_to_utc("1700000001500"));
    }

    #[tokio::test]
    async fn test_fetch_closed_positions() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v5/account/positions-history")
            .match_query(Matcher::UrlEncoded("instType".into(), "SWAP".into()))
            .with_status(200)
            .with_body(
                r#"{"code":"0","msg":"","data":[{"instId":"BTC-USDT-SWAP","type":"2","realizedPnl":"10.5","fee":"-0.5","pnl":"11","uTime":"1700000020000"},{"instId":"BTC-USDT-SWAP","type":"1","realizedPnl":"1","fee":"-0.1","pnl":"1.1","uTime":"1690000000000"}]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server, TradingEnvironment::Live);
        let positions = client
            .fetch_closed_positions(InstrumentType::Swap)
            .await
            .unwrap();

        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].type_code, "2");
        assert_eq!(positions[0].realized_pnl, dec!(10.5));
        assert_eq!(positions[0].fee, dec!(-0.5));
        assert_eq!(positions[0].pnl, dec!(11));
    }

    #[tokio::test]
    async fn test_set_leverage_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/v5/account/set-leverage")
            .match_body(Matcher::PartialJson(json!({
                "instId": "BTC-USDT-SWAP",
                "lever": "50",
                "mgnMode": "cross"
            })))
            .with_status(200)
            .with_body(r#"{"code":"59000","msg":"Setting failed","data":[]}"#)
            .create_async()
            .await;

        let client = client_for(&server, TradingEnvironment::Live);
        let result = client
            .set_leverage("BTC-USDT-SWAP", MarginMode::Cross, 50)
            .await;

        assert!(matches!(result, Err(ExchangeError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_get_balance() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v5/account/balance")
            .with_status(200)
            .with_body(
                r#"{"code":"0","msg":"","data":[{"totalEq":"1520.3","details":[{"ccy":"USDT","availBal":"1200.1","eq":"1520.3"}]}]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server, TradingEnvironment::Live);
        let balance = client.get_balance().await.unwrap();

        assert_eq!(balance.total_equity, dec!(1520.3));
        assert_eq!(balance.currencies[0].currency, "USDT");
        assert_eq!(balance.currencies[0].available, dec!(1200.1));
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v5/account/balance")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let client = client_for(&server, TradingEnvironment::Live);

        match client.get_balance().await {
            Err(ExchangeError::Http { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "Bad Gateway");
            }
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }
}
