//! HTTP boundary to the market data API server.

use crate::{
    config::DashboardConfig,
    error::DataError,
    model::{HoldingWeight, OptionChain, PositionValue, Row, ShortSellSnapshot},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Underlyings the server holds option chains for.
pub const OPTION_SYMBOLS: [&str; 14] = [
    "GLD", "UVXY", "SPY", "QQQ", "TLT", "IWM", "KRE", "FXI", "SQQQ", "HYG", "BITO", "AMD", "TSLA",
    "IAU",
];

/// Upper-cased option symbol if the server supports it.
pub fn option_symbol(symbol: &str) -> Result<String, DataError> {
    let symbol = symbol.trim().to_uppercase();
    if OPTION_SYMBOLS.contains(&symbol.as_str()) {
        Ok(symbol)
    } else {
        Err(DataError::UnsupportedSymbol(symbol))
    }
}

/// Every endpoint consumed by the dashboards.
///
/// Time-series endpoints return raw [`Row`]s, shaped later by the transforms.
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// `GET /api/bonds/{region}`: `[{trade_date, yield}]`
    async fn bond_yields(&self, region: &str) -> Result<Vec<Row>, DataError>;

    /// `GET /api/us_bonds`: `[{trade_date, yield_1y, yield_10y, yield_20y}]`
    async fn us_bond_curve(&self) -> Result<Vec<Row>, DataError>;

    /// `GET /api/etf/list`
    async fn etf_list(&self) -> Result<Vec<String>, DataError>;

    /// `GET /api/etf/daily?start_date=`: `[{etf_symbol, trade_date, normalized_price}]`
    async fn etf_daily(&self, start_date: NaiveDate) -> Result<Vec<Row>, DataError>;

    /// `GET /api/etf/holdings/{symbol}?start_date=`: `[{stock_symbol, trade_date, normalized_price}]`
    async fn etf_holdings(&self, symbol: &str, start_date: NaiveDate) -> Result<Vec<Row>, DataError>;

    /// `GET /api/etf/info/{symbol}`
    async fn etf_info(&self, symbol: &str) -> Result<Vec<HoldingWeight>, DataError>;

    /// `GET /api/options/data/{symbol}`
    async fn option_chain(&self, symbol: &str) -> Result<OptionChain, DataError>;

    /// `GET /api/options/position_value/{symbol}`
    async fn position_value(&self, symbol: &str) -> Result<PositionValue, DataError>;

    /// `GET /api/shortsell/latest`
    async fn short_sell_latest(&self) -> Result<ShortSellSnapshot, DataError>;

    /// `GET /api/shortsell/history/{code}`: `[{trade_date, short_price, short_amount, total_amount}]`
    async fn short_sell_history(&self, code: &str) -> Result<Vec<Row>, DataError>;
}

/// [`MarketApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &DashboardConfig) -> Result<Self, DataError> {
        let mut base = Url::parse(&config.api_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            base,
            http: reqwest::Client::new(),
            timeout: config.request_timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, DataError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DataError::Url(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn with_start_date(mut url: Url, start_date: NaiveDate) -> Url {
        url.query_pairs_mut()
            .append_pair("start_date", &start_date.format("%Y-%m-%d").to_string());
        url
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, DataError> {
        debug!(%url, "requesting");

        let response = self
            .http
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // the server reports most failures as {"error": ..} with a 4xx/5xx status
            return Err(serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| api_error(&value))
                .map(DataError::Api)
                .unwrap_or_else(|| DataError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                }));
        }

        decode(&url, &body)
    }
}

#[async_trait]
impl MarketApi for ApiClient {
    async fn bond_yields(&self, region: &str) -> Result<Vec<Row>, DataError> {
        self.get(self.endpoint(&["bonds", region])?).await
    }

    async fn us_bond_curve(&self) -> Result<Vec<Row>, DataError> {
        self.get(self.endpoint(&["us_bonds"])?).await
    }

    async fn etf_list(&self) -> Result<Vec<String>, DataError> {
        self.get(self.endpoint(&["etf", "list"])?).await
    }

    async fn etf_daily(&self, start_date: NaiveDate) -> Result<Vec<Row>, DataError> {
        let url = Self::with_start_date(self.endpoint(&["etf", "daily"])?, start_date);
        self.get(url).await
    }

    async fn etf_holdings(&self, symbol: &str, start_date: NaiveDate) -> Result<Vec<Row>, DataError> {
        let url = Self::with_start_date(self.endpoint(&["etf", "holdings", symbol])?, start_date);
        self.get(url).await
    }

    async fn etf_info(&self, symbol: &str) -> Result<Vec<HoldingWeight>, DataError> {
        self.get(self.endpoint(&["etf", "info", symbol])?).await
    }

    async fn option_chain(&self, symbol: &str) -> Result<OptionChain, DataError> {
        let symbol = option_symbol(symbol)?;
        self.get(self.endpoint(&["options", "data", symbol.as_str()])?).await
    }

    async fn position_value(&self, symbol: &str) -> Result<PositionValue, DataError> {
        let symbol = option_symbol(symbol)?;
        self.get(self.endpoint(&["options", "position_value", symbol.as_str()])?)
            .await
    }

    async fn short_sell_latest(&self) -> Result<ShortSellSnapshot, DataError> {
        self.get(self.endpoint(&["shortsell", "latest"])?).await
    }

    async fn short_sell_history(&self, code: &str) -> Result<Vec<Row>, DataError> {
        self.get(self.endpoint(&["shortsell", "history", code])?).await
    }
}

/// Decode a successful body, mapping `{"error": ..}` payloads to [`DataError::Api`].
fn decode<T: DeserializeOwned>(url: &Url, body: &str) -> Result<T, DataError> {
    let malformed = |error: serde_json::Error| DataError::Malformed {
        url: url.to_string(),
        reason: error.to_string(),
    };

    let value: Value = serde_json::from_str(body).map_err(malformed)?;
    if let Some(message) = api_error(&value) {
        return Err(DataError::Api(message));
    }
    serde_json::from_value(value).map_err(malformed)
}

fn api_error(value: &Value) -> Option<String> {
    match value.as_object()?.get("error")? {
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}
