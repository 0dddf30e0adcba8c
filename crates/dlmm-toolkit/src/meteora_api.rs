//! Pool discovery through the public DLMM HTTP API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::adapter::ensure_https_or_loopback;
use crate::errors::{DlmmError, FailureClass};
use crate::types::GetPoolsParameters;

pub const DEFAULT_METEORA_API_BASE_URL: &str = "https://dlmm-api.meteora.ag";
const POOL_SEARCH_LIMIT: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
struct RawPair {
    address: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    bin_step: u16,
    #[serde(default)]
    base_fee_percentage: String,
    #[serde(default)]
    max_fee_percentage: String,
    #[serde(default)]
    protocol_fee_percentage: String,
    #[serde(default)]
    liquidity: String,
    #[serde(default)]
    fees_24h: f64,
    #[serde(default)]
    trade_volume_24h: f64,
    #[serde(default)]
    current_price: f64,
    #[serde(default)]
    apr: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct PairPage {
    #[serde(default)]
    pairs: Option<Vec<RawPair>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolSummary {
    pub address: String,
    pub name: String,
    pub bin_step: u16,
    pub base_fee_percentage: String,
    pub max_fee_percentage: String,
    pub protocol_fee_percentage: String,
    pub liquidity: String,
    pub fees_24h: f64,
    pub trade_volume_24h: f64,
    pub current_price: f64,
    pub apr_percentage: f64,
}

impl From<RawPair> for PoolSummary {
    fn from(p: RawPair) -> Self {
        Self {
            address: p.address,
            name: p.name,
            bin_step: p.bin_step,
            base_fee_percentage: p.base_fee_percentage,
            max_fee_percentage: p.max_fee_percentage,
            protocol_fee_percentage: p.protocol_fee_percentage,
            liquidity: p.liquidity,
            fees_24h: p.fees_24h,
            trade_volume_24h: p.trade_volume_24h,
            current_price: p.current_price,
            apr_percentage: p.apr,
        }
    }
}

fn search_term(params: &GetPoolsParameters) -> Result<String, DlmmError> {
    let (a, b) = (params.asset.trim(), params.asset_b.trim());
    if a.is_empty() || b.is_empty() {
        return Err(DlmmError::Validation(
            "asset and assetB are required to search pools".into(),
        ));
    }
    Ok(format!("{a}-{b}"))
}

fn summaries(page: PairPage, term: &str) -> Result<Vec<PoolSummary>, DlmmError> {
    let pairs = page
        .pairs
        .ok_or_else(|| DlmmError::protocol("get pools", format!("no pool found for {term}")))?;
    Ok(pairs.into_iter().map(PoolSummary::from).collect())
}

#[derive(Debug, Clone)]
pub struct MeteoraApi {
    base_url: String,
    http: Client,
}

impl MeteoraApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DlmmError> {
        ensure_https_or_loopback(base_url, "meteora api base url")?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DlmmError::Validation(format!("build http client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            http,
        })
    }

    pub async fn get_pools(&self, params: &GetPoolsParameters) -> Result<Vec<PoolSummary>, DlmmError> {
        let term = search_term(params)?;
        let limit = POOL_SEARCH_LIMIT.to_string();
        let resp = self
            .http
            .get(format!("{}/pair/all_with_pagination", self.base_url))
            .query(&[("search_term", term.as_str()), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| DlmmError::read("get pools", &e, FailureClass::from_reqwest(&e)))?;
        if !resp.status().is_success() {
            return Err(DlmmError::read(
                "get pools",
                format!("meteora api http {}", resp.status()),
                FailureClass::Other,
            ));
        }
        let page: PairPage = resp
            .json()
            .await
            .map_err(|e| DlmmError::read("get pools", &e, FailureClass::from_reqwest(&e)))?;
        let out = summaries(page, &term)?;
        tracing::debug!(search_term = %term, pools = out.len(), "pool search");
        Ok(out)
    }
}
