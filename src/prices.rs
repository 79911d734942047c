use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};

use crate::gateway::Gateway;
use crate::tokens::TokenCode;

/// Converted amounts carry this many decimal places.
const CONVERSION_SCALE: i64 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub eur_amount: String,
    pub token: TokenCode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub token: TokenCode,
    pub eur_amount: String,
    /// Token amount as a decimal string with four decimal places.
    pub converted_amount: String,
    pub rate: f64,
    pub timestamp: String,
}

/// Source of EUR rates. The production implementation queries CoinGecko
/// through the offline cache gateway; tests stub this out.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn eur_rate(&self, token: TokenCode) -> Result<f64>;
}

pub struct CoinGeckoSource {
    api_base: String,
    gateway: Arc<Gateway>,
}

impl CoinGeckoSource {
    pub fn new(api_base: String, gateway: Arc<Gateway>) -> Self {
        Self { api_base, gateway }
    }
}

#[async_trait]
impl RateSource for CoinGeckoSource {
    async fn eur_rate(&self, token: TokenCode) -> Result<f64> {
        let id = token.coingecko_id();
        let url = format!("{}?ids={}&vs_currencies=eur", self.api_base, id);

        let response = self.gateway.handle(&url).await;
        if response.status != 200 {
            bail!("Price API returned status {} for {}", response.status, id);
        }

        let data: serde_json::Value = serde_json::from_slice(&response.body)
            .map_err(|e| anyhow!("Malformed price response for {}: {}", id, e))?;

        data.get(id)
            .and_then(|entry| entry.get("eur"))
            .and_then(|rate| rate.as_f64())
            .ok_or_else(|| anyhow!("No EUR rate for {} in price response", id))
    }
}

/// Convert a EUR amount into the selected token at the given source's
/// current rate. Exact decimal division, rounded half-up to four places.
pub async fn convert(req: ConversionRequest, source: &dyn RateSource) -> Result<ConversionResult> {
    let eur = BigDecimal::from_str(req.eur_amount.trim())
        .map_err(|_| anyhow!("Invalid EUR amount: {}", req.eur_amount))?;
    if eur <= BigDecimal::from(0) {
        bail!("EUR amount must be positive: {}", req.eur_amount);
    }

    let rate = source.eur_rate(req.token).await?;
    if !rate.is_finite() || rate <= 0.0 {
        bail!("Invalid EUR rate for {}: {}", req.token, rate);
    }

    let converted = (eur / BigDecimal::from_str(&rate.to_string())?)
        .with_scale_round(CONVERSION_SCALE, RoundingMode::HalfUp);

    Ok(ConversionResult {
        token: req.token,
        eur_amount: req.eur_amount,
        converted_amount: converted.to_string(),
        rate,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    pub struct FixedRate(pub f64);

    #[async_trait]
    impl RateSource for FixedRate {
        async fn eur_rate(&self, _token: TokenCode) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct NoRate;

    #[async_trait]
    impl RateSource for NoRate {
        async fn eur_rate(&self, token: TokenCode) -> Result<f64> {
            bail!("No EUR rate for {} in price response", token)
        }
    }

    #[tokio::test]
    async fn test_eurc_conversion_rounds_to_four_decimals() {
        let req = ConversionRequest {
            eur_amount: "100".to_string(),
            token: TokenCode::Eurc,
        };
        let result = convert(req, &FixedRate(1.08)).await.unwrap();
        assert_eq!(result.converted_amount, "92.5926");
        assert_eq!(result.rate, 1.08);
    }

    #[tokio::test]
    async fn test_stablecoin_at_parity() {
        let req = ConversionRequest {
            eur_amount: "12.50".to_string(),
            token: TokenCode::Usdc,
        };
        let result = convert(req, &FixedRate(1.0)).await.unwrap();
        assert_eq!(result.converted_amount, "12.5000");
    }

    #[tokio::test]
    async fn test_rejects_empty_and_non_numeric_amounts() {
        for bad in ["", "   ", "abc", "0", "-5"] {
            let req = ConversionRequest {
                eur_amount: bad.to_string(),
                token: TokenCode::Sol,
            };
            assert!(convert(req, &FixedRate(150.0)).await.is_err(), "accepted {:?}", bad);
        }
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let req = ConversionRequest {
            eur_amount: "10".to_string(),
            token: TokenCode::Sol,
        };
        assert!(convert(req, &NoRate).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_bad_rates() {
        let req = ConversionRequest {
            eur_amount: "10".to_string(),
            token: TokenCode::Sol,
        };
        assert!(convert(req.clone(), &FixedRate(0.0)).await.is_err());
        assert!(convert(req, &FixedRate(f64::NAN)).await.is_err());
    }
}
