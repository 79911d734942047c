use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use solana_sdk::pubkey::Pubkey;

use crate::tokens::TokenCode;

const EURC_MINT: &str = "HzwqbKZw8HxMN6bF2yFZNrht3c2iXXzpKcFu7uBEDKtr";
const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Static assets prefetched into the offline cache on install.
pub const ASSET_MANIFEST: [&str; 14] = [
    "/",
    "/index.html",
    "/styles.css",
    "/index.js",
    "/manifest.json",
    "/icons/paymesol-500x500.png",
    "/images/eurc-icon.png",
    "/images/solana2-logo.png",
    "/images/usdc-icon.png",
    "/images/paymesol.png",
    "/images/phantom.png",
    "/images/help.png",
    "/images/debros.png",
    "/images/history.png",
];

#[derive(Debug, Clone)]
pub struct Config {
    /// SPL token mint per accepted token; `None` means native SOL.
    pub token_mints: HashMap<TokenCode, Option<Pubkey>>,
    pub price_api_base: String,
    pub quiet_period_ms: u64,
    /// Cache generation name. Bumping this string is the only way to
    /// invalidate assets cached by a previous deployment.
    pub cache_name: String,
    /// Origin the asset manifest paths are resolved against.
    pub asset_base: String,
    /// Hosts that get network-first treatment in the cache gateway.
    pub api_hosts: Vec<String>,
    pub merchant_label: String,
    pub merchant_message: String,
    pub http_host: String,
    pub http_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut token_mints = HashMap::new();
        token_mints.insert(TokenCode::Eurc, Some(Pubkey::from_str(EURC_MINT)?));
        token_mints.insert(TokenCode::Usdc, Some(Pubkey::from_str(USDC_MINT)?));
        token_mints.insert(TokenCode::Sol, None);

        Ok(Config {
            token_mints,
            price_api_base: std::env::var("PRICE_API_BASE")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3/simple/price".to_string()),
            quiet_period_ms: std::env::var("QUIET_PERIOD_MS")
                .unwrap_or_else(|_| "800".to_string())
                .parse()
                .map_err(|e| anyhow!("Invalid QUIET_PERIOD_MS: {}", e))?,
            cache_name: std::env::var("CACHE_NAME")
                .unwrap_or_else(|_| "paymesol-cache-v1".to_string()),
            asset_base: std::env::var("ASSET_BASE")
                .unwrap_or_else(|_| "https://paymesol.app".to_string()),
            api_hosts: vec![
                "https://api.mainnet-beta.solana.com".to_string(),
                "https://api.coingecko.com".to_string(),
            ],
            merchant_label: std::env::var("MERCHANT_LABEL")
                .unwrap_or_else(|_| "Paymesol POS".to_string()),
            merchant_message: std::env::var("MERCHANT_MESSAGE")
                .unwrap_or_else(|_| "Thank you for your payment!".to_string()),
            http_host: std::env::var("HTTP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            http_port: std::env::var("HTTP_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| anyhow!("Invalid HTTP_PORT: {}", e))?,
        })
    }

    pub fn mint_for(&self, token: TokenCode) -> Option<Pubkey> {
        self.token_mints.get(&token).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.quiet_period_ms, 800);
        assert_eq!(config.cache_name, "paymesol-cache-v1");
        assert_eq!(config.api_hosts.len(), 2);
        assert_eq!(ASSET_MANIFEST.len(), 14);
    }

    #[test]
    fn test_mints() {
        let config = Config::from_env().unwrap();
        assert!(config.mint_for(TokenCode::Eurc).is_some());
        assert!(config.mint_for(TokenCode::Usdc).is_some());
        assert!(config.mint_for(TokenCode::Sol).is_none());
    }
}
