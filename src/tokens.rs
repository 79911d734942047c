use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

/// Tokens the point of sale accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenCode {
    Eurc,
    Usdc,
    Sol,
}

impl TokenCode {
    pub const ALL: [TokenCode; 3] = [TokenCode::Eurc, TokenCode::Usdc, TokenCode::Sol];

    /// Identifier the price provider (CoinGecko) uses for this token.
    pub fn coingecko_id(&self) -> &'static str {
        match self {
            TokenCode::Eurc => "euro-coin",
            TokenCode::Usdc => "usd-coin",
            TokenCode::Sol => "solana",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenCode::Eurc => "EURC",
            TokenCode::Usdc => "USDC",
            TokenCode::Sol => "SOL",
        }
    }
}

impl fmt::Display for TokenCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EURC" => Ok(TokenCode::Eurc),
            "USDC" => Ok(TokenCode::Usdc),
            "SOL" => Ok(TokenCode::Sol),
            other => Err(anyhow!("Unsupported token: {}", other)),
        }
    }
}
