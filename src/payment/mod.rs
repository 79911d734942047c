pub mod uri;

use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use bigdecimal::BigDecimal;
use solana_sdk::pubkey::Pubkey;

use crate::config::Config;
use crate::tokens::TokenCode;

/// Everything needed to request one payment. Built once per QR generation
/// and handed to the URL encoder unchanged.
#[derive(Debug, Clone)]
pub struct PaymentDescriptor {
    pub recipient: Pubkey,
    /// `None` requests native SOL.
    pub spl_token: Option<Pubkey>,
    pub amount: BigDecimal,
    pub label: String,
    pub message: String,
}

/// Validate the converted amount and assemble a descriptor for `recipient`.
///
/// The amount must be a finite positive decimal; anything else aborts before
/// any encoding happens. Address validity is whatever `Pubkey` parsing
/// enforces, nothing more.
pub fn build_descriptor(
    config: &Config,
    recipient: &str,
    converted_amount: &str,
    token: TokenCode,
) -> Result<PaymentDescriptor> {
    let recipient = Pubkey::from_str(recipient)
        .map_err(|e| anyhow!("Invalid recipient address: {}", e))?;

    let amount = BigDecimal::from_str(converted_amount.trim())
        .map_err(|_| anyhow!("Please enter a valid EUR amount to convert."))?;
    if amount <= BigDecimal::from(0) {
        bail!("Please enter a valid EUR amount to convert.");
    }

    Ok(PaymentDescriptor {
        recipient,
        spl_token: config.mint_for(token),
        amount,
        label: config.merchant_label.clone(),
        message: config.merchant_message.clone(),
    })
}
