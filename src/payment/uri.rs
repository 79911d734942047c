use anyhow::Result;
use bigdecimal::BigDecimal;
use url::Url;

use super::PaymentDescriptor;

/// Encode a descriptor as a Solana Pay URL:
/// `solana:<recipient>?amount=..[&spl-token=..]&label=..&message=..`.
///
/// The `spl-token` parameter is omitted for native SOL. Query encoding is
/// the `url` crate's job, not ours.
pub fn encode_url(descriptor: &PaymentDescriptor) -> Result<Url> {
    let mut url = Url::parse(&format!("solana:{}", descriptor.recipient))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("amount", &display_amount(&descriptor.amount));
        if let Some(mint) = descriptor.spl_token {
            query.append_pair("spl-token", &mint.to_string());
        }
        query.append_pair("label", &descriptor.label);
        query.append_pair("message", &descriptor.message);
    }

    Ok(url)
}

/// Decimal string without trailing zeros, the way wallet-side parsers
/// expect the amount to read.
fn display_amount(amount: &BigDecimal) -> String {
    amount.normalized().to_string()
}
