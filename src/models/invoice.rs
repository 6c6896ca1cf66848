//! Invoice event payloads and queue-key helpers

use serde::{Deserialize, Serialize};

use crate::entities::invoices;
use crate::models::sanitize;

/// On-chain receipt event as delivered by the event feed, e.g.
/// `{"id":"r-1","contract":"silver.test","from":"a","to":"b","article":"x",
///   "amount":"1000","currency":"EUR"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptEvent {
    pub id: String,
    pub contract: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub article: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
}

const FIAT_CURRENCIES: &[&str] = &["USD", "EUR", "GBP", "CHF", "JPY", "SEK", "NOK", "DKK"];

/// Currency determines the valuation path: fiat invoices are emailed as-is,
/// on-chain currencies get an FX valuation first.
pub fn is_fiat_currency(currency: &str) -> bool {
    FIAT_CURRENCIES
        .iter()
        .any(|fiat| fiat.eq_ignore_ascii_case(currency))
}

/// Automation queue message: `<contract>:<receipt>`.
pub fn queue_key(contract: &str, receipt: &str) -> String {
    format!("{}:{}", sanitize(contract), sanitize(receipt))
}

/// Splits a queue message back into (contract, receipt). Quotes are stripped
/// the way the queue producer strips them.
pub fn parse_queue_key(message: &str) -> Option<(String, String)> {
    let cleaned = message.replace('"', "");
    let (contract, receipt) = cleaned.split_once(':')?;
    if contract.is_empty() || receipt.is_empty() {
        return None;
    }
    Some((contract.to_string(), receipt.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub contract: String,
    pub receipt: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub article: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub is_fiat: bool,
    pub invoice_nr: Option<i64>,
    pub error: Option<String>,
    pub created_at: String,
    pub processed_at: Option<String>,
    pub automation_finished_at: Option<String>,
}

impl From<invoices::Model> for InvoiceResponse {
    fn from(model: invoices::Model) -> Self {
        Self {
            contract: model.contract,
            receipt: model.receipt,
            from: model.from_account,
            to: model.to_account,
            article: model.article,
            amount: model.amount_string,
            currency: model.currency,
            is_fiat: model.is_fiat,
            invoice_nr: model.invoice_nr,
            error: model.error,
            created_at: model.created_at.to_rfc3339(),
            processed_at: model.processed_at.map(|dt| dt.to_rfc3339()),
            automation_finished_at: model.automation_finished_at.map(|dt| dt.to_rfc3339()),
        }
    }
}
