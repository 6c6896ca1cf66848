//! Invoice automation
//!
//! Consumes `contract:receipt` queue messages. For each message the invoice
//! row is loaded together with the active accountants watching that
//! contract, the receipt is processed on-chain to obtain an invoice number,
//! non-fiat amounts get an FX valuation, and each accountant's email tasks
//! go out with the rendered PDF attached. Failures are written back onto
//! the invoice row and re-raised so the queue redelivers the message.

use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::primitives::U256;
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use chrono::Utc;
use resend_rs::types::{Attachment, CreateEmailBaseOptions};
use resend_rs::Resend;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

use crate::entities::{accountants, invoices, prelude::*};
use crate::error::ApiError;
use crate::models::accountant::{
    address_book_secret_name, parse_tasks, vault_secret_name, AccountingTask, EmailRecipient,
};
use crate::models::invoice::{parse_queue_key, queue_key};
use crate::services::ingest::InvoiceStore;
use crate::services::prices::FxService;
use crate::services::pdf::PdfService;
use crate::services::registry;
use crate::services::vault::VaultService;

sol! {
    #[sol(rpc)]
    interface IInvoiceProcessor {
        function process(string calldata receipt) external returns (uint256 invoiceNr);
        function processExternal(string calldata contractId, string calldata receipt)
            external returns (uint256 invoiceNr);
    }
}

/// Valuation currency for non-fiat invoices.
const VALUATION_CURRENCY: &str = "USD";

/// Outgoing email seam; production uses Resend.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_invoice(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        pdf: &[u8],
        filename: &str,
    ) -> Result<(), ApiError>;
}

pub struct ResendMailer {
    client: Resend,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: &str, from: String) -> Self {
        Self {
            client: Resend::new(api_key),
            from,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_invoice(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        pdf: &[u8],
        filename: &str,
    ) -> Result<(), ApiError> {
        let email = CreateEmailBaseOptions::new(&self.from, [to], subject)
            .with_html(html)
            .with_attachment(Attachment::from_content(pdf.to_vec()).with_filename(filename));
        self.client
            .emails
            .send(email)
            .await
            .map_err(|err| ApiError::Upstream(format!("email send failed: {}", err)))?;
        Ok(())
    }
}

/// Address-book contact record.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Contact {
    pub account: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

pub struct AutomationService {
    db: DatabaseConnection,
    fx: FxService,
    pdf: PdfService,
    vault: VaultService,
    mailer: Arc<dyn Mailer>,
    client: reqwest::Client,
}

impl AutomationService {
    pub fn new(
        db: DatabaseConnection,
        fx: FxService,
        pdf: PdfService,
        vault: VaultService,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            db,
            fx,
            pdf,
            vault,
            mailer,
            client: reqwest::Client::new(),
        }
    }

    /// Runs the full automation flow for one queue message. The error, if
    /// any, has already been written onto the invoice row when this returns.
    pub async fn process_message(&self, message: &str) -> Result<(), ApiError> {
        let (contract, receipt) = parse_queue_key(message)
            .ok_or_else(|| ApiError::Validation(format!("malformed queue message {}", message)))?;

        let invoice = Invoices::find()
            .filter(invoices::Column::Contract.eq(&contract))
            .filter(invoices::Column::Receipt.eq(&receipt))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("no invoice for {}:{}", contract, receipt))
            })?;

        match self.automate(&invoice).await {
            Ok(()) => {
                let mut row = invoices::ActiveModel::from(invoice);
                row.error = Set(None);
                row.automation_finished_at = Set(Some(Utc::now().into()));
                row.modified_at = Set(Utc::now().into());
                row.update(&self.db).await?;
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    contract = %contract,
                    receipt = %receipt,
                    error = %err,
                    "Invoice automation failed"
                );
                let mut row = invoices::ActiveModel::from(invoice);
                row.error = Set(Some(err.to_string()));
                row.modified_at = Set(Utc::now().into());
                row.update(&self.db).await?;
                Err(err)
            }
        }
    }

    async fn automate(&self, invoice: &invoices::Model) -> Result<(), ApiError> {
        let accountants = Accountants::find()
            .filter(
                sea_orm::Condition::any()
                    .add(accountants::Column::Contract.eq(&invoice.contract))
                    .add(accountants::Column::Workflow.eq(&invoice.contract)),
            )
            .filter(accountants::Column::IsActive.eq(true))
            .all(&self.db)
            .await?;
        if accountants.is_empty() {
            return Err(ApiError::NotFound(format!(
                "no active accountant watches contract {}",
                invoice.contract
            )));
        }

        let mut invoice = invoice.clone();
        for accountant in &accountants {
            if invoice.invoice_nr.is_none() {
                let nr = self.process_on_chain(accountant, &invoice).await?;
                let mut row = invoices::ActiveModel::from(invoice.clone());
                row.invoice_nr = Set(Some(nr));
                row.process_fee = Set(accountant.process_fee);
                row.processed_at = Set(Some(Utc::now().into()));
                row.modified_at = Set(Utc::now().into());
                invoice = row.update(&self.db).await?;
            }
            if !invoice.is_fiat && invoice.alternative_fx_value.is_none() {
                if let Some(valued) = self.value_in_fiat(&invoice).await? {
                    let mut row = invoices::ActiveModel::from(invoice.clone());
                    row.alternative_currency = Set(Some(VALUATION_CURRENCY.to_string()));
                    row.alternative_fx_value = Set(Some(valued.to_string()));
                    row.modified_at = Set(Utc::now().into());
                    invoice = row.update(&self.db).await?;
                }
            }
            self.dispatch_tasks(accountant, &invoice).await?;
        }
        Ok(())
    }

    /// Calls `process` on the accountant's own workflow contract, or
    /// `processExternal` when the receipt came from another contract. The
    /// call is simulated first to learn the invoice number, then sent.
    async fn process_on_chain(
        &self,
        accountant: &accountants::Model,
        invoice: &invoices::Model,
    ) -> Result<i64, ApiError> {
        let workflow_url = accountant.workflow.as_deref().ok_or_else(|| {
            ApiError::Validation(format!("accountant {} has no workflow", accountant.id))
        })?;
        let workflow = registry::find_by_url(&self.db, workflow_url, None).await?;
        let resolved = registry::resolve_evm(workflow)?;

        let secret = self
            .vault
            .get_secret(&vault_secret_name(&accountant.id))
            .await?;
        let signer: PrivateKeySigner = secret
            .trim()
            .parse()
            .map_err(|_| ApiError::Validation("stored signing key is invalid".into()))?;
        let wallet = EthereumWallet::from(signer);
        let rpc_url = resolved
            .endpoint
            .parse()
            .map_err(|err| ApiError::Validation(format!("bad rpc endpoint: {}", err)))?;
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(rpc_url);
        let processor = IInvoiceProcessor::new(resolved.contract, &provider);

        let own_contract = accountant.contract.as_deref() == Some(invoice.contract.as_str());
        let nr: U256 = if own_contract {
            let call = processor.process(invoice.receipt.clone());
            let simulated = call
                .call()
                .await
                .map_err(|err| ApiError::Upstream(format!("process call failed: {}", err)))?;
            call.send()
                .await
                .map_err(|err| ApiError::Upstream(format!("process send failed: {}", err)))?
                .watch()
                .await
                .map_err(|err| ApiError::Upstream(format!("process not mined: {}", err)))?;
            simulated.invoiceNr
        } else {
            let call =
                processor.processExternal(invoice.contract.clone(), invoice.receipt.clone());
            let simulated = call
                .call()
                .await
                .map_err(|err| ApiError::Upstream(format!("processExternal call failed: {}", err)))?;
            call.send()
                .await
                .map_err(|err| ApiError::Upstream(format!("processExternal send failed: {}", err)))?
                .watch()
                .await
                .map_err(|err| ApiError::Upstream(format!("processExternal not mined: {}", err)))?;
            simulated.invoiceNr
        };

        i64::try_from(nr)
            .map_err(|_| ApiError::Upstream(format!("invoice number {} out of range", nr)))
    }

    /// FX valuation of a non-fiat amount; `None` when the invoice carries no
    /// parseable amount.
    async fn value_in_fiat(&self, invoice: &invoices::Model) -> Result<Option<Decimal>, ApiError> {
        let (amount, currency) = match (&invoice.amount_string, &invoice.currency) {
            (Some(amount), Some(currency)) => (amount, currency),
            _ => return Ok(None),
        };
        let amount: Decimal = match amount.parse() {
            Ok(amount) => amount,
            Err(_) => return Ok(None),
        };
        let rate = self.fx.token_rate(currency, VALUATION_CURRENCY).await?;
        Ok(Some((amount * rate).round_dp(2)))
    }

    async fn dispatch_tasks(
        &self,
        accountant: &accountants::Model,
        invoice: &invoices::Model,
    ) -> Result<(), ApiError> {
        let tasks = parse_tasks(accountant.tasks.as_deref()).map_err(|err| {
            ApiError::Validation(format!(
                "accountant {} has invalid tasks: {}",
                accountant.id, err
            ))
        })?;
        if tasks.is_empty() {
            return Ok(());
        }

        let contacts = self.fetch_address_book(accountant).await?;
        let buyer = find_contact(&contacts, invoice.to_account.as_deref());
        let seller = find_contact(&contacts, invoice.from_account.as_deref());

        let html = render_invoice_html(invoice, accountant, buyer, seller);
        let pdf = self.pdf.render(&html).await?;
        let filename = format!(
            "invoice-{}.pdf",
            invoice.invoice_nr.unwrap_or_default()
        );
        let subject = format!(
            "Invoice {} for {}",
            invoice.invoice_nr.unwrap_or_default(),
            invoice.contract
        );

        for task in &tasks {
            let AccountingTask::SendEmail { recipient } = task;
            let Some(address) = resolve_recipient(recipient, buyer, seller) else {
                tracing::warn!(
                    accountant = %accountant.id,
                    receipt = %invoice.receipt,
                    "Email task has no resolvable recipient, skipping"
                );
                continue;
            };
            self.mailer
                .send_invoice(address, &subject, &html, &pdf, &filename)
                .await?;
        }
        Ok(())
    }

    async fn fetch_address_book(
        &self,
        accountant: &accountants::Model,
    ) -> Result<Vec<Contact>, ApiError> {
        let url = match accountant.address_book_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => return Ok(Vec::new()),
        };
        let key = self
            .vault
            .get_secret(&address_book_secret_name(&accountant.id))
            .await
            .unwrap_or_default();
        let mut request = self.client.get(url);
        if !key.is_empty() {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|err| ApiError::Upstream(format!("address book fetch failed: {}", err)))?;
        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "address book returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|err| ApiError::Upstream(format!("address book decode failed: {}", err)))
    }
}

/// Re-enqueues automation for an invoice. Guarded: an inactive accountant
/// fails the request before anything is enqueued.
pub async fn reprocess(
    store: &dyn InvoiceStore,
    accountant: &accountants::Model,
    contract: &str,
    receipt: &str,
) -> Result<(), ApiError> {
    if !accountant.is_active {
        return Err(ApiError::Validation(format!(
            "accountant {} is not active",
            accountant.id
        )));
    }
    store.enqueue(&queue_key(contract, receipt)).await
}

fn find_contact<'a>(contacts: &'a [Contact], account: Option<&str>) -> Option<&'a Contact> {
    let account = account?;
    contacts.iter().find(|contact| contact.account == account)
}

fn resolve_recipient<'a>(
    recipient: &'a EmailRecipient,
    buyer: Option<&'a Contact>,
    seller: Option<&'a Contact>,
) -> Option<&'a str> {
    match recipient {
        EmailRecipient::Buyer => buyer.and_then(|c| c.email.as_deref()),
        EmailRecipient::Seller => seller.and_then(|c| c.email.as_deref()),
        EmailRecipient::Fixed { address } => Some(address.as_str()),
    }
}

/// VAT breakdown of a gross amount at `rate` percent.
pub fn vat_breakdown(gross: Decimal, rate_percent: Decimal) -> (Decimal, Decimal) {
    let divisor = Decimal::ONE + rate_percent / Decimal::ONE_HUNDRED;
    let net = (gross / divisor).round_dp(2);
    let vat = gross - net;
    (net, vat)
}

fn render_invoice_html(
    invoice: &invoices::Model,
    accountant: &accountants::Model,
    buyer: Option<&Contact>,
    seller: Option<&Contact>,
) -> String {
    let amount = invoice.amount_string.as_deref().unwrap_or("-");
    let currency = invoice.currency.as_deref().unwrap_or("");
    let article = invoice.article.as_deref().unwrap_or("-");
    let buyer_name = buyer
        .and_then(|c| c.name.as_deref())
        .or(invoice.to_account.as_deref())
        .unwrap_or("-");
    let seller_name = seller
        .and_then(|c| c.name.as_deref())
        .or(invoice.from_account.as_deref())
        .unwrap_or("-");
    let vat_line = match (
        invoice.amount_string.as_deref().and_then(|a| a.parse::<Decimal>().ok()),
        accountant.process_fee,
    ) {
        (Some(gross), Some(rate)) => {
            let (net, vat) = vat_breakdown(gross, rate);
            format!(
                "<tr><td>Net</td><td>{} {}</td></tr><tr><td>VAT ({}%)</td><td>{} {}</td></tr>",
                net, currency, rate, vat, currency
            )
        }
        _ => String::new(),
    };
    let fx_line = match (&invoice.alternative_fx_value, &invoice.alternative_currency) {
        (Some(value), Some(currency)) => {
            format!("<tr><td>Value</td><td>{} {}</td></tr>", value, currency)
        }
        _ => String::new(),
    };
    format!(
        "<html><body><h1>Invoice {nr}</h1>\
         <p>{seller} invoices {buyer}</p>\
         <table>\
         <tr><td>Article</td><td>{article}</td></tr>\
         <tr><td>Amount</td><td>{amount} {currency}</td></tr>\
         {vat_line}{fx_line}\
         </table></body></html>",
        nr = invoice.invoice_nr.unwrap_or_default(),
        seller = seller_name,
        buyer = buyer_name,
        article = article,
        amount = amount,
        currency = currency,
        vat_line = vat_line,
        fx_line = fx_line,
    )
}
