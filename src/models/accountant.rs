//! Accountant DTOs and the automation task union
//!
//! Tasks are stored as JSON in the accountants row and validated at the
//! boundary as a tagged union instead of free-form payloads.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::accountants;

/// Who receives an automation email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum EmailRecipient {
    /// The invoice's `to` contact.
    Buyer,
    /// The invoice's `from` contact.
    Seller,
    /// A fixed address configured on the accountant.
    Fixed { address: String },
}

/// Automation tasks an accountant runs once an invoice is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountingTask {
    SendEmail { recipient: EmailRecipient },
}

pub fn parse_tasks(raw: Option<&str>) -> Result<Vec<AccountingTask>, serde_json::Error> {
    match raw {
        Some(json) if !json.trim().is_empty() => serde_json::from_str(json),
        _ => Ok(Vec::new()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertAccountantRequest {
    pub id: String,
    pub name: Option<String>,
    pub contract: Option<String>,
    pub workflow: Option<String>,
    #[serde(default)]
    pub is_deployed: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_public: bool,
    pub process_fee: Option<Decimal>,
    pub address_book_url: Option<String>,
    #[serde(default)]
    pub tasks: Vec<AccountingTask>,
    pub contact_info: Option<String>,
    #[serde(default)]
    pub selected_chain: i32,
    #[serde(default)]
    pub selected_blockchain_kind: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountantResponse {
    pub id: String,
    pub user: String,
    pub name: Option<String>,
    pub contract: Option<String>,
    pub workflow: Option<String>,
    pub is_deployed: bool,
    pub is_active: bool,
    pub is_public: bool,
    pub process_fee: Option<Decimal>,
    pub address_book_url: Option<String>,
    pub public_key: Option<String>,
    pub tasks: Vec<AccountingTask>,
    pub contact_info: Option<String>,
    pub selected_chain: i32,
    pub selected_blockchain_kind: i32,
    pub created_at: String,
    pub modified_at: String,
}

impl From<accountants::Model> for AccountantResponse {
    fn from(model: accountants::Model) -> Self {
        let tasks = parse_tasks(model.tasks.as_deref()).unwrap_or_default();
        Self {
            id: model.id,
            user: model.user_id,
            name: model.name,
            contract: model.contract,
            workflow: model.workflow,
            is_deployed: model.is_deployed,
            is_active: model.is_active,
            is_public: model.is_public,
            process_fee: model.process_fee,
            address_book_url: model.address_book_url,
            public_key: model.public_key,
            tasks,
            contact_info: model.contact_info,
            selected_chain: model.selected_chain,
            selected_blockchain_kind: model.selected_blockchain_kind,
            created_at: model.created_at.to_rfc3339(),
            modified_at: model.modified_at.to_rfc3339(),
        }
    }
}

/// Vault secret name for an accountant's signing key: `ada{id}` with
/// dashes stripped.
pub fn vault_secret_name(accountant_id: &str) -> String {
    format!("ada{}", accountant_id.replace('-', ""))
}

/// Vault secret name for an accountant's address-book key. Suffixed so it
/// never collides with the signing key stored under [`vault_secret_name`].
pub fn address_book_secret_name(accountant_id: &str) -> String {
    format!("{}book", vault_secret_name(accountant_id))
}

/// Blob name for an uploaded logo: the dashless accountant id, a short
/// unique suffix and the original filename. The suffix keeps re-uploads
/// from being masked by a stale cached copy.
pub fn logo_blob_name(accountant_id: &str, unique: &str, filename: &str) -> String {
    format!("{}{}{}", accountant_id.replace('-', ""), unique, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_round_trip_as_tagged_union() {
        let tasks = vec![
            AccountingTask::SendEmail {
                recipient: EmailRecipient::Buyer,
            },
            AccountingTask::SendEmail {
                recipient: EmailRecipient::Fixed {
                    address: "books@example.com".into(),
                },
            },
        ];
        let json = serde_json::to_string(&tasks).unwrap();
        assert!(json.contains("\"kind\":\"send_email\""));
        assert!(json.contains("\"target\":\"fixed\""));
        let parsed = parse_tasks(Some(&json)).unwrap();
        assert_eq!(parsed, tasks);
    }

    #[test]
    fn unknown_task_kind_is_rejected() {
        let raw = r#"[{"kind":"fax_invoice"}]"#;
        assert!(parse_tasks(Some(raw)).is_err());
    }

    #[test]
    fn empty_tasks_parse_to_none() {
        assert!(parse_tasks(None).unwrap().is_empty());
        assert!(parse_tasks(Some("  ")).unwrap().is_empty());
    }

    #[test]
    fn vault_name_strips_dashes() {
        assert_eq!(
            vault_secret_name("1f0c-aa-bb"),
            "ada1f0caabb".to_string()
        );
    }

    #[test]
    fn address_book_key_never_collides_with_the_signing_key() {
        assert_eq!(address_book_secret_name("1f0c-aa-bb"), "ada1f0caabbbook");
        assert_ne!(
            address_book_secret_name("1f0c-aa-bb"),
            vault_secret_name("1f0c-aa-bb")
        );
    }

    #[test]
    fn logo_blob_name_keeps_the_filename_visible() {
        assert_eq!(
            logo_blob_name("1f0c-aa-bb", "deadbeef", "logo.png"),
            "1f0caabbdeadbeeflogo.png"
        );
    }

    #[test]
    fn upsert_request_ignores_a_client_supplied_public_key() {
        // Only the generate-key endpoint may set the key.
        let raw = r#"{"id":"acc-1","name":"Books","publicKey":"0xdead"}"#;
        let request: UpsertAccountantRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.id, "acc-1");
        assert_eq!(request.name.as_deref(), Some("Books"));
    }
}
