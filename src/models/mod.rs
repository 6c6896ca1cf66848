use serde::{Deserialize, Serialize};

pub mod accountant;
pub mod invoice;
pub mod nft;
pub mod operation;
pub mod workflow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Strips single quotes from values embedded into lookup strings (queue keys,
/// vault secret names). Parameter binding covers SQL; this covers the rest.
pub fn sanitize(value: &str) -> String {
    value.replace('\'', "")
}
