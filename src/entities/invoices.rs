//! SeaORM Entity for invoices
//!
//! One row per on-chain receipt, keyed (contract, receipt). The processing
//! step sets invoice_nr/processed_at; automation stamps
//! automation_finished_at or writes error. Merge semantics are
//! last-writer-wins.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub contract: String,
    pub receipt: String,
    pub from_account: Option<String>,
    pub to_account: Option<String>,
    pub article: Option<String>,
    pub amount_string: Option<String>,
    pub currency: Option<String>,
    pub is_fiat: bool,
    pub invoice_nr: Option<i64>,
    pub process_fee: Option<Decimal>,
    pub alternative_currency: Option<String>,
    pub alternative_fx_value: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub modified_at: DateTimeWithTimeZone,
    pub processed_at: Option<DateTimeWithTimeZone>,
    pub automation_finished_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
