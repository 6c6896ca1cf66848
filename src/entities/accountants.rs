//! SeaORM Entity for accountants
//!
//! Invoice-automation configuration per watched contract: process fee,
//! serialized task list and the address-book reference.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accountants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: Option<String>,
    pub contract: Option<String>,
    pub workflow: Option<String>,
    pub is_deployed: bool,
    pub is_active: bool,
    pub is_public: bool,
    pub process_fee: Option<Decimal>,
    pub address_book_url: Option<String>,
    pub public_key: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub tasks: Option<String>,
    pub contact_info: Option<String>,
    pub selected_chain: i32,
    pub selected_blockchain_kind: i32,
    pub created_at: DateTimeWithTimeZone,
    pub modified_at: DateTimeWithTimeZone,
    pub activated_at: Option<DateTimeWithTimeZone>,
    pub deployed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
