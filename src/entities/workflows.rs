//! SeaORM Entity for the workflows registry
//!
//! Written by the admin UI, read-only here: stored contract ABI plus the
//! per-kind contract addresses and chain selector.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "workflows")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub url: String,
    pub user_id: String,
    pub project: Option<String>,
    pub object: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub abi: String,
    pub selected_chain: i32,
    pub selected_blockchain_kind: i32,
    pub testnet_address: Option<String>,
    pub mainnet_address: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub modified_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
