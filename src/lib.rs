// src/lib.rs

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use config::Settings;
use services::automation::AutomationService;
use services::auth::AuthService;
use services::blobs::BlobService;
use services::bundler::AccountAbstractionApi;
use services::ingest::DbInvoiceStore;
use services::nft::NftService;
use services::vault::VaultService;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub auth: Arc<AuthService>,
    pub bundler: Arc<dyn AccountAbstractionApi>,
    pub nft: Arc<NftService>,
    pub automation: Arc<AutomationService>,
    pub store: Arc<DbInvoiceStore>,
    pub vault: VaultService,
    pub blobs: BlobService,
    pub settings: Arc<Settings>,
}

pub mod entities {
    pub mod prelude;

    pub mod accountants;
    pub mod api_keys;
    pub mod automation_queue;
    pub mod invoices;
    pub mod profiles;
    pub mod subscriptions;
    pub mod workflows;
}

pub mod services {
    pub mod auth;
    pub mod automation;
    pub mod blobs;
    pub mod builder;
    pub mod bundler;
    pub mod ingest;
    pub mod nft;
    pub mod pdf;
    pub mod prices;
    pub mod profile;
    pub mod registry;
    pub mod submitter;
    pub mod subscription;
    pub mod vault;
}

pub mod handlers {
    pub mod accountant;
    pub mod invoice;
    pub mod nft;
    pub mod operations;
    pub mod subscription;
}

pub mod jobs {
    pub mod automation_worker;
    pub mod subscription_sync;
}

pub mod config;
pub mod error;
pub mod models;
