use std::env;
use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ada_backend::config::Settings;
use ada_backend::handlers::{accountant, invoice, nft, operations, subscription};
use ada_backend::jobs::automation_worker::start_automation_worker;
use ada_backend::jobs::subscription_sync::start_subscription_sync_job;
use ada_backend::services::auth::AuthService;
use ada_backend::services::automation::{AutomationService, ResendMailer};
use ada_backend::services::blobs::BlobService;
use ada_backend::services::bundler::BundlerClient;
use ada_backend::services::ingest::DbInvoiceStore;
use ada_backend::services::nft::NftService;
use ada_backend::services::pdf::PdfService;
use ada_backend::services::prices::FxService;
use ada_backend::services::vault::VaultService;
use ada_backend::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ada_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();
    let settings = Arc::new(Settings::from_env());

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let auth = Arc::new(AuthService::new(
        settings.issuer.clone(),
        settings.audience.clone(),
    ));
    let vault = VaultService::new(settings.vault_url.clone(), settings.vault_token.clone());
    let fx = FxService::new(settings.coingecko_url.clone());
    let pdf = PdfService::new(settings.pdf_render_url.clone());
    let mailer = Arc::new(ResendMailer::new(
        &settings.resend_api_key,
        settings.email_from.clone(),
    ));
    let automation = Arc::new(AutomationService::new(
        db.clone(),
        fx,
        pdf,
        vault.clone(),
        mailer,
    ));

    let state = AppState {
        db: db.clone(),
        auth,
        bundler: Arc::new(BundlerClient::new(settings.bundler_url.clone())),
        nft: Arc::new(NftService::new(settings.nft_networks.clone())),
        automation: automation.clone(),
        store: Arc::new(DbInvoiceStore::new(db.clone())),
        vault,
        blobs: BlobService::new(
            settings.blob_store_url.clone(),
            settings.blob_store_token.clone(),
        ),
        settings: settings.clone(),
    };

    // Background jobs
    start_automation_worker(db.clone(), automation).await;
    if let Some(contract) = settings.subscription_contract {
        start_subscription_sync_job(db.clone(), contract, settings.subscription_kind).await;
    }

    // Build router
    let app = Router::new()
        .route("/", get(health))
        .route("/api/operations/build", post(operations::build_operations))
        .route("/api/operations/submit", post(operations::submit_operations))
        .route("/api/accountants", get(accountant::list_accountants))
        .route("/api/accountants", post(accountant::upsert_accountant))
        .route("/api/accountants/{id}", get(accountant::get_accountant))
        .route("/api/accountants/{id}", delete(accountant::delete_accountant))
        .route(
            "/api/accountants/{id}/generate-key",
            post(accountant::generate_public_key),
        )
        .route(
            "/api/accountants/{id}/logo",
            post(accountant::upload_logo),
        )
        .route("/api/invoices/events", post(invoice::store_events))
        .route("/api/invoices/{contract}", get(invoice::list_invoices))
        .route(
            "/api/invoices/{contract}/{receipt}/reprocess",
            post(invoice::reprocess_invoice),
        )
        .route("/api/nfts", get(nft::owned_nfts))
        .route("/api/metadata/{workflow}/{id}", get(nft::item_metadata))
        .route("/api/subscriptions", get(subscription::get_subscriptions))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!("Server listening on {}", addr);
    axum::serve(listener, app).await.expect("Server failed");
}

async fn health() -> &'static str {
    "Ada backend up"
}
