mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::{DatabaseBackend, MockDatabase};
use serde_json::{json, Value};
use tower::ServiceExt;

use ada_backend::entities::{accountants, api_keys, profiles, workflows};
use ada_backend::handlers::{accountant, invoice, operations};

use crate::common::test_state;

const PROCESS_ABI: &str = r#"[
    {"inputs":[{"internalType":"uint256","name":"id","type":"uint256"},
               {"internalType":"string","name":"receipt","type":"string"}],
     "name":"process","outputs":[],
     "stateMutability":"nonpayable","type":"function"}
]"#;

fn api_key_row() -> api_keys::Model {
    api_keys::Model {
        key: "k-1".into(),
        user_id: "auth0|user".into(),
        created_at: Utc::now().into(),
    }
}

fn profile_row() -> profiles::Model {
    profiles::Model {
        user_id: "auth0|user".into(),
        alchemy_key: Some("alchemy".into()),
        bundler_policy_id: None,
        submit_delay_ms: 0,
        created_at: Utc::now().into(),
    }
}

fn workflow_row() -> workflows::Model {
    workflows::Model {
        id: 1,
        url: "silver".into(),
        user_id: "auth0|user".into(),
        project: None,
        object: None,
        abi: PROCESS_ABI.into(),
        selected_chain: 2,
        selected_blockchain_kind: 0,
        testnet_address: Some("0x00000000000000000000000000000000000000aa".into()),
        mainnet_address: None,
        created_at: Utc::now().into(),
        modified_at: Utc::now().into(),
    }
}

fn operations_router(db: sea_orm::DatabaseConnection) -> Router {
    Router::new()
        .route("/api/operations/build", post(operations::build_operations))
        .with_state(test_state(db))
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn build_rejects_unknown_api_key() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<api_keys::Model>::new()])
        .into_connection();
    let app = operations_router(db);

    let request = Request::builder()
        .method("POST")
        .uri("/api/operations/build")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "apiKey": "nope", "operations": [] }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("invalid API key"));
}

#[tokio::test]
async fn build_returns_signed_operation_envelope() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![api_key_row()]])
        .append_query_results([vec![profile_row()]])
        .append_query_results([vec![workflow_row()]])
        .into_connection();
    let app = operations_router(db);

    let payload = json!({
        "apiKey": "k-1",
        "operations": [{
            "id": "op-1",
            "workflow": "silver",
            "method": "process",
            "params": [7, "r-1"],
            "sender": "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a"
        }]
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/operations/build")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "OK");
    let succeeded = body["successfulOperations"].as_array().unwrap();
    assert_eq!(succeeded.len(), 1);
    assert_eq!(succeeded[0]["ids"], json!(["op-1"]));
    assert!(succeeded[0]["userOp"]["signature"].as_str().unwrap().len() > 2);
    assert!(body["failedOperations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn build_reports_bad_method_in_failed_operations() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![api_key_row()]])
        .append_query_results([vec![profile_row()]])
        .append_query_results([vec![workflow_row()]])
        .into_connection();
    let app = operations_router(db);

    let payload = json!({
        "apiKey": "k-1",
        "operations": [{
            "id": "op-1",
            "workflow": "silver",
            "method": "refund",
            "params": [],
            "sender": "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a"
        }]
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/operations/build")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    // Business failures still answer 200; the detail lives in the body.
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let failed = body["failedOperations"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0]["error"].as_str().unwrap().contains("refund"));
}

#[tokio::test]
async fn event_batch_with_only_malformed_messages_fails_with_aggregate() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let app = Router::new()
        .route("/api/invoices/events", post(invoice::store_events))
        .with_state(test_state(db));

    let payload = json!([
        { "id": "", "contract": "silver.test" },
        { "id": "r-2", "contract": "" }
    ]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/invoices/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("2 of 2 receipt events failed"));
}

#[tokio::test]
async fn anonymous_accountant_listing_serves_public_rows() {
    let row = accountants::Model {
        id: "acc-1".into(),
        user_id: "auth0|someone".into(),
        name: Some("Books Ltd".into()),
        contract: Some("silver.test".into()),
        workflow: Some("silver".into()),
        is_deployed: true,
        is_active: true,
        is_public: true,
        process_fee: None,
        address_book_url: None,
        public_key: None,
        tasks: None,
        contact_info: None,
        selected_chain: 2,
        selected_blockchain_kind: 0,
        created_at: Utc::now().into(),
        modified_at: Utc::now().into(),
        activated_at: None,
        deployed_at: None,
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![row]])
        .into_connection();
    let app = Router::new()
        .route("/api/accountants", get(accountant::list_accountants))
        .with_state(test_state(db));

    let request = Request::builder()
        .uri("/api/accountants")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "acc-1");
    assert_eq!(rows[0]["isPublic"], true);
}

#[tokio::test]
async fn accountant_upsert_requires_a_bearer_token() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let app = Router::new()
        .route("/api/accountants", post(accountant::upsert_accountant))
        .with_state(test_state(db));

    let payload = json!({ "id": "acc-1", "name": "Books Ltd" });
    let request = Request::builder()
        .method("POST")
        .uri("/api/accountants")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logo_upload_requires_a_bearer_token() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let app = Router::new()
        .route("/api/accountants/{id}/logo", post(accountant::upload_logo))
        .with_state(test_state(db));

    let request = Request::builder()
        .method("POST")
        .uri("/api/accountants/acc-1/logo")
        .header(
            header::CONTENT_TYPE,
            "multipart/form-data; boundary=logoboundary",
        )
        .body(Body::from(
            "--logoboundary\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"logo.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             png-bytes\r\n\
             --logoboundary--\r\n",
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
