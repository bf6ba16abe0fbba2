//! Tests for running the server on a real listener.

mod common;

use common::{ALICE, server_config, test_jwt};
use gatehouse::db::{Database, RefreshTokenRecord};
use gatehouse::routes::RouteTable;
use gatehouse::start_server;

fn no_routes() -> RouteTable {
    RouteTable { routes: Vec::new() }
}

#[tokio::test]
async fn test_start_server_on_random_port() {
    let db = Database::open(":memory:").await.unwrap();
    let jwt = test_jwt();
    let (handle, addr) = start_server(server_config(db, jwt.clone(), no_routes()), 0)
        .await
        .unwrap();
    assert_ne!(addr.port(), 0);

    let client = reqwest::Client::new();

    let health = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);
    assert_eq!(health.text().await.unwrap(), "OK");

    let anonymous = client
        .get(format!("http://{}/auth/me", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), reqwest::StatusCode::UNAUTHORIZED);

    let token = jwt.create_access(ALICE, Some("ROLE_USER")).unwrap().token;
    let me = client
        .get(format!("http://{}/auth/me", addr))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&me.text().await.unwrap()).unwrap();
    assert_eq!(body["identity"], ALICE);

    handle.abort();
}

#[tokio::test]
async fn test_start_server_purges_expired_records() {
    let db = Database::open(":memory:").await.unwrap();
    let store = db.refresh_tokens();
    store
        .upsert(&RefreshTokenRecord {
            identity: ALICE.to_string(),
            refresh_token: "stale".to_string(),
            created_at: 0,
        })
        .await
        .unwrap();
    assert_eq!(store.count().await.unwrap(), 1);

    let (handle, _addr) = start_server(server_config(db, test_jwt(), no_routes()), 0)
        .await
        .unwrap();

    assert_eq!(store.count().await.unwrap(), 0);
    handle.abort();
}
