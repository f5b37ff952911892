use std::sync::Arc;

use vendra_core::LoginId;
use vendra_gateway::app::{GatewayConfig, build_app};
use vendra_gateway::credentials::{StaticCredentials, VerifiedAccount};
use vendra_store::SharedStore;

#[tokio::main]
async fn main() {
    vendra_observability::init();

    let admin_key = signing_key("VENDRA_ADMIN_SIGNING_KEY", "dev-admin-secret");
    let member_key = signing_key("VENDRA_MEMBER_SIGNING_KEY", "dev-member-secret");

    let store = build_store();
    let credentials = Arc::new(dev_credentials());
    tracing::warn!("using built-in dev accounts; wire a real credential service for production");

    let app = build_app(
        store,
        credentials,
        GatewayConfig {
            admin_signing_key: admin_key,
            member_signing_key: member_key,
            key_prefix: "vendra".to_string(),
        },
    );

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}

fn signing_key(var: &str, dev_default: &str) -> Vec<u8> {
    std::env::var(var)
        .map(String::into_bytes)
        .unwrap_or_else(|_| {
            tracing::warn!("{var} not set; using insecure dev default");
            dev_default.as_bytes().to_vec()
        })
}

#[cfg(feature = "redis")]
fn build_store() -> Arc<dyn SharedStore> {
    match std::env::var("VENDRA_REDIS_URL") {
        Ok(url) => Arc::new(
            vendra_store::RedisStore::new(&url).expect("failed to open redis store"),
        ),
        Err(_) => {
            tracing::warn!("VENDRA_REDIS_URL not set; falling back to in-memory store");
            Arc::new(vendra_store::InMemoryStore::new())
        }
    }
}

#[cfg(not(feature = "redis"))]
fn build_store() -> Arc<dyn SharedStore> {
    tracing::warn!("built without the redis feature; sessions live in this process only");
    Arc::new(vendra_store::InMemoryStore::new())
}

fn dev_credentials() -> StaticCredentials {
    StaticCredentials::new()
        .with_admin(
            "admin",
            "admin123",
            VerifiedAccount {
                login_id: LoginId::Int(1),
                permissions: vec![
                    "pms:product:read".to_string(),
                    "pms:product:write".to_string(),
                    "oms:order:read".to_string(),
                ],
                roles: vec!["operator".to_string()],
            },
        )
        .with_member(
            "member",
            "member123",
            VerifiedAccount {
                login_id: LoginId::Int(1001),
                permissions: vec![],
                roles: vec![],
            },
        )
}
