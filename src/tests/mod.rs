use error_stack::Report;
use futures::future::FutureExt;
use sqlx::{PgConnection, PgPool};
use tracing::{event, instrument, Level};

use crate::{
    auth::{
        api_keys::{self, ApiKeyData},
        password::{self, HashedPassword},
        ExpiryStyle, SessionCookieBuilder,
    },
    users::{queries::create_new_user_with_prehashed_password, UserCreatePayload, UserId},
    Error,
};

pub mod client;

pub use client::TestClient;

pub const TEST_PASSWORD: &str = "the-test-password";

pub struct TestApp {
    /// Hold on to the shutdown signal so the server stays alive
    pub shutdown_tx: tokio::sync::oneshot::Sender<()>,
    /// An unauthenticated client
    pub client: TestClient,
    pub base_url: String,
    pub pg_pool: PgPool,
    pub server_task: tokio::task::JoinHandle<Result<(), Report<Error>>>,
}

#[derive(Clone, Debug)]
pub struct TestUser {
    pub user_id: UserId,
    pub email: String,
    pub password: String,
    pub api_key: String,
    pub client: TestClient,
}

pub struct BootstrappedData {
    pub admin_user: TestUser,
    pub user: TestUser,
    /// Authenticates fine but has `active = false`, so every permission gate rejects it.
    pub disabled_user: TestUser,
}

pub async fn start_app(pg_pool: PgPool) -> (TestApp, BootstrappedData) {
    error_stack::Report::set_color_mode(error_stack::fmt::ColorMode::None);
    crate::tracing_config::test::init();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    // Make the shutdown future resolve to () so the type matches what Axum expects.
    let shutdown_rx = shutdown_rx.map(|_| ());

    let listener = crate::server::create_tcp_listener("127.0.0.1", 0)
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    let base_url = format!("http://127.0.0.1:{port}");

    let config = crate::server::Config {
        env: "test".into(),
        bind: crate::server::ServerBind::Listener(listener),
        insecure: true,
        request_timeout: std::time::Duration::from_secs(30),
        pg_pool: pg_pool.clone(),
        cookie_configuration: SessionCookieBuilder::new(
            false,
            tower_cookies::cookie::SameSite::Strict,
        ),
        session_expiry: ExpiryStyle::AfterIdle(std::time::Duration::from_secs(24 * 60 * 60)),
        hosts: vec![],
        api_cors: crate::server::CorsSetting::default(),
    };

    let server = crate::server::create_server(config)
        .await
        .expect("creating server");

    let test_client = TestClient::new(format!("{base_url}/api"));

    let bootstrapped_data = bootstrap_data(&pg_pool, &test_client).await;

    let server_task = tokio::task::spawn(server.run_with_shutdown_signal(shutdown_rx));

    event!(Level::INFO, "finished bootstrapping test");

    let app = TestApp {
        shutdown_tx,
        client: test_client,
        base_url,
        pg_pool,
        server_task,
    };

    (app, bootstrapped_data)
}

#[instrument(skip(db, base_client, password_hash))]
async fn add_test_user(
    db: &mut PgConnection,
    base_client: &TestClient,
    name: &str,
    is_admin: bool,
    password_hash: &HashedPassword,
) -> TestUser {
    let user_id = UserId::new();
    let key_data = ApiKeyData::new();

    let test_client = base_client.with_api_key(&key_data.key);

    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "-"));
    let user_payload = UserCreatePayload {
        email: email.clone(),
        name: name.to_string(),
        is_admin,
    };

    create_new_user_with_prehashed_password(
        &mut *db,
        user_id,
        user_payload,
        Some(password_hash.clone()),
    )
    .await
    .expect("Creating user");

    let key = api_keys::ApiKey {
        id: key_data.api_key_id,
        user_id,
        description: String::new(),
        active: true,
        expires_at: chrono::Utc::now() + chrono::Duration::days(365),
    };
    api_keys::add_api_key(&mut *db, &key, &key_data.hash)
        .await
        .expect("Adding api key");

    TestUser {
        user_id,
        email,
        password: TEST_PASSWORD.to_string(),
        api_key: key_data.key,
        client: test_client,
    }
}

async fn bootstrap_data(pg_pool: &PgPool, base_client: &TestClient) -> BootstrappedData {
    let password_hash = password::new_hash(TEST_PASSWORD.to_string())
        .await
        .expect("Hashing test password");

    let mut tx = pg_pool.begin().await.unwrap();

    let admin_user = add_test_user(&mut tx, base_client, "Admin", true, &password_hash).await;
    let user = add_test_user(&mut tx, base_client, "User", false, &password_hash).await;
    let disabled_user =
        add_test_user(&mut tx, base_client, "Disabled User", false, &password_hash).await;

    sqlx::query("UPDATE users SET active = false WHERE id = $1")
        .bind(disabled_user.user_id.as_uuid())
        .execute(&mut *tx)
        .await
        .expect("Disabling user");

    tx.commit().await.unwrap();

    BootstrappedData {
        admin_user,
        user,
        disabled_user,
    }
}
