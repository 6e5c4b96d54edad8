#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use sqlx::PgPool;

use jobly_api::auth::{create_token, password::hash_password};
use jobly_api::config::AppConfig;
use jobly_api::database::DatabaseManager;
use jobly_api::{app, AppState};

/// Nothing listens here, so any request that reaches the store fails.
const UNREACHABLE_DB: &str = "postgres://jobly@127.0.0.1:9/jobly_unreachable";

const SCHEMA: &str = include_str!("../../sql/schema.sql");

static COUNTER: AtomicU32 = AtomicU32::new(0);

pub struct TestServer {
    pub base_url: String,
    pub config: AppConfig,
    pub pool: PgPool,
    pub client: reqwest::Client,
}

impl TestServer {
    async fn spawn(database_url: &str) -> Result<Self> {
        let mut config = AppConfig::test();
        config.database.url = Some(database_url.to_string());
        config.security.jwt_secret = "integration-test-secret".to_string();

        let pool = DatabaseManager::connect_lazy(&config.database)?;
        let state = AppState::new(pool.clone(), config.clone());

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app(state)).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            config,
            pool,
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, username: &str, is_admin: bool) -> String {
        create_token(username, is_admin, &self.config.security.jwt_secret, 1)
            .expect("failed to sign test token")
    }

    /// Company the test's jobs can point at.
    pub async fn seed_company(&self) -> Result<String> {
        let handle = unique("c");
        sqlx::query("INSERT INTO companies (handle, name, description) VALUES ($1, $2, 'test')")
            .bind(&handle)
            .bind(format!("Company {}", handle))
            .execute(&self.pool)
            .await?;
        Ok(handle)
    }

    pub async fn seed_user(&self, is_admin: bool) -> Result<String> {
        let username = unique("u");
        sqlx::query(
            "INSERT INTO users (username, password, first_name, last_name, email, is_admin) \
             VALUES ($1, $2, 'First', 'Last', $3, $4)",
        )
        .bind(&username)
        .bind(hash_password("password1")?)
        .bind(format!("{}@email.com", username))
        .bind(is_admin)
        .execute(&self.pool)
        .await?;
        Ok(username)
    }
}

/// Server whose store is unreachable. For tests that must never touch it.
pub async fn spawn_app() -> Result<TestServer> {
    TestServer::spawn(UNREACHABLE_DB).await
}

/// Server backed by `DATABASE_URL`, with the schema applied. Tests using it
/// are `#[ignore]`d and run with `cargo test -- --ignored`.
pub async fn spawn_app_with_db() -> Result<TestServer> {
    let _ = dotenvy::dotenv();
    let url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set for store-backed tests")?;

    let server = TestServer::spawn(&url).await?;
    apply_schema(&server.pool).await?;
    Ok(server)
}

async fn apply_schema(pool: &PgPool) -> Result<()> {
    // Concurrent CREATE TABLE IF NOT EXISTS can still collide; serialize.
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock(7401)")
        .execute(&mut *tx)
        .await?;
    for statement in SCHEMA.split(';').map(str::trim).filter(|s| has_sql(s)) {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

fn has_sql(chunk: &str) -> bool {
    chunk
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with("--"))
}

/// Short lowercase name unlikely to collide across tests and runs.
pub fn unique(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}{:x}{:x}{}", prefix, std::process::id() % 0xfff, nanos, n)
}
