//! SurrealDB connection management.

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::repository::{
    SurrealAuditLogRepository, SurrealDriftLedger, SurrealHandoffSessionRepository,
    SurrealIncidentRepository,
};
use crate::schema::run_migrations;

/// Configuration for connecting to the operations store.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket address (e.g., `127.0.0.1:8000`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials.
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "watchdesk".into(),
            database: "opsdesk".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

/// An authenticated connection with the namespace and database selected.
///
/// Cloning is cheap; every clone shares the underlying client.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to operations store"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Connected to operations store");
        Ok(Self { db })
    }

    /// Apply any pending schema migrations; returns the versions applied.
    pub async fn migrate(&self) -> Result<Vec<u32>, DbError> {
        run_migrations(&self.db).await
    }

    pub fn incidents(&self) -> SurrealIncidentRepository<Client> {
        SurrealIncidentRepository::new(self.db.clone())
    }

    pub fn drift_ledger(&self) -> SurrealDriftLedger<Client> {
        SurrealDriftLedger::new(self.db.clone())
    }

    pub fn handoff_sessions(&self) -> SurrealHandoffSessionRepository<Client> {
        SurrealHandoffSessionRepository::new(self.db.clone())
    }

    pub fn audit_log(&self) -> SurrealAuditLogRepository<Client> {
        SurrealAuditLogRepository::new(self.db.clone())
    }
}
