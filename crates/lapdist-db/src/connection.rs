//! SurrealDB connection management.
//!
//! A [`DbManager`] is only handed out once the schema is current, so
//! every repository built from it can rely on the `issued_serial` and
//! `voucher_code` claim tables being defined.

use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::{Connection, Surreal};
use tracing::info;

use crate::error::DbError;
use crate::repository::{
    SurrealBeneficiaryRepository, SurrealIssuedStatusRepository, SurrealOtpRepository,
    SurrealUpgradeRequestRepository, SurrealVerificationStatusRepository,
};
use crate::schema::run_migrations;

/// Where the distribution database lives and how to sign in to it.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket address (e.g., `127.0.0.1:8000`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "lapdist".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

/// A migrated SurrealDB handle plus the repositories built on it.
#[derive(Clone)]
pub struct DbManager<C: Connection = Client> {
    db: Surreal<C>,
}

impl DbManager<Client> {
    /// Sign in to the remote server, select the distribution namespace
    /// and apply any pending migrations.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
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

        Self::attach(db).await
    }
}

impl<C: Connection> DbManager<C> {
    /// Adopt an already-selected handle (any engine) and bring its
    /// schema up to date.
    pub async fn attach(db: Surreal<C>) -> Result<Self, DbError> {
        run_migrations(&db).await?;
        info!("Distribution schema is current");
        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<C> {
        &self.db
    }

    pub fn beneficiaries(&self) -> SurrealBeneficiaryRepository<C> {
        SurrealBeneficiaryRepository::new(self.db.clone())
    }

    pub fn verification_statuses(&self) -> SurrealVerificationStatusRepository<C> {
        SurrealVerificationStatusRepository::new(self.db.clone())
    }

    pub fn issued_statuses(&self) -> SurrealIssuedStatusRepository<C> {
        SurrealIssuedStatusRepository::new(self.db.clone())
    }

    pub fn upgrade_requests(&self) -> SurrealUpgradeRequestRepository<C> {
        SurrealUpgradeRequestRepository::new(self.db.clone())
    }

    pub fn otps(&self) -> SurrealOtpRepository<C> {
        SurrealOtpRepository::new(self.db.clone())
    }
}
