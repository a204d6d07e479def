//! Laptop distribution verification service: process entry point.

mod config;

use anyhow::Context;
use lapdist_db::DbManager;
use lapdist_db::repository::{
    SurrealBeneficiaryRepository, SurrealIssuedStatusRepository, SurrealOtpRepository,
    SurrealUpgradeRequestRepository, SurrealVerificationStatusRepository,
};
use lapdist_verify::face_client::RemoteFaceEngine;
use lapdist_verify::files::LocalFileStore;
use lapdist_verify::notifier::HttpNotifier;
use lapdist_verify::{
    FaceMatcher, IssuanceLedger, IssuanceService, OtpGate, OtpIssuer, UpgradeWorkflow,
    VerificationService,
};
use surrealdb::engine::remote::ws::Client;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

type Beneficiaries = SurrealBeneficiaryRepository<Client>;
type Statuses = SurrealVerificationStatusRepository<Client>;
type Issued = SurrealIssuedStatusRepository<Client>;

/// Wired services, handed to the transport layer.
#[allow(dead_code)]
struct App {
    verification: VerificationService<Beneficiaries, Statuses, Issued, LocalFileStore, RemoteFaceEngine>,
    otp: OtpGate<Beneficiaries, Statuses, SurrealOtpRepository<Client>, HttpNotifier>,
    issuance: IssuanceService<Beneficiaries, Statuses, Issued, LocalFileStore>,
    upgrades: UpgradeWorkflow<Beneficiaries, Statuses, Issued, SurrealUpgradeRequestRepository<Client>>,
}

impl App {
    fn build(config: &ServerConfig, db: &DbManager) -> anyhow::Result<Self> {
        let files = LocalFileStore::new(&config.upload_root);

        let face_url = config.face_service_url.clone();
        let handle = tokio::runtime::Handle::current();
        let face = FaceMatcher::new(
            move || RemoteFaceEngine::new(face_url.clone(), handle.clone()),
            &config.verification,
        );

        let verification = VerificationService::new(
            db.beneficiaries(),
            db.verification_statuses(),
            db.issued_statuses(),
            files.clone(),
            face,
            config.verification.clone(),
        )
        .context("verification service")?;

        let otp = OtpGate::new(
            db.beneficiaries(),
            db.verification_statuses(),
            OtpIssuer::new(
                db.otps(),
                HttpNotifier::new(&config.notify_url, &config.notify_token),
                &config.verification,
            ),
            config.verification.admin_email.clone(),
        );

        let issuance = IssuanceService::new(
            db.beneficiaries(),
            db.verification_statuses(),
            IssuanceLedger::new(db.issued_statuses(), files),
        );

        let upgrades = UpgradeWorkflow::new(
            db.beneficiaries(),
            db.verification_statuses(),
            db.issued_statuses(),
            db.upgrade_requests(),
        );

        Ok(Self {
            verification,
            otp,
            issuance,
            upgrades,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("lapdist=info".parse()?))
        .json()
        .init();

    tracing::info!("Starting laptop distribution service...");

    let config = ServerConfig::from_env()?;
    let db = DbManager::connect(&config.db)
        .await
        .context("opening the distribution database")?;

    let _app = App::build(&config, &db)?;
    tracing::info!(upload_root = %config.upload_root.display(), "Services ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Laptop distribution service stopped.");
    Ok(())
}
