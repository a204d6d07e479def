//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as
//! strings; satellite tables use the beneficiary UUID as record id so
//! each holds at most one row per beneficiary.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Beneficiaries (aggregate root)
-- =======================================================================
DEFINE TABLE beneficiary SCHEMAFULL;
DEFINE FIELD full_name ON TABLE beneficiary TYPE string;
DEFINE FIELD mobile_number ON TABLE beneficiary TYPE string;
DEFINE FIELD email ON TABLE beneficiary TYPE option<string>;
DEFINE FIELD coupon_code ON TABLE beneficiary TYPE option<string>;
DEFINE FIELD gift_card_code ON TABLE beneficiary TYPE option<string>;
DEFINE FIELD aadhar_number_hashed ON TABLE beneficiary TYPE string;
DEFINE FIELD aadhar_number_masked ON TABLE beneficiary TYPE string;
DEFINE FIELD photo ON TABLE beneficiary TYPE option<string>;
DEFINE FIELD store_id ON TABLE beneficiary TYPE option<string>;
DEFINE FIELD is_candidate_verified ON TABLE beneficiary TYPE bool \
    DEFAULT false;
DEFINE FIELD vendor_spoc_id ON TABLE beneficiary TYPE option<string>;
DEFINE FIELD created_at ON TABLE beneficiary TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE beneficiary TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_beneficiary_mobile ON TABLE beneficiary \
    COLUMNS mobile_number UNIQUE;
DEFINE INDEX idx_beneficiary_coupon ON TABLE beneficiary \
    COLUMNS coupon_code;
DEFINE INDEX idx_beneficiary_gift_card ON TABLE beneficiary \
    COLUMNS gift_card_code;

-- =======================================================================
-- Voucher codes (record id = coupon or gift-card code, one owner each)
-- =======================================================================
DEFINE TABLE voucher_code SCHEMAFULL;
DEFINE FIELD beneficiary_id ON TABLE voucher_code TYPE string;
DEFINE FIELD kind ON TABLE voucher_code TYPE string \
    ASSERT $value IN ['coupon', 'gift_card'];

-- =======================================================================
-- Verification status (1:1 with beneficiary)
-- =======================================================================
DEFINE TABLE verification_status SCHEMAFULL;
DEFINE FIELD is_coupon_verified ON TABLE verification_status TYPE bool \
    DEFAULT false;
DEFINE FIELD is_aadhar_verified ON TABLE verification_status TYPE bool \
    DEFAULT false;
DEFINE FIELD is_facial_verified ON TABLE verification_status TYPE bool \
    DEFAULT false;
DEFINE FIELD is_otp_verified ON TABLE verification_status TYPE bool \
    DEFAULT false;
DEFINE FIELD coupon_verified_at ON TABLE verification_status \
    TYPE option<datetime>;
DEFINE FIELD aadhar_verified_at ON TABLE verification_status \
    TYPE option<datetime>;
DEFINE FIELD facial_verified_at ON TABLE verification_status \
    TYPE option<datetime>;
DEFINE FIELD otp_verified_at ON TABLE verification_status \
    TYPE option<datetime>;
DEFINE FIELD uploaded_candidate_photo ON TABLE verification_status \
    TYPE option<string>;
DEFINE FIELD entered_aadhar_number ON TABLE verification_status \
    TYPE option<string>;
DEFINE FIELD overriding_user ON TABLE verification_status \
    TYPE option<string>;
DEFINE FIELD overriding_reason ON TABLE verification_status \
    TYPE option<string>;
DEFINE FIELD created_at ON TABLE verification_status TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE verification_status TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Issued status (1:1 with beneficiary)
-- =======================================================================
DEFINE TABLE issued_status SCHEMAFULL;
DEFINE FIELD issued_status ON TABLE issued_status TYPE string \
    DEFAULT 'not_issued' ASSERT $value IN ['not_issued', 'issued'];
DEFINE FIELD issued_laptop_serial ON TABLE issued_status \
    TYPE option<string>;
DEFINE FIELD issued_at ON TABLE issued_status TYPE option<datetime>;
DEFINE FIELD issued_by ON TABLE issued_status TYPE option<string>;
DEFINE FIELD is_requested_to_upgrade ON TABLE issued_status TYPE bool \
    DEFAULT false;
DEFINE FIELD evidence_photo ON TABLE issued_status TYPE option<string>;
DEFINE FIELD bill_receipt ON TABLE issued_status TYPE option<string>;
DEFINE FIELD store_employee_photo ON TABLE issued_status \
    TYPE option<string>;
DEFINE FIELD store_employee_name ON TABLE issued_status \
    TYPE option<string>;
DEFINE FIELD store_employee_mobile ON TABLE issued_status \
    TYPE option<string>;
DEFINE FIELD created_at ON TABLE issued_status TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE issued_status TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_issued_status_issued_by ON TABLE issued_status \
    COLUMNS issued_by;

-- =======================================================================
-- Issued serials (record id = laptop serial, never deleted)
-- =======================================================================
DEFINE TABLE issued_serial SCHEMAFULL;
DEFINE FIELD beneficiary_id ON TABLE issued_serial TYPE string;
DEFINE FIELD issued_at ON TABLE issued_serial TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_issued_serial_beneficiary ON TABLE issued_serial \
    COLUMNS beneficiary_id;

-- =======================================================================
-- Upgrade requests (1:1 with beneficiary)
-- =======================================================================
DEFINE TABLE upgrade_request SCHEMAFULL;
DEFINE FIELD status ON TABLE upgrade_request TYPE string \
    ASSERT $value IN ['Requested', 'Accepted', 'Cancelled'];
DEFINE FIELD upgrade_reason ON TABLE upgrade_request TYPE string;
DEFINE FIELD upgrade_product_type ON TABLE upgrade_request TYPE string;
DEFINE FIELD upgrade_product_info ON TABLE upgrade_request \
    TYPE option<string>;
DEFINE FIELD cost_of_upgrade ON TABLE upgrade_request TYPE int;
DEFINE FIELD new_laptop_serial ON TABLE upgrade_request \
    TYPE option<string>;
DEFINE FIELD scheduled_at ON TABLE upgrade_request \
    TYPE option<datetime>;
DEFINE FIELD requested_by ON TABLE upgrade_request TYPE string;
DEFINE FIELD created_at ON TABLE upgrade_request TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE upgrade_request TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- One-time passwords (record id = beneficiary id)
-- =======================================================================
DEFINE TABLE otp SCHEMAFULL;
DEFINE FIELD code ON TABLE otp TYPE string;
DEFINE FIELD expires_at ON TABLE otp TYPE datetime;
DEFINE FIELD created_at ON TABLE otp TYPE datetime DEFAULT time::now();
";

/// Run all pending migrations against the given SurrealDB connection.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
