//! Counter-side issuance: store and gate checks in front of the ledger.

use lapdist_core::models::issuance::{IssuanceEvidence, IssuedStatus};
use lapdist_core::repository::{
    BeneficiaryRepository, IssuedStatusRepository, VerificationStatusRepository,
};
use lapdist_core::storage::FileStore;
use uuid::Uuid;

use crate::error::VerifyError;
use crate::gates;
use crate::ledger::IssuanceLedger;

#[derive(Debug, Clone)]
pub struct IssueLaptopRequest {
    pub beneficiary_id: Uuid,
    pub laptop_serial: String,
    /// Inline evidence; when absent, prior uploads are required.
    pub evidence: Option<IssuanceEvidence>,
}

pub struct IssuanceService<B, V, I, F>
where
    B: BeneficiaryRepository,
    V: VerificationStatusRepository,
    I: IssuedStatusRepository,
    F: FileStore,
{
    beneficiary_repo: B,
    status_repo: V,
    ledger: IssuanceLedger<I, F>,
}

impl<B, V, I, F> IssuanceService<B, V, I, F>
where
    B: BeneficiaryRepository,
    V: VerificationStatusRepository,
    I: IssuedStatusRepository,
    F: FileStore,
{
    pub fn new(beneficiary_repo: B, status_repo: V, ledger: IssuanceLedger<I, F>) -> Self {
        Self {
            beneficiary_repo,
            status_repo,
            ledger,
        }
    }

    pub fn ledger(&self) -> &IssuanceLedger<I, F> {
        &self.ledger
    }

    /// Hand over a laptop once every verification gate holds.
    pub async fn issue_laptop(
        &self,
        request: IssueLaptopRequest,
        store_id: Uuid,
        actor_id: Uuid,
    ) -> Result<IssuedStatus, VerifyError> {
        let beneficiary = self.beneficiary_repo.get_by_id(request.beneficiary_id).await?;
        if beneficiary.store_id != Some(store_id) {
            return Err(VerifyError::WrongStore);
        }

        let status = self.status_repo.find(beneficiary.id).await?;
        gates::ready_for_issuance(status.as_ref())?;

        self.ledger
            .issue(
                beneficiary.id,
                &request.laptop_serial,
                request.evidence,
                actor_id,
            )
            .await
    }
}
