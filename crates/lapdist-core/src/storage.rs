//! File storage collaborator.
//!
//! Holds registered photos, counter photos and issuance evidence.
//! References are opaque strings handed back by [`FileStore::save`].

use crate::error::LapdistResult;

pub trait FileStore: Send + Sync {
    /// Persist `bytes` under the relative `path`, returning the reference.
    fn save(
        &self,
        bytes: Vec<u8>,
        path: String,
    ) -> impl Future<Output = LapdistResult<String>> + Send;
    fn read(&self, reference: &str) -> impl Future<Output = LapdistResult<Vec<u8>>> + Send;
    fn delete(&self, reference: &str) -> impl Future<Output = LapdistResult<()>> + Send;
    fn exists(&self, reference: &str) -> impl Future<Output = LapdistResult<bool>> + Send;
}
