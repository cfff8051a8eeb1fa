//! Entity lifecycle services: application intake and state transitions,
//! manually-ordered cascading deletion, and retention sweeps.

pub mod applications;
pub mod deletion;
pub mod sweeper;

#[cfg(test)]
mod tests;

use crate::domain::{AccountId, AccountRole, OrganizationId};
use crate::storage::blobs::BlobError;

pub use applications::{
    ApplicationFiles, ApplicationService, FileUpload, NewApplication, ResumeSource,
};
pub use deletion::DeletionService;
pub use sweeper::{RetentionPolicy, RetentionSweeper, SweepOutcome, SweepSchedule};

/// Caller identity as supplied by the session layer. The core trusts this
/// and enforces only ownership and role guards on top of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub account: AccountId,
    pub role: AccountRole,
    pub organization: Option<OrganizationId>,
}

impl Actor {
    pub fn belongs_to(&self, organization: &OrganizationId) -> bool {
        self.organization.as_ref() == Some(organization)
    }
}

/// User-visible conflicts. Already-applied and already-withdrawn carry
/// distinct messages so callers can render different UI for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConflictKind {
    #[error("an application for this posting already exists")]
    AlreadyApplied,
    #[error("a withdrawn application for this posting blocks re-applying")]
    AlreadyWithdrawn,
    #[error("the posting deadline has passed")]
    DeadlinePassed,
    #[error("this posting is already bookmarked")]
    DuplicateBookmark,
}

/// Error taxonomy shared by every lifecycle entry point.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("caller is not allowed to {0}")]
    Forbidden(&'static str),
    #[error(transparent)]
    Conflict(#[from] ConflictKind),
    /// A cascade step found a reference it cannot resolve. A bug, not a
    /// user-facing condition.
    #[error("integrity violation: {0}")]
    Integrity(String),
    /// Blob store unreachable mid-operation; retryable, and the relational
    /// transaction is rolled back so no row references a missing file.
    #[error("blob storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<BlobError> for LifecycleError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound => {
                LifecycleError::Integrity("referenced blob is missing".to_string())
            }
            BlobError::Unavailable(reason) => LifecycleError::StorageUnavailable(reason),
        }
    }
}
