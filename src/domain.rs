use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub String);

        impl $name {
            /// Mint a fresh identifier from the process-local sequence.
            pub fn next() -> Self {
                static SEQUENCE: AtomicU64 = AtomicU64::new(1);
                let id = SEQUENCE.fetch_add(1, Ordering::Relaxed);
                Self(format!(concat!($prefix, "-{:06}"), id))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(
    /// Identifier wrapper for organizations.
    OrganizationId,
    "org"
);
opaque_id!(
    /// Identifier wrapper for login accounts.
    AccountId,
    "acct"
);
opaque_id!(
    /// Identifier wrapper for applicant profiles.
    ProfileId,
    "prof"
);
opaque_id!(
    /// Identifier wrapper for job postings.
    PostingId,
    "post"
);
opaque_id!(
    /// Identifier wrapper for submitted applications.
    ApplicationId,
    "app"
);
opaque_id!(
    /// Identifier wrapper for saved bookmarks.
    BookmarkId,
    "bkmk"
);
opaque_id!(
    /// Identifier wrapper for posting-defined disclosure questions.
    QuestionId,
    "dq"
);
opaque_id!(
    /// Identifier wrapper for per-application disclosure answers.
    AnswerId,
    "da"
);
opaque_id!(
    /// Identifier wrapper for skill tags.
    SkillId,
    "skill"
);
opaque_id!(
    /// Opaque handle addressing a stored binary blob.
    BlobHandle,
    "blob"
);

/// Role tag carried by every login account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountRole {
    OrgAdmin,
    Staff,
    Applicant,
}

impl AccountRole {
    pub const fn label(self) -> &'static str {
        match self {
            AccountRole::OrgAdmin => "org_admin",
            AccountRole::Staff => "staff",
            AccountRole::Applicant => "applicant",
        }
    }
}

/// An employer organization. Admin accounts are tracked in a separate
/// many-to-many association table; an organization left without admins is
/// headless but valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    /// Unique external handle used in URLs and deletion requests.
    pub handle: String,
    pub logo: Option<BlobHandle>,
    pub banner: Option<BlobHandle>,
}

/// One row per login identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub role: AccountRole,
    /// Set for OrgAdmin and Staff accounts, absent for applicants.
    pub organization: Option<OrganizationId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Employer-side profile, 1:1 with a Staff or OrgAdmin account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffProfile {
    pub account: AccountId,
    pub organization: OrganizationId,
    pub title: String,
}

/// Applicant-side profile, 1:1 with an Applicant account. The resume handle
/// points at the profile's primary upload; applications never share it (they
/// hold snapshot copies, see the application service).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub id: ProfileId,
    pub account: AccountId,
    pub full_name: String,
    pub resume: Option<BlobHandle>,
}

/// Publication status of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingStatus {
    Open,
    Closed,
}

/// A job listing owned by exactly one organization and authored by exactly
/// one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub id: PostingId,
    pub organization: OrganizationId,
    pub posted_by: AccountId,
    pub title: String,
    pub status: PostingStatus,
    pub deadline: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status tracked through an application's lifecycle.
///
/// `Submitted` is initial; staff move an application between `Shortlisted`
/// and `Rejected` in either direction; `Withdrawn` is applicant-triggered and
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Submitted,
    Shortlisted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    /// Whether staff may move an application from `self` into `next`.
    pub const fn staff_can_enter(self, next: ApplicationStatus) -> bool {
        matches!(
            (self, next),
            (
                ApplicationStatus::Submitted | ApplicationStatus::Shortlisted
                    | ApplicationStatus::Rejected,
                ApplicationStatus::Shortlisted | ApplicationStatus::Rejected,
            )
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Withdrawn)
    }
}

/// An applicant's submission against a posting. Unique per
/// (posting, profile); the file handles are snapshot copies owned by this
/// row alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub posting: PostingId,
    pub profile: ProfileId,
    pub status: ApplicationStatus,
    pub resume: Option<BlobHandle>,
    pub cover_letter: Option<BlobHandle>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An applicant's bookmark of a posting for later viewing. Unique per
/// (profile, posting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedBookmark {
    pub id: BookmarkId,
    pub profile: ProfileId,
    pub posting: PostingId,
    pub created_at: DateTime<Utc>,
}

/// A posting-defined custom question answered per application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureQuestion {
    pub id: QuestionId,
    pub posting: PostingId,
    pub prompt: String,
}

/// The applicant's answer to one disclosure question on one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureAnswer {
    pub id: AnswerId,
    pub application: ApplicationId,
    pub question: QuestionId,
    pub response: String,
}

/// Skill tag shared by postings and applicant profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = PostingId::next();
        let b = PostingId::next();
        assert_ne!(a, b);
        assert!(a.0.starts_with("post-"));
    }

    #[test]
    fn staff_transitions_are_reenterable_between_shortlisted_and_rejected() {
        use ApplicationStatus::*;
        assert!(Submitted.staff_can_enter(Shortlisted));
        assert!(Submitted.staff_can_enter(Rejected));
        assert!(Shortlisted.staff_can_enter(Rejected));
        assert!(Rejected.staff_can_enter(Shortlisted));
        assert!(!Withdrawn.staff_can_enter(Shortlisted));
        assert!(!Submitted.staff_can_enter(Submitted));
        assert!(!Shortlisted.staff_can_enter(Withdrawn));
    }
}
